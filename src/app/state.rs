use std::sync::Arc;
use std::time::Instant;

use time::{Duration, OffsetDateTime};

use crate::ads::{Ad, AdRepository, Category};
use crate::app::toast::{Notifier, Toast};
use crate::compose::{AiCompletion, AiTicket, ComposeForm, DescriptionRequest, RequiredField};
use crate::config::{AppConfig, Language};
use crate::contact::{call_link, whatsapp_link};
use crate::search::{filter_ads, CityFilter, SearchFilter, SearchHistory, SortMode};
use crate::session::{AuthEvent, AuthFlow, Settings};
use crate::storage::SharedStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Published { id: String },
    /// Anonymous user: the login flow was opened and the draft kept.
    AuthRequired,
    Incomplete(Vec<RequiredField>),
    NotComposing,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    NotFound,
    Forbidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactLinks {
    pub call: String,
    pub whatsapp: String,
}

/// Everything a front end renders from, plus the handlers its events call.
pub struct MarketState {
    config: Arc<AppConfig>,
    settings: Settings,
    repository: AdRepository,
    history: SearchHistory,
    filter: SearchFilter,
    results: Vec<Ad>,
    compose: ComposeForm,
    compose_open: bool,
    auth: Option<AuthFlow>,
    toast: Notifier,
}

impl MarketState {
    pub fn load(config: Arc<AppConfig>, store: SharedStore) -> Self {
        let settings = Settings::load(store.clone(), config.language);
        let repository = AdRepository::initialize(store.clone());
        let history = SearchHistory::load(store);
        let toast = Notifier::new(config.toast.ttl());
        let mut state = Self {
            config,
            settings,
            repository,
            history,
            filter: SearchFilter::default(),
            results: Vec::new(),
            compose: ComposeForm::new(),
            compose_open: false,
            auth: None,
            toast,
        };
        state.recompute();
        state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn language(&self) -> Language {
        self.settings.language()
    }

    pub fn identity(&self) -> Option<&str> {
        self.settings.identity()
    }

    pub fn ads(&self) -> &[Ad] {
        self.repository.all()
    }

    pub fn results(&self) -> &[Ad] {
        &self.results
    }

    pub fn filter(&self) -> &SearchFilter {
        &self.filter
    }

    pub fn history(&self) -> &[String] {
        self.history.entries()
    }

    pub fn set_language(&mut self, language: Language, now: Instant) {
        if let Err(err) = self.settings.set_language(language) {
            tracing::error!(?err, "failed to persist language");
            self.report_storage_failure(now);
        }
        self.recompute();
    }

    pub fn set_query<S: Into<String>>(&mut self, query: S) {
        self.filter.query = query.into();
        self.recompute();
    }

    pub fn set_category(&mut self, category: Option<Category>) {
        self.filter.category = category;
        self.recompute();
    }

    pub fn set_city(&mut self, city: CityFilter) {
        self.filter.city = city;
        self.recompute();
    }

    /// Parses a city label in the active language; unknown labels leave the filter as is.
    pub fn set_city_label(&mut self, label: &str) -> bool {
        match CityFilter::parse(label, self.language()) {
            Some(city) => {
                self.set_city(city);
                true
            }
            None => false,
        }
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        self.filter.sort = sort;
        self.recompute();
    }

    /// Stores the current query in the history, as when a search is submitted.
    pub fn commit_search(&mut self, now: Instant) {
        let query = self.filter.query.clone();
        if let Err(err) = self.history.record(&query) {
            tracing::error!(?err, "failed to record search history");
            self.report_storage_failure(now);
        }
    }

    /// Re-runs a past query.
    pub fn apply_history_entry(&mut self, index: usize, now: Instant) -> bool {
        let Some(query) = self.history.entries().get(index).cloned() else {
            return false;
        };
        self.set_query(query);
        self.commit_search(now);
        true
    }

    pub fn clear_history(&mut self, now: Instant) {
        if let Err(err) = self.history.clear() {
            tracing::error!(?err, "failed to clear search history");
            self.report_storage_failure(now);
        }
    }

    pub fn open_compose(&mut self) {
        self.compose_open = true;
    }

    pub fn close_compose(&mut self) {
        self.compose.reset();
        self.compose_open = false;
    }

    pub fn is_composing(&self) -> bool {
        self.compose_open
    }

    pub fn compose(&self) -> Option<&ComposeForm> {
        self.compose_open.then_some(&self.compose)
    }

    pub fn compose_mut(&mut self) -> Option<&mut ComposeForm> {
        if self.compose_open {
            Some(&mut self.compose)
        } else {
            None
        }
    }

    /// Attaches a video, turning a rejection into an error toast.
    pub fn attach_video(&mut self, path: &std::path::Path, now: Instant) -> bool {
        if !self.compose_open {
            return false;
        }
        let limit = self.config.compose.max_video_bytes;
        match self.compose.attach_video(path, limit) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "video rejected");
                let message = match err {
                    crate::compose::MediaError::TooLarge { limit, .. } => {
                        self.language().strings().video_limit(limit)
                    }
                    other => other.to_string(),
                };
                self.toast.error(message, now);
                false
            }
        }
    }

    pub fn begin_description(&mut self) -> Option<(AiTicket, DescriptionRequest)> {
        let language = self.language();
        self.compose_mut()?.begin_description(language)
    }

    /// Applies a generation result to the draft it was requested for.
    pub fn apply_description(&mut self, completion: AiCompletion) -> bool {
        self.compose.apply_description(completion)
    }

    pub fn submit_compose(&mut self, now: Instant) -> SubmitOutcome {
        if !self.compose_open {
            return SubmitOutcome::NotComposing;
        }
        let missing = self.compose.missing_fields();
        if !missing.is_empty() {
            return SubmitOutcome::Incomplete(missing);
        }
        let Some(owner) = self.settings.identity().map(str::to_string) else {
            tracing::info!("anonymous submit, asking for login");
            self.open_auth();
            let message = self.language().strings().login_required;
            self.toast.error(message, now);
            return SubmitOutcome::AuthRequired;
        };
        let ad = match self
            .compose
            .build_ad(&owner, &self.config.compose, OffsetDateTime::now_utc())
        {
            Ok(ad) => ad,
            Err(incomplete) => return SubmitOutcome::Incomplete(incomplete.missing),
        };
        let id = ad.id.clone();
        if let Err(err) = self.repository.insert_front(ad) {
            tracing::error!(?err, "failed to publish ad");
            self.report_storage_failure(now);
            self.recompute();
            return SubmitOutcome::Failed(err.to_string());
        }
        self.close_compose();
        self.recompute();
        let message = self.language().strings().ad_published;
        self.toast.success(message, now);
        SubmitOutcome::Published { id }
    }

    pub fn can_delete(&self, id: &str) -> bool {
        self.repository
            .get(id)
            .map_or(false, |ad| ad.is_owned_by(self.identity()))
    }

    pub fn delete_ad(&mut self, id: &str, now: Instant) -> DeleteOutcome {
        let Some(ad) = self.repository.get(id) else {
            return DeleteOutcome::NotFound;
        };
        if !ad.is_owned_by(self.identity()) {
            let message = self.language().strings().delete_forbidden;
            self.toast.error(message, now);
            return DeleteOutcome::Forbidden;
        }
        match self.repository.remove_by_id(id) {
            Ok(_) => {
                self.recompute();
                let message = self.language().strings().ad_deleted;
                self.toast.success(message, now);
                DeleteOutcome::Removed
            }
            Err(err) => {
                tracing::error!(?err, id, "failed to delete ad");
                self.report_storage_failure(now);
                self.recompute();
                DeleteOutcome::Removed
            }
        }
    }

    pub fn contact_links(&self, id: &str) -> Option<ContactLinks> {
        let ad = self.repository.get(id)?;
        Some(ContactLinks {
            call: call_link(&self.config.auth, ad),
            whatsapp: whatsapp_link(&self.config.auth, ad),
        })
    }

    pub fn open_auth(&mut self) {
        if self.auth.is_none() {
            self.auth = Some(AuthFlow::new(self.config.auth.clone()));
        }
    }

    pub fn close_auth(&mut self) {
        self.auth = None;
    }

    pub fn auth(&self) -> Option<&AuthFlow> {
        self.auth.as_ref()
    }

    pub fn auth_mut(&mut self) -> Option<&mut AuthFlow> {
        self.auth.as_mut()
    }

    pub fn logout(&mut self, now: Instant) {
        if let Err(err) = self.settings.sign_out() {
            tracing::error!(?err, "failed to clear session");
            self.report_storage_failure(now);
        }
    }

    /// Advances timers: finishes due auth steps and expires the toast.
    pub fn tick(&mut self, now: Instant) -> Option<AuthEvent> {
        self.toast.poll(now);
        let event = self.auth.as_mut()?.poll(now)?;
        if let AuthEvent::Authenticated { identity } = &event {
            match self.settings.sign_in(identity.clone()) {
                Ok(()) => {
                    let message = self
                        .language()
                        .strings()
                        .logged_in
                        .replace("{identity}", identity);
                    self.toast.success(message, now);
                }
                Err(err) => {
                    tracing::error!(?err, "failed to persist session");
                    self.report_storage_failure(now);
                }
            }
            self.auth = None;
        }
        Some(event)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        let auth = self.auth.as_ref().and_then(AuthFlow::next_deadline);
        match (auth, self.toast.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn toast(&self, now: Instant) -> Option<&Toast> {
        self.toast.current(now)
    }

    fn report_storage_failure(&mut self, now: Instant) {
        let message = self.language().strings().storage_failed;
        self.toast.error(message, now);
    }

    fn recompute(&mut self) {
        self.results = filter_ads(self.repository.all(), &self.filter);
    }
}

/// `12 500 TJS`, or the localized "free" label for zero.
pub fn format_price(ad: &Ad, language: Language) -> String {
    if ad.is_free() {
        return language.strings().free.to_string();
    }
    let fixed = format!("{:.2}", ad.price);
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut amount = match whole.parse::<u64>() {
        Ok(value) => group_thousands(value),
        Err(_) => whole.to_string(),
    };
    if cents != "00" {
        amount.push('.');
        amount.push_str(cents);
    }
    format!("{amount} {}", ad.currency)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped
}

/// Age of a listing relative to `now`, falling back to the calendar date.
pub fn format_created(created_at: OffsetDateTime, now: OffsetDateTime, language: Language) -> String {
    let strings = language.strings();
    let diff = now - created_at;
    if diff.is_negative() || diff < Duration::seconds(45) {
        return strings.just_now.to_string();
    }
    if diff < Duration::minutes(90) {
        let mins = diff.whole_minutes().max(1);
        return strings.minutes_ago.replace("{n}", &mins.to_string());
    }
    if diff < Duration::hours(36) {
        let hours = diff.whole_hours().max(1);
        return strings.hours_ago.replace("{n}", &hours.to_string());
    }
    if diff < Duration::days(10) {
        let days = diff.whole_days().max(1);
        return strings.days_ago.replace("{n}", &days.to_string());
    }
    created_at.date().to_string()
}
