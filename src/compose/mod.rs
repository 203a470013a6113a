use std::path::Path;

use strum::Display;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ads::{Ad, Category, City};
use crate::config::{ComposeConfig, Language};
use crate::contact::digits_only;

pub mod ai;
pub mod media;

pub use ai::{AiCompletion, AiDispatcher, AiTicket, DescriptionGenerator, DescriptionRequest};
pub use media::{load_media, MediaAttachment, MediaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RequiredField {
    Title,
    Price,
    Phone,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("listing is missing required fields: {}", format_fields(.missing))]
pub struct IncompleteDraft {
    pub missing: Vec<RequiredField>,
}

fn format_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Draft of a new listing. `generation` changes on every reset so that
/// late AI replies for an older draft can be recognised and dropped.
#[derive(Debug, Clone, Default)]
pub struct ComposeForm {
    pub title: String,
    pub price: String,
    pub category: Category,
    pub city: City,
    pub description: String,
    phone: String,
    whatsapp: String,
    image: Option<MediaAttachment>,
    video: Option<MediaAttachment>,
    generation: u64,
    ai_pending: bool,
}

impl ComposeForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn whatsapp(&self) -> &str {
        &self.whatsapp
    }

    pub fn set_phone(&mut self, input: &str) {
        self.phone = digits_only(input, None);
    }

    pub fn set_whatsapp(&mut self, input: &str) {
        self.whatsapp = digits_only(input, None);
    }

    pub fn image(&self) -> Option<&MediaAttachment> {
        self.image.as_ref()
    }

    pub fn video(&self) -> Option<&MediaAttachment> {
        self.video.as_ref()
    }

    pub fn attach_image(&mut self, path: &Path) -> Result<(), MediaError> {
        let media = load_media(path, None)?;
        tracing::debug!(file = %media.file_name, size = media.size, "attached image");
        self.image = Some(media);
        Ok(())
    }

    /// On rejection the previously attached video stays in place.
    pub fn attach_video(&mut self, path: &Path, max_bytes: u64) -> Result<(), MediaError> {
        let media = load_media(path, Some(max_bytes))?;
        tracing::debug!(file = %media.file_name, size = media.size, "attached video");
        self.video = Some(media);
        Ok(())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_generating(&self) -> bool {
        self.ai_pending
    }

    pub fn parsed_price(&self) -> Option<f64> {
        let raw = self.price.trim().replace([' ', '\u{a0}'], "").replace(',', ".");
        raw.parse::<f64>()
            .ok()
            .filter(|price| price.is_finite() && *price >= 0.0)
    }

    pub fn missing_fields(&self) -> Vec<RequiredField> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push(RequiredField::Title);
        }
        if self.parsed_price().is_none() {
            missing.push(RequiredField::Price);
        }
        if self.phone.is_empty() {
            missing.push(RequiredField::Phone);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Marks a generation request as in flight. `None` while one is already
    /// pending or when there is no title to describe.
    pub fn begin_description(&mut self, language: Language) -> Option<(AiTicket, DescriptionRequest)> {
        if self.ai_pending || self.title.trim().is_empty() {
            return None;
        }
        self.ai_pending = true;
        let request = DescriptionRequest {
            title: self.title.trim().to_string(),
            category_label: self.category.label(language).to_string(),
            language,
        };
        Some((
            AiTicket {
                generation: self.generation,
            },
            request,
        ))
    }

    /// Applies a finished request. Returns false when the reply belongs to an
    /// earlier draft and was dropped.
    pub fn apply_description(&mut self, completion: AiCompletion) -> bool {
        if completion.ticket.generation != self.generation {
            tracing::debug!(
                ticket = completion.ticket.generation,
                current = self.generation,
                "dropping description for a discarded draft"
            );
            return false;
        }
        self.description = ai::resolve_description(completion.result, completion.language);
        self.ai_pending = false;
        true
    }

    pub fn reset(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = Self {
            generation,
            ..Self::default()
        };
    }

    /// Builds the listing to publish, stamped with a fresh id and `now`.
    pub fn build_ad(
        &self,
        owner: &str,
        config: &ComposeConfig,
        now: OffsetDateTime,
    ) -> Result<Ad, IncompleteDraft> {
        let missing = self.missing_fields();
        let Some(price) = self.parsed_price().filter(|_| missing.is_empty()) else {
            return Err(IncompleteDraft { missing });
        };
        let image_url = match &self.image {
            Some(media) => media.data_url.clone(),
            None => {
                let seed = Uuid::new_v4().simple().to_string();
                config.placeholder_for(&seed[..12])
            }
        };
        Ok(Ad {
            id: Uuid::new_v4().to_string(),
            title: self.title.trim().to_string(),
            price,
            currency: config.currency.clone(),
            description: self.description.clone(),
            category: self.category,
            city: self.city,
            image_url,
            video_url: self.video.as_ref().map(|media| media.data_url.clone()),
            created_at: now,
            phone: self.phone.clone(),
            whatsapp: Some(self.whatsapp.clone()).filter(|number| !number.is_empty()),
            is_vip: false,
            owner: Some(owner.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ai::AiError;
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;
    use tempfile::TempDir;

    fn filled() -> ComposeForm {
        let mut form = ComposeForm::new();
        form.title = "Velosiped".into();
        form.price = "1 500".into();
        form.set_phone("90-011-22-33");
        form
    }

    #[test]
    fn defaults_match_first_city_and_other_category() {
        let form = ComposeForm::new();
        assert_eq!(form.category, Category::Other);
        assert_eq!(form.city, City::Dushanbe);
        assert_eq!(
            form.missing_fields(),
            vec![RequiredField::Title, RequiredField::Price, RequiredField::Phone]
        );
    }

    #[test]
    fn price_accepts_zero_and_rejects_negative() {
        let mut form = filled();
        form.price = "0".into();
        assert_eq!(form.parsed_price(), Some(0.0));
        form.price = "-5".into();
        assert_eq!(form.parsed_price(), None);
        form.price = "abc".into();
        assert_eq!(form.missing_fields(), vec![RequiredField::Price]);
    }

    #[test]
    fn build_stamps_owner_placeholder_and_timestamp() {
        let form = filled();
        let now = OffsetDateTime::now_utc();
        let ad = form
            .build_ad("+992 900112233", &ComposeConfig::default(), now)
            .expect("complete draft");
        assert_eq!(ad.price, 1500.0);
        assert_eq!(ad.phone, "900112233");
        assert_eq!(ad.whatsapp, None);
        assert_eq!(ad.currency, "TJS");
        assert_eq!(ad.created_at, now);
        assert_eq!(ad.owner.as_deref(), Some("+992 900112233"));
        assert!(ad.image_url.starts_with("https://picsum.photos/seed/"));
        assert!(Uuid::parse_str(&ad.id).is_ok());

        let other = form
            .build_ad("+992 900112233", &ComposeConfig::default(), now)
            .expect("complete draft");
        assert_ne!(ad.id, other.id);
    }

    #[test]
    fn incomplete_draft_lists_missing_fields() {
        let mut form = filled();
        form.title = "  ".into();
        let err = form
            .build_ad("+992 900112233", &ComposeConfig::default(), OffsetDateTime::now_utc())
            .unwrap_err();
        assert_eq!(err.missing, vec![RequiredField::Title]);
        assert_eq!(err.to_string(), "listing is missing required fields: title");
    }

    #[test]
    fn uploaded_image_is_embedded() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("bike.jpg");
        fs::write(&path, b"jpeg")?;
        let mut form = filled();
        form.attach_image(&path)?;
        let ad = form
            .build_ad("me", &ComposeConfig::default(), OffsetDateTime::now_utc())
            .expect("complete draft");
        assert!(ad.image_url.starts_with("data:image/jpeg;base64,"));
        Ok(())
    }

    #[test]
    fn oversized_video_keeps_previous_preview() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let small = temp.path().join("small.mp4");
        let large = temp.path().join("large.mp4");
        fs::write(&small, vec![1u8; 8])?;
        fs::write(&large, vec![1u8; 64])?;

        let mut form = filled();
        form.attach_video(&small, 32)?;
        assert_matches!(
            form.attach_video(&large, 32),
            Err(MediaError::TooLarge { .. })
        );
        assert_eq!(form.video().map(|media| media.file_name.as_str()), Some("small.mp4"));
        Ok(())
    }

    #[test]
    fn description_request_needs_title_and_blocks_while_pending() {
        let mut form = ComposeForm::new();
        assert!(form.begin_description(Language::Ru).is_none());

        form.title = "Toyota".into();
        form.category = Category::Auto;
        let (ticket, request) = form.begin_description(Language::Tg).expect("request");
        assert_eq!(request.category_label, "Мошинҳо");
        assert_eq!(ticket.generation, form.generation());
        assert!(form.is_generating());
        assert!(form.begin_description(Language::Tg).is_none());
    }

    #[test]
    fn failed_generation_fills_localized_error() {
        let mut form = filled();
        let (ticket, request) = form.begin_description(Language::Ru).expect("request");
        let applied = form.apply_description(AiCompletion {
            ticket,
            language: request.language,
            result: Err(AiError::NotConfigured("no key".into())),
        });
        assert!(applied);
        assert_eq!(form.description, "Произошла ошибка при генерации описания.");
        assert!(!form.is_generating());
    }

    #[test]
    fn stale_reply_after_reset_is_dropped() {
        let mut form = filled();
        let (ticket, request) = form.begin_description(Language::Ru).expect("request");
        form.reset();
        let applied = form.apply_description(AiCompletion {
            ticket,
            language: request.language,
            result: Ok("late text".into()),
        });
        assert!(!applied);
        assert!(form.description.is_empty());
        assert!(form.title.is_empty());
        assert!(!form.is_generating());
    }
}
