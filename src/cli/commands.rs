use std::fmt::Write as _;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Args;
use time::OffsetDateTime;

use crate::ads::{Ad, Category, City};
use crate::app::{format_created, format_price, App, DeleteOutcome, MarketState, SubmitOutcome};
use crate::compose::IncompleteDraft;
use crate::config::Language;
use crate::highlight::{mark_matches, query_regex};
use crate::search::{category_counts, CityFilter, SortMode};
use crate::session::AuthStep;

const SNIPPET_CHARS: usize = 80;

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Text to look for in titles and descriptions
    #[arg()]
    pub query: Vec<String>,
    /// Category code (e.g. AUTO) or label
    #[arg(long)]
    pub category: Option<String>,
    /// City code or label; the "all cities" label of the current language clears it
    #[arg(long)]
    pub city: Option<String>,
    /// newest, price-asc or price-desc
    #[arg(long, default_value_t = SortMode::Newest)]
    pub sort: SortMode,
    /// Print per-category totals after the listings
    #[arg(long)]
    pub counts: bool,
    /// Do not store the query in search history
    #[arg(long)]
    pub no_history: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Listing identifier
    pub id: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PostArgs {
    #[arg(long)]
    pub title: String,
    /// Price in the configured currency; 0 marks the item as free
    #[arg(long)]
    pub price: String,
    /// Contact phone, digits only are kept
    #[arg(long)]
    pub phone: String,
    #[arg(long)]
    pub whatsapp: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    /// Listing text; `-` reads it from stdin
    #[arg(long)]
    pub description: Option<String>,
    /// Photo to embed in the listing
    #[arg(long)]
    pub image: Option<PathBuf>,
    /// Video to embed in the listing
    #[arg(long)]
    pub video: Option<PathBuf>,
    /// Generate the description when none is given
    #[arg(long)]
    pub ai: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct ContactArgs {
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct DescribeArgs {
    pub title: String,
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LoginArgs {
    /// Local phone number (prompted if omitted)
    #[arg(long)]
    pub phone: Option<String>,
    /// Confirmation code (prompted if omitted)
    #[arg(long)]
    pub code: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct HistoryArgs {
    /// Forget every stored search
    #[arg(long)]
    pub clear: bool,
    /// Repeat the search numbered N in the list
    #[arg(long, value_name = "N", conflicts_with = "clear")]
    pub run: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LangArgs {
    /// ru or tg; prints the current language when omitted
    pub language: Option<Language>,
}

pub fn list_ads(app: &mut App, args: &ListArgs) -> Result<String> {
    let now = Instant::now();
    let state = app.state_mut();
    state.set_query(args.query.join(" "));
    match args.category.as_deref() {
        Some(raw) => {
            let category = parse_category(raw)?;
            state.set_category(Some(category));
        }
        None => state.set_category(None),
    }
    match args.city.as_deref() {
        Some(raw) => {
            if !state.set_city_label(raw) {
                bail!("unknown city '{raw}'");
            }
        }
        None => state.set_city(CityFilter::All),
    }
    state.set_sort(args.sort);
    if !args.no_history {
        state.commit_search(now);
    }

    let mut out = format_listing(state, OffsetDateTime::now_utc());
    if args.counts {
        out.push('\n');
        out.push_str(&format_counts(state.ads(), state.language()));
    }
    Ok(out)
}

fn format_listing(state: &MarketState, now: OffsetDateTime) -> String {
    let language = state.language();
    let strings = language.strings();
    let results = state.results();
    let mut out = String::new();
    if results.is_empty() {
        let _ = writeln!(&mut out, "{}", strings.nothing_found);
        return out;
    }
    if state.filter().is_unfiltered() {
        let _ = writeln!(&mut out, "{}\n", strings.all_ads);
    } else {
        let _ = writeln!(&mut out, "{}\n", strings.found(results.len()));
    }

    let regex = query_regex(&state.filter().query);
    for ad in results {
        let mut headline = format!("#{}  {}", ad.id, mark_matches(&ad.title, regex.as_ref()));
        if ad.is_vip {
            headline.push_str("  [VIP]");
        }
        let _ = writeln!(&mut out, "{headline}");
        let _ = writeln!(
            &mut out,
            "    {} | {} | {} | {}",
            format_price(ad, language),
            ad.category.label(language),
            ad.city.label(language),
            format_created(ad.created_at, now, language)
        );
        if let Some(snippet) = snippet(&ad.description) {
            let _ = writeln!(&mut out, "    {}", mark_matches(&snippet, regex.as_ref()));
        }
        out.push('\n');
    }
    out
}

fn snippet(description: &str) -> Option<String> {
    let line = description.lines().map(str::trim).find(|line| !line.is_empty())?;
    if line.chars().count() <= SNIPPET_CHARS {
        return Some(line.to_string());
    }
    let mut cut: String = line.chars().take(SNIPPET_CHARS).collect();
    cut.push_str("...");
    Some(cut)
}

fn format_counts(ads: &[Ad], language: Language) -> String {
    let mut out = String::new();
    for (category, count) in category_counts(ads) {
        if count > 0 {
            let _ = writeln!(&mut out, "{:<16} {count}", category.label(language));
        }
    }
    out
}

pub fn show_ad(app: &App, args: &ShowArgs) -> Result<String> {
    let state = app.state();
    let Some(ad) = state.ads().iter().find(|ad| ad.id == args.id) else {
        bail!("no listing with id {}", args.id);
    };
    let language = state.language();
    let prefix = &app.config.auth.country_prefix;
    let mut out = String::new();
    let _ = writeln!(&mut out, "{}{}", ad.title, if ad.is_vip { "  [VIP]" } else { "" });
    let _ = writeln!(&mut out, "  price     {}", format_price(ad, language));
    let _ = writeln!(&mut out, "  category  {}", ad.category.label(language));
    let _ = writeln!(&mut out, "  city      {}", ad.city.label(language));
    let _ = writeln!(
        &mut out,
        "  posted    {}",
        format_created(ad.created_at, OffsetDateTime::now_utc(), language)
    );
    let _ = writeln!(&mut out, "  phone     {prefix} {}", ad.phone);
    let _ = writeln!(&mut out, "  whatsapp  {prefix} {}", ad.whatsapp_number());
    let _ = writeln!(&mut out, "  image     {}", describe_media(&ad.image_url));
    if let Some(video) = &ad.video_url {
        let _ = writeln!(&mut out, "  video     {}", describe_media(video));
    }
    if state.can_delete(&ad.id) {
        let _ = writeln!(&mut out, "  (your listing)");
    }
    if !ad.description.is_empty() {
        let _ = writeln!(&mut out, "\n{}", ad.description);
    }
    Ok(out)
}

fn describe_media(url: &str) -> String {
    match url.strip_prefix("data:") {
        Some(rest) => {
            let mime = rest.split(';').next().unwrap_or_default();
            format!("<embedded {mime}>")
        }
        None => url.to_string(),
    }
}

pub fn post_ad(app: &mut App, args: PostArgs) -> Result<String> {
    let description = match args.description.as_deref() {
        Some("-") => read_stdin()?.context("expected the description on stdin")?,
        Some(text) => text.to_string(),
        None => String::new(),
    };
    let category = args.category.as_deref().map(parse_category).transpose()?;
    let city = args.city.as_deref().map(parse_city).transpose()?;
    let now = Instant::now();

    let state = app.state_mut();
    state.open_compose();
    let Some(form) = state.compose_mut() else {
        bail!("could not open the listing form");
    };
    form.title = args.title;
    form.price = args.price;
    form.description = description;
    form.set_phone(&args.phone);
    if let Some(whatsapp) = &args.whatsapp {
        form.set_whatsapp(whatsapp);
    }
    if let Some(category) = category {
        form.category = category;
    }
    if let Some(city) = city {
        form.city = city;
    }
    if let Some(path) = &args.image {
        form.attach_image(path)
            .with_context(|| format!("attaching image {}", path.display()))?;
    }
    if let Some(path) = &args.video {
        if !state.attach_video(path, now) {
            let reason = state
                .toast(now)
                .map(|toast| toast.message.clone())
                .unwrap_or_else(|| "video rejected".into());
            bail!("{reason}");
        }
    }

    let wants_ai = args.ai
        && state
            .compose()
            .map_or(false, |form| form.description.trim().is_empty());
    if wants_ai && app.request_description() {
        let timeout = app.config.ai.timeout().saturating_add(Duration::from_secs(1));
        app.wait_for_description(timeout);
    }

    let state = app.state_mut();
    let strings = state.language().strings();
    match state.submit_compose(Instant::now()) {
        SubmitOutcome::Published { id } => Ok(format!("{}: #{id}\n", strings.ad_published)),
        SubmitOutcome::AuthRequired => {
            bail!("{} (run `bozor login` first)", strings.login_required)
        }
        SubmitOutcome::Incomplete(missing) => Err(IncompleteDraft { missing }.into()),
        SubmitOutcome::NotComposing => bail!("the listing form is not open"),
        SubmitOutcome::Failed(reason) => bail!("publishing failed: {reason}"),
    }
}

pub fn delete_ad(app: &mut App, args: &DeleteArgs) -> Result<String> {
    let state = app.state_mut();
    let strings = state.language().strings();
    match state.delete_ad(&args.id, Instant::now()) {
        DeleteOutcome::Removed => Ok(format!("{}\n", strings.ad_deleted)),
        DeleteOutcome::NotFound => bail!("no listing with id {}", args.id),
        DeleteOutcome::Forbidden => bail!("{}", strings.delete_forbidden),
    }
}

pub fn contact(app: &App, args: &ContactArgs) -> Result<String> {
    let Some(links) = app.state().contact_links(&args.id) else {
        bail!("no listing with id {}", args.id);
    };
    Ok(format!("call      {}\nwhatsapp  {}\n", links.call, links.whatsapp))
}

pub fn describe(app: &mut App, args: &DescribeArgs) -> Result<String> {
    let category = args.category.as_deref().map(parse_category).transpose()?;
    let state = app.state_mut();
    state.close_compose();
    state.open_compose();
    if let Some(form) = state.compose_mut() {
        form.title = args.title.clone();
        form.category = category.unwrap_or_default();
    }
    if !app.request_description() {
        app.state_mut().close_compose();
        bail!("a title is required to generate a description");
    }
    let timeout = app.config.ai.timeout().saturating_add(Duration::from_secs(1));
    let finished = app.wait_for_description(timeout);
    let description = app
        .state()
        .compose()
        .map(|form| form.description.clone())
        .unwrap_or_default();
    app.state_mut().close_compose();
    if !finished {
        bail!("timed out waiting for a description");
    }
    Ok(format!("{description}\n"))
}

pub fn login(app: &mut App, args: LoginArgs) -> Result<String> {
    let phone_digits = app.config.auth.phone_digits;
    let code_digits = app.config.auth.code_digits;
    let state = app.state_mut();
    state.close_auth();
    state.open_auth();

    let phone = match args.phone {
        Some(phone) => phone,
        None => prompt(&format!("Phone ({} digits)", phone_digits))?,
    };
    let Some(auth) = state.auth_mut() else {
        bail!("could not start login");
    };
    auth.set_phone(&phone);
    if !auth.submit_phone(Instant::now()) {
        state.close_auth();
        bail!("phone number needs {phone_digits} digits");
    }
    app.settle(|state| {
        state
            .auth()
            .map_or(true, |auth| auth.step() == AuthStep::CodeEntry)
    });

    let code = match args.code {
        Some(code) => code,
        None => prompt(&format!("Code ({} digits)", code_digits))?,
    };
    let state = app.state_mut();
    let Some(auth) = state.auth_mut() else {
        bail!("login was interrupted");
    };
    auth.set_code(&code);
    if !auth.submit_code(Instant::now()) {
        state.close_auth();
        bail!("confirmation code needs {code_digits} digits");
    }
    app.settle(|state| state.auth().is_none());

    let state = app.state();
    match state.identity() {
        Some(identity) => Ok(format!(
            "{}\n",
            state
                .language()
                .strings()
                .logged_in
                .replace("{identity}", identity)
        )),
        None => bail!("login did not complete"),
    }
}

pub fn logout(app: &mut App) -> String {
    let state = app.state_mut();
    let was = state.identity().map(str::to_string);
    state.logout(Instant::now());
    match was {
        Some(identity) => format!("Logged out {identity}\n"),
        None => "Not logged in.\n".to_string(),
    }
}

pub fn whoami(app: &App) -> String {
    match app.state().identity() {
        Some(identity) => format!("{identity}\n"),
        None => "Not logged in.\n".to_string(),
    }
}

pub fn history(app: &mut App, args: &HistoryArgs) -> Result<String> {
    let state = app.state_mut();
    if args.clear {
        state.clear_history(Instant::now());
        return Ok("Search history cleared.\n".to_string());
    }
    if let Some(number) = args.run {
        let applied = number
            .checked_sub(1)
            .map_or(false, |index| state.apply_history_entry(index, Instant::now()));
        if !applied {
            bail!("no recent search numbered {number}");
        }
        return Ok(format_listing(state, OffsetDateTime::now_utc()));
    }
    if state.history().is_empty() {
        return Ok("No recent searches.\n".to_string());
    }
    let mut out = String::new();
    for (idx, query) in state.history().iter().enumerate() {
        let _ = writeln!(&mut out, "{}. {query}", idx + 1);
    }
    Ok(out)
}

pub fn language(app: &mut App, args: &LangArgs) -> Result<String> {
    let state = app.state_mut();
    if let Some(language) = args.language {
        state.set_language(language, Instant::now());
    }
    Ok(format!("{}\n", state.language()))
}

fn parse_category(raw: &str) -> Result<Category> {
    Category::parse(raw).with_context(|| format!("unknown category '{raw}'"))
}

fn parse_city(raw: &str) -> Result<City> {
    City::parse(raw).with_context(|| format!("unknown city '{raw}'"))
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ai::testing::StubGenerator;
    use crate::config::{AppConfig, AuthConfig, ConfigPaths};
    use crate::storage::{self, SharedStore};
    use std::sync::Arc;
    use tempfile::TempDir;

    type TestResult<T = ()> = Result<T>;

    #[test]
    fn cli_list_marks_hits_and_records_history() -> TestResult {
        let (_temp_dir, mut app) = setup_app()?;
        let args = ListArgs {
            query: vec!["iphone".into()],
            ..ListArgs::default()
        };
        let output = list_ads(&mut app, &args)?;

        assert!(output.contains("Найдено 1 объявлений"));
        assert!(output.contains("#1  [iPhone] 15 Pro Max 256GB  [VIP]"));
        assert!(output.contains("12 500 TJS"));
        assert!(!output.contains("Camry"));
        assert_eq!(app.state().history(), ["iphone"]);
        Ok(())
    }

    #[test]
    fn cli_list_filters_sorts_and_counts() -> TestResult {
        let (_temp_dir, mut app) = setup_app()?;
        let args = ListArgs {
            sort: SortMode::PriceDesc,
            counts: true,
            no_history: true,
            ..ListArgs::default()
        };
        let output = list_ads(&mut app, &args)?;
        let camry = output.find("Toyota Camry").expect("camry listed");
        let iphone = output.find("iPhone").expect("iphone listed");
        assert!(camry < iphone);
        assert!(output.starts_with("Все объявления"));
        assert!(output.contains("Авто"));
        assert!(!output.contains("Недвижимость"));

        let args = ListArgs {
            city: Some("Худжанд".into()),
            ..ListArgs::default()
        };
        let output = list_ads(&mut app, &args)?;
        assert!(output.contains("Toyota Camry"));
        assert!(!output.contains("iPhone"));
        assert!(app.state().history().is_empty());

        let args = ListArgs {
            category: Some("spaceships".into()),
            ..ListArgs::default()
        };
        assert!(list_ads(&mut app, &args).is_err());
        Ok(())
    }

    #[test]
    fn cli_post_requires_login() -> TestResult {
        let (_temp_dir, mut app) = setup_app()?;
        let err = post_ad(&mut app, post_args()).unwrap_err();
        assert!(err.to_string().contains("bozor login"));
        assert_eq!(app.state().ads().len(), 2);
        Ok(())
    }

    #[test]
    fn cli_login_post_and_delete_own_listing() -> TestResult {
        let (_temp_dir, mut app) = setup_app()?;
        let output = login(
            &mut app,
            LoginArgs {
                phone: Some("90 011 22 33".into()),
                code: Some("1234".into()),
            },
        )?;
        insta::assert_snapshot!(output.trim_end(), @"Вы вошли как +992 900112233");
        insta::assert_snapshot!(whoami(&app).trim_end(), @"+992 900112233");

        let output = post_ad(&mut app, post_args())?;
        let id = output
            .trim()
            .rsplit('#')
            .next()
            .expect("id in output")
            .to_string();
        assert_eq!(app.state().ads()[0].id, id);
        assert_eq!(app.state().ads()[0].description, "Stub description.");

        let shown = show_ad(&app, &ShowArgs { id: id.clone() })?;
        assert!(shown.contains("(your listing)"));
        assert!(shown.contains("Бесплатно"));

        assert!(delete_ad(&mut app, &DeleteArgs { id: "1".into() }).is_err());
        delete_ad(&mut app, &DeleteArgs { id })?;
        assert_eq!(app.state().ads().len(), 2);

        assert_eq!(logout(&mut app), "Logged out +992 900112233\n");
        assert_eq!(whoami(&app), "Not logged in.\n");
        Ok(())
    }

    #[test]
    fn cli_login_rejects_short_phone() -> TestResult {
        let (_temp_dir, mut app) = setup_app()?;
        let result = login(
            &mut app,
            LoginArgs {
                phone: Some("123".into()),
                code: Some("1234".into()),
            },
        );
        assert!(result.is_err());
        assert!(app.state().identity().is_none());
        assert!(app.state().auth().is_none());
        Ok(())
    }

    #[test]
    fn cli_language_persists_between_runs() -> TestResult {
        let (temp_dir, mut app) = setup_app()?;
        let output = language(
            &mut app,
            &LangArgs {
                language: Some(Language::Tg),
            },
        )?;
        assert_eq!(output, "tg\n");

        let mut reopened = open_app(temp_dir.path())?;
        let output = list_ads(&mut reopened, &ListArgs::default())?;
        assert!(output.starts_with("Ҳамаи эълонҳо"));
        Ok(())
    }

    #[test]
    fn cli_contact_and_describe() -> TestResult {
        let (_temp_dir, mut app) = setup_app()?;
        let output = contact(&app, &ContactArgs { id: "1".into() })?;
        assert_eq!(
            output,
            "call      tel:+992900112233\nwhatsapp  https://wa.me/992900112233\n"
        );
        assert!(contact(&app, &ContactArgs { id: "404".into() }).is_err());

        let output = describe(
            &mut app,
            &DescribeArgs {
                title: "Toyota".into(),
                category: Some("AUTO".into()),
            },
        )?;
        assert_eq!(output, "Stub description.\n");
        assert!(!app.state().is_composing());
        Ok(())
    }

    #[test]
    fn cli_history_lists_and_clears() -> TestResult {
        let (_temp_dir, mut app) = setup_app()?;
        assert_eq!(history(&mut app, &HistoryArgs::default())?, "No recent searches.\n");
        for query in ["camry", "iphone", "CAMRY"] {
            list_ads(
                &mut app,
                &ListArgs {
                    query: vec![query.into()],
                    ..ListArgs::default()
                },
            )?;
        }
        assert_eq!(history(&mut app, &HistoryArgs::default())?, "1. CAMRY\n2. iphone\n");
        history(
            &mut app,
            &HistoryArgs {
                clear: true,
                ..HistoryArgs::default()
            },
        )?;
        assert!(app.state().history().is_empty());
        Ok(())
    }

    #[test]
    fn cli_history_reruns_numbered_search() -> TestResult {
        let (_temp_dir, mut app) = setup_app()?;
        for query in ["camry", "iphone"] {
            list_ads(
                &mut app,
                &ListArgs {
                    query: vec![query.into()],
                    ..ListArgs::default()
                },
            )?;
        }
        let rerun = HistoryArgs {
            run: Some(2),
            ..HistoryArgs::default()
        };
        let output = history(&mut app, &rerun)?;
        assert!(output.contains("#2  Toyota [Camry] 2022"));
        assert!(!output.contains("iPhone"));
        assert_eq!(app.state().history(), ["camry", "iphone"]);

        let missing = HistoryArgs {
            run: Some(9),
            ..HistoryArgs::default()
        };
        assert!(history(&mut app, &missing).is_err());
        let zero = HistoryArgs {
            run: Some(0),
            ..HistoryArgs::default()
        };
        assert!(history(&mut app, &zero).is_err());
        Ok(())
    }

    #[test]
    fn cli_list_keeps_untrimmed_query() -> TestResult {
        let (_temp_dir, mut app) = setup_app()?;
        let args = ListArgs {
            query: vec!["  Toyota ".into()],
            ..ListArgs::default()
        };
        let output = list_ads(&mut app, &args)?;
        assert_eq!(app.state().history(), ["  Toyota "]);
        assert_eq!(app.state().filter().query, "  Toyota ");
        assert!(app.state().results().is_empty());
        assert!(output.starts_with("Ничего не найдено"));

        let args = ListArgs {
            query: vec!["Toyota ".into()],
            ..ListArgs::default()
        };
        list_ads(&mut app, &args)?;
        let ids: Vec<&str> = app.state().results().iter().map(|ad| ad.id.as_str()).collect();
        assert_eq!(ids, ["2"]);
        Ok(())
    }

    fn post_args() -> PostArgs {
        PostArgs {
            title: "Old sofa".into(),
            price: "0".into(),
            phone: "900112233".into(),
            category: Some("OTHER".into()),
            city: Some("Kulob".into()),
            ai: true,
            ..PostArgs::default()
        }
    }

    fn setup_app() -> TestResult<(TempDir, App)> {
        let temp = TempDir::new().context("creating temp dir")?;
        let app = open_app(temp.path())?;
        Ok((temp, app))
    }

    fn open_app(root: &std::path::Path) -> TestResult<App> {
        let paths = ConfigPaths::rooted_at(root);
        let config = AppConfig {
            auth: AuthConfig {
                delay_ms: 0,
                ..AuthConfig::default()
            },
            ..AppConfig::default()
        };
        let store: SharedStore = Arc::new(storage::init(&paths, &config.storage)?);
        Ok(App::new(
            Arc::new(config),
            store,
            Arc::new(StubGenerator {
                reply: Some("Stub description.".into()),
            }),
        ))
    }
}
