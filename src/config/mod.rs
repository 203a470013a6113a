use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub mod locale;

pub use locale::{Language, Strings};

const APP_DOMAIN: &str = "tj";
const APP_ORG: &str = "Bozor";
const APP_NAME: &str = "bozor";

pub const CONFIG_ENV: &str = "BOZOR_CONFIG";
pub const DATA_ENV: &str = "BOZOR_DATA";

const MAX_AI_TIMEOUT_SECS: u64 = 600;

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let override_data = env::var(DATA_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let database_path = data_root.join("market.db");

        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            data_dir: data_root,
            database_path,
            log_dir,
            state_dir,
        })
    }

    /// Lays every path out under a single root; used by tests and `--data-dir` sandboxes.
    pub fn rooted_at(root: &Path) -> Self {
        let config_dir = root.join("config");
        let data_dir = root.join("data");
        let state_dir = root.join("state");
        Self {
            config_file: config_dir.join("config.toml"),
            config_dir,
            database_path: data_dir.join("market.db"),
            data_dir,
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Language used until the user picks one explicitly.
    pub language: Language,
    pub auth: AuthConfig,
    pub compose: ComposeConfig,
    pub toast: ToastConfig,
    pub ai: AiConfig,
    pub storage: StorageOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language: Language::Ru,
            auth: AuthConfig::default(),
            compose: ComposeConfig::default(),
            toast: ToastConfig::default(),
            ai: AiConfig::default(),
            storage: StorageOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        self.auth.sanitize();
        self.compose.sanitize();
        self.ai.sanitize();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Digits required before a code can be requested.
    pub phone_digits: usize,
    /// Exact length of the confirmation code.
    pub code_digits: usize,
    /// Artificial latency for both the "send code" and "verify" steps.
    pub delay_ms: u64,
    pub country_prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            phone_digits: 9,
            code_digits: 4,
            delay_ms: 1000,
            country_prefix: "+992".into(),
        }
    }
}

impl AuthConfig {
    pub fn delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.delay_ms)
    }

    /// Prefix without the leading `+`, as used in chat links.
    pub fn dial_code(&self) -> &str {
        self.country_prefix.trim_start_matches('+')
    }

    fn sanitize(&mut self) {
        let defaults = AuthConfig::default();
        if self.phone_digits == 0 {
            tracing::warn!("auth.phone_digits must be positive, falling back to default");
            self.phone_digits = defaults.phone_digits;
        }
        if self.code_digits == 0 {
            tracing::warn!("auth.code_digits must be positive, falling back to default");
            self.code_digits = defaults.code_digits;
        }
        if !self.country_prefix.starts_with('+')
            || self.country_prefix.len() < 2
            || !self.country_prefix[1..].chars().all(|ch| ch.is_ascii_digit())
        {
            tracing::warn!(prefix = %self.country_prefix, "invalid country prefix, falling back to +992");
            self.country_prefix = defaults.country_prefix;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    pub currency: String,
    pub max_video_bytes: u64,
    /// `{seed}` is replaced with a random token per listing.
    pub placeholder_image: String,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            currency: "TJS".into(),
            max_video_bytes: 25 * 1024 * 1024,
            placeholder_image: "https://picsum.photos/seed/{seed}/400/300".into(),
        }
    }
}

impl ComposeConfig {
    pub fn placeholder_for(&self, seed: &str) -> String {
        self.placeholder_image.replace("{seed}", seed)
    }

    fn sanitize(&mut self) {
        let valid_currency =
            self.currency.len() == 3 && self.currency.chars().all(|ch| ch.is_ascii_uppercase());
        if !valid_currency {
            tracing::warn!(currency = %self.currency, "currency must be a 3-letter code, falling back to TJS");
            self.currency = ComposeConfig::default().currency;
        }
        if !self.placeholder_image.contains("{seed}") {
            tracing::warn!("placeholder_image lacks a {{seed}} marker; every listing will share one image");
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToastConfig {
    pub ttl_ms: u64,
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self { ttl_ms: 3000 }
    }
}

impl ToastConfig {
    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ttl_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-3-flash-preview".into(),
            api_key_env: "GEMINI_API_KEY".into(),
            timeout_secs: 30,
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    fn sanitize(&mut self) {
        if self.timeout_secs == 0 {
            tracing::warn!("ai.timeout_secs must be positive, falling back to default");
            self.timeout_secs = AiConfig::default().timeout_secs;
        } else if self.timeout_secs > MAX_AI_TIMEOUT_SECS {
            tracing::warn!(
                timeout_secs = self.timeout_secs,
                "ai.timeout_secs too large, capping at {MAX_AI_TIMEOUT_SECS}"
            );
            self.timeout_secs = MAX_AI_TIMEOUT_SECS;
        }
    }

    pub fn api_key(&self) -> Option<String> {
        env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        Ok(())
    }
}
