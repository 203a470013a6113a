use std::str::FromStr;

use anyhow::{Context, Result};

use crate::config::Language;
use crate::storage::{SharedStore, LANGUAGE_KEY, SESSION_KEY};

pub mod auth;

pub use auth::{AuthEvent, AuthFlow, AuthStep};

/// Language preference and logged-in identity, read once at startup.
/// Setters write through to the store.
pub struct Settings {
    store: SharedStore,
    language: Language,
    identity: Option<String>,
}

impl Settings {
    pub fn load(store: SharedStore, default_language: Language) -> Self {
        let language = match store.get(LANGUAGE_KEY) {
            Ok(Some(raw)) => Language::from_str(raw.trim()).unwrap_or_else(|_| {
                tracing::warn!(stored = %raw, "unknown stored language, using default");
                default_language
            }),
            Ok(None) => default_language,
            Err(err) => {
                tracing::warn!(?err, "failed to read language preference");
                default_language
            }
        };
        let identity = match store.get(SESSION_KEY) {
            Ok(value) => value.filter(|identity| !identity.trim().is_empty()),
            Err(err) => {
                tracing::warn!(?err, "failed to read session identity");
                None
            }
        };
        Self {
            store,
            language,
            identity,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn set_language(&mut self, language: Language) -> Result<()> {
        self.store
            .set(LANGUAGE_KEY, language.as_ref())
            .context("persisting language preference")?;
        self.language = language;
        Ok(())
    }

    pub fn sign_in(&mut self, identity: impl Into<String>) -> Result<()> {
        let identity = identity.into();
        self.store
            .set(SESSION_KEY, &identity)
            .context("persisting session identity")?;
        tracing::info!(%identity, "signed in");
        self.identity = Some(identity);
        Ok(())
    }

    pub fn sign_out(&mut self) -> Result<()> {
        self.store
            .remove(SESSION_KEY)
            .context("clearing session identity")?;
        if let Some(identity) = self.identity.take() {
            tracing::info!(%identity, "signed out");
        }
        Ok(())
    }
}
