//! In-memory preferences store.

use std::sync::Arc;

use netauth::error::{Error, Result};
use netauth::prefs::{PreferencesStore, UserSelection};

/// Configurable in-memory preferences.
pub struct MockPreferences {
    gss_enabled: bool,
    selections: Vec<UserSelection>,
}

impl MockPreferences {
    /// Defaults: GSS enabled, no overrides.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            gss_enabled: true,
            selections: Vec::new(),
        })
    }

    /// Disable the GSS feature flag.
    #[must_use]
    pub fn gss_disabled() -> Arc<Self> {
        Arc::new(Self {
            gss_enabled: false,
            selections: Vec::new(),
        })
    }

    /// Preferences carrying the given override entries.
    #[must_use]
    pub fn with_selections(selections: Vec<UserSelection>) -> Arc<Self> {
        Arc::new(Self {
            gss_enabled: true,
            selections,
        })
    }

    /// Load override entries from their JSON representation, the way a
    /// file-backed store would.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the JSON does not describe a selection list.
    pub fn from_json(json: &str) -> Result<Arc<Self>> {
        let selections: Vec<UserSelection> =
            serde_json::from_str(json).map_err(|err| Error::Io(err.to_string()))?;
        Ok(Self::with_selections(selections))
    }
}

impl PreferencesStore for MockPreferences {
    fn gss_enabled(&self) -> bool {
        self.gss_enabled
    }

    fn user_selections(&self) -> Result<Vec<UserSelection>> {
        Ok(self.selections.clone())
    }
}
