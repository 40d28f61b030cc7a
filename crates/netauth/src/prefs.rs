//! Preferences store interface.
//!
//! Two app-scoped keys feed the guessers: `GSSEnable` (a feature flag,
//! treated as true when absent) and `UserSelections` (an ordered list of
//! per-host selection overrides the user pinned manually).

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Preference key for the GSS feature flag.
pub const GSS_ENABLE_KEY: &str = "GSSEnable";

/// Preference key for the user-selection override list.
pub const USER_SELECTIONS_KEY: &str = "UserSelections";

/// One user-pinned selection override.
///
/// `domain` is compared case-insensitively against the session hostname;
/// an absent `user` matches any session user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSelection {
    /// Mechanism name, parsed with [`crate::Mechanism`]'s `FromStr`.
    pub mech: String,
    /// Hostname the override applies to.
    pub domain: String,
    /// Session user the override applies to; `None` matches any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Client name to offer.
    pub client: String,
}

/// The preferences-store collaborator.
pub trait PreferencesStore: Send + Sync {
    /// The `GSSEnable` feature flag; defaults to true when unset.
    fn gss_enabled(&self) -> bool {
        true
    }

    /// The `UserSelections` override list; defaults to empty.
    fn user_selections(&self) -> Result<Vec<UserSelection>> {
        Ok(Vec::new())
    }
}
