//! User-selection overrides.
//!
//! The preferences store may carry a list of selections the user pinned for
//! specific hosts. Matching entries are added ahead of everything the
//! guessers derive, bypassing the specific-name filter, so a pinned entry
//! always becomes the preferred candidate.

use std::sync::Arc;

use crate::mechanism::{ClientNameType, Mechanism, ServerNameType};
use crate::selection::AddFlags;
use crate::session::SessionInner;

pub(crate) fn run(session: &Arc<SessionInner>) {
    let entries = match session.providers.preferences.user_selections() {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(%err, "user selections unavailable");
            return;
        }
    };

    for entry in entries {
        if !entry.domain.eq_ignore_ascii_case(&session.hostname) {
            continue;
        }
        // An entry without a user applies to any session user.
        if let Some(user) = &entry.user {
            if user != &session.username {
                continue;
            }
        }
        let mech: Mechanism = match entry.mech.parse() {
            Ok(mech) => mech,
            Err(err) => {
                tracing::debug!(%err, domain = %entry.domain, "skipping override entry");
                continue;
            }
        };
        let server = format!("{}@{}", session.service, session.hostname);
        session.add_selection(
            &entry.client,
            ClientNameType::Username,
            Some(server),
            ServerNameType::ServiceBased,
            mech,
            session.default_flags() | AddFlags::FORCE_ADD,
        );
    }
}
