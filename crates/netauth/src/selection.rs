//! Candidate selections and the ordered, de-duplicated selection set.
//!
//! A [`Selection`] is one candidate authentication configuration: mechanism,
//! client name, server name, and wrapper policy, plus whatever the guessers
//! could bind up front (an existing credential cache, a certificate, a
//! label). The set is append-only; its order is the guessers' insertion
//! order and callers treat index 0 as the preferred candidate.

use std::sync::{Arc, Weak};

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::certs::ClientCertificate;
use crate::gss::GssCredential;
use crate::kerberos::CredCache;
use crate::latch::CompletionLatch;
use crate::mechanism::{ClientNameType, Mechanism, ServerNameType};
use crate::session::SessionInner;

bitflags! {
    /// Flags accepted when a guesser adds a candidate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AddFlags: u32 {
        /// Bypass the specific-name filter.
        const FORCE_ADD = 1 << 0;
        /// Wrap the mechanism in SPNEGO when the selection is used.
        const USE_SPNEGO = 1 << 1;
    }
}

/// Mutable per-selection fields. Background resolvers rewrite the name
/// strings before the latch signals; the acquirer binds handles and may
/// rewrite the names again on referral.
#[derive(Default)]
pub(crate) struct SelectionState {
    pub(crate) client: String,
    pub(crate) client_type: ClientNameType,
    pub(crate) server: Option<String>,
    pub(crate) cache: Option<Arc<dyn CredCache>>,
    pub(crate) cred: Option<Arc<dyn GssCredential>>,
    pub(crate) certificate: Option<Arc<dyn ClientCertificate>>,
    pub(crate) label: Option<String>,
    pub(crate) have_cred: bool,
    pub(crate) spnego: bool,
}

/// One candidate authentication configuration.
pub struct Selection {
    mech: Mechanism,
    server_type: ServerNameType,
    pub(crate) state: Mutex<SelectionState>,
    pub(crate) latch: CompletionLatch,
    pub(crate) session: Weak<SessionInner>,
}

impl Selection {
    /// The selection's mechanism tag.
    #[must_use]
    pub fn mechanism(&self) -> Mechanism {
        self.mech
    }

    /// The client name. May still change while the server is unresolved.
    #[must_use]
    pub fn client(&self) -> String {
        self.state.lock().client.clone()
    }

    /// The client-name interpretation.
    #[must_use]
    pub fn client_type(&self) -> ClientNameType {
        self.state.lock().client_type
    }

    /// The server name; `None` while a background resolver still owns it.
    #[must_use]
    pub fn server(&self) -> Option<String> {
        self.state.lock().server.clone()
    }

    /// The server-name interpretation.
    #[must_use]
    pub fn server_type(&self) -> ServerNameType {
        self.server_type
    }

    /// Whether this selection should be wrapped in SPNEGO.
    #[must_use]
    pub fn use_spnego(&self) -> bool {
        self.state.lock().spnego
    }

    /// Whether a credential is already bound to this selection.
    #[must_use]
    pub fn have_credential(&self) -> bool {
        self.state.lock().have_cred
    }

    /// The human-readable label, when one was derived.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        self.state.lock().label.clone()
    }

    /// The certificate attached by a guesser, if any.
    #[must_use]
    pub fn certificate(&self) -> Option<Arc<dyn ClientCertificate>> {
        self.state.lock().certificate.clone()
    }

    /// The bound credential cache, if any.
    #[must_use]
    pub fn credential_cache(&self) -> Option<Arc<dyn CredCache>> {
        self.state.lock().cache.clone()
    }

    /// Whether the owning session cancelled this selection.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.latch.is_cancelled()
    }

    /// Block until the server principal is resolved.
    ///
    /// Returns `true` once the selection is complete and `false` when the
    /// session was cancelled; after `false` the name accessors must not be
    /// trusted for authentication.
    pub async fn wait(&self) -> bool {
        self.latch.wait().await
    }

    pub(crate) fn attach_certificate(
        &self,
        cert: Arc<dyn ClientCertificate>,
        label: Option<String>,
    ) {
        let mut state = self.state.lock();
        state.certificate = Some(cert);
        if label.is_some() {
            state.label = label;
        }
    }

    pub(crate) fn bind_cache(&self, cache: Arc<dyn CredCache>, label: Option<String>) {
        let mut state = self.state.lock();
        state.cache = Some(cache);
        state.have_cred = true;
        if label.is_some() {
            state.label = label;
        }
    }

    pub(crate) fn bind_credential(&self, cred: Arc<dyn GssCredential>) {
        let mut state = self.state.lock();
        state.cred = Some(cred);
        state.have_cred = true;
    }
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Selection")
            .field("mech", &self.mech)
            .field("client", &state.client)
            .field("server", &state.server)
            .field("server_type", &self.server_type)
            .field("spnego", &state.spnego)
            .field("have_cred", &state.have_cred)
            .finish_non_exhaustive()
    }
}

/// Result of a [`SelectionSet::add`] call.
pub(crate) enum AddOutcome {
    /// A new record was appended.
    Added(Arc<Selection>),
    /// An equivalent record already existed; it is returned unchanged.
    Duplicate(Arc<Selection>),
    /// The specific-name filter rejected the candidate.
    Filtered,
}

impl AddOutcome {
    /// The freshly appended record, if this add actually appended one.
    pub(crate) fn added(&self) -> Option<&Arc<Selection>> {
        match self {
            Self::Added(sel) => Some(sel),
            Self::Duplicate(_) | Self::Filtered => None,
        }
    }
}

/// Append-only ordered selection list, de-duplicated by
/// (mechanism, client, server, server-name-type).
pub(crate) struct SelectionSet {
    specific_name: Option<String>,
    items: Mutex<Vec<Arc<Selection>>>,
}

impl SelectionSet {
    pub(crate) fn new(specific_name: Option<String>) -> Self {
        Self {
            specific_name,
            items: Mutex::new(Vec::new()),
        }
    }

    /// Append a candidate unless it is filtered or already present.
    ///
    /// Defaults apply when the caller has nothing more precise: client
    /// names are [`ClientNameType::Username`] and servers are
    /// [`ServerNameType::ServiceBased`]. A candidate without a server gets
    /// a live completion latch; one with a server gets a pre-signalled
    /// latch.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add(
        &self,
        session: &Weak<SessionInner>,
        client: &str,
        client_type: ClientNameType,
        server: Option<String>,
        server_type: ServerNameType,
        mech: Mechanism,
        flags: AddFlags,
    ) -> AddOutcome {
        if let Some(specific) = &self.specific_name {
            if !flags.contains(AddFlags::FORCE_ADD) && !client.starts_with(specific.as_str()) {
                tracing::debug!(client, %mech, "candidate filtered by specific name");
                return AddOutcome::Filtered;
            }
        }

        let mut items = self.items.lock();
        for existing in items.iter() {
            if existing.mech != mech || existing.server_type != server_type {
                continue;
            }
            let state = existing.state.lock();
            if state.client != client {
                continue;
            }
            // Server strings only block a match when both sides have one.
            if let (Some(new_server), Some(old_server)) = (&server, &state.server) {
                if new_server != old_server {
                    continue;
                }
            }
            drop(state);
            return AddOutcome::Duplicate(Arc::clone(existing));
        }

        let latch = if server.is_some() {
            CompletionLatch::signalled()
        } else {
            CompletionLatch::pending()
        };
        let selection = Arc::new(Selection {
            mech,
            server_type,
            latch,
            session: Weak::clone(session),
            state: Mutex::new(SelectionState {
                client: client.to_owned(),
                client_type,
                server,
                spnego: flags.contains(AddFlags::USE_SPNEGO),
                ..SelectionState::default()
            }),
        });
        items.push(Arc::clone(&selection));
        AddOutcome::Added(selection)
    }

    /// Snapshot of the list in insertion order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Selection>> {
        self.items.lock().clone()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
