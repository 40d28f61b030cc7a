//! Negotiation sessions.
//!
//! A [`Session`] is one negotiation against one target service: it
//! normalises the caller's input, runs the guessers in a fixed order
//! (user-selection overrides, the Kerberos cluster, NTLM), and owns the
//! resulting selection list. `create` returns as soon as the guessers have
//! run; selections whose server principal needs a network lookup keep
//! resolving in background tasks and settle independently.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;

use crate::certs::{CertificateStore, ClientCertificate};
use crate::error::{Error, Result};
use crate::gss::NtlmProvider;
use crate::hints::{MechOid, ServerHints};
use crate::kerberos::{KerberosContext, KerberosProvider};
use crate::mechanism::{ClientNameType, Mechanism, ServerNameType, service_class};
use crate::prefs::PreferencesStore;
use crate::selection::{AddFlags, AddOutcome, Selection, SelectionSet};
use crate::{kerberos_guess, ntlm_guess, user_selections};

/// Hostname suffixes that mark a host as link-local for LKDC purposes.
const LOCAL_SUFFIXES: [&str; 3] = [".local", ".members.mac.com", ".members.me.com"];

/// The external collaborators a session drives.
#[derive(Clone)]
pub struct Providers {
    /// Kerberos provider.
    pub kerberos: Arc<dyn KerberosProvider>,
    /// NTLM/IAKERB provider.
    pub ntlm: Arc<dyn NtlmProvider>,
    /// Certificate store.
    pub certificates: Arc<dyn CertificateStore>,
    /// Preferences store.
    pub preferences: Arc<dyn PreferencesStore>,
}

/// Certificate material supplied by the caller.
///
/// A single certificate or identity is treated as a one-element sequence.
#[derive(Default)]
pub enum CertificateInput {
    /// No client certificates.
    #[default]
    None,
    /// A single certificate or identity.
    Single(Arc<dyn ClientCertificate>),
    /// A sequence of certificates or identities.
    Sequence(Vec<Arc<dyn ClientCertificate>>),
}

impl CertificateInput {
    fn into_vec(self) -> Vec<Arc<dyn ClientCertificate>> {
        match self {
            Self::None => Vec::new(),
            Self::Single(cert) => vec![cert],
            Self::Sequence(certs) => certs,
        }
    }
}

/// Caller-supplied negotiation input.
#[derive(Default)]
pub struct ClientInfo {
    /// User name, kept verbatim.
    pub username: Option<String>,
    /// Password for credential acquisition.
    pub password: Option<String>,
    /// Client certificates.
    pub certificates: CertificateInput,
    /// Server-advertised authentication hints.
    pub server_hints: Option<ServerHints>,
}

impl ClientInfo {
    /// Start from empty input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user name.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Supply a single client certificate or identity.
    #[must_use]
    pub fn with_certificate(mut self, cert: Arc<dyn ClientCertificate>) -> Self {
        self.certificates = CertificateInput::Single(cert);
        self
    }

    /// Supply a sequence of client certificates.
    #[must_use]
    pub fn with_certificates(mut self, certs: Vec<Arc<dyn ClientCertificate>>) -> Self {
        self.certificates = CertificateInput::Sequence(certs);
        self
    }

    /// Supply server-advertised hints.
    #[must_use]
    pub fn with_server_hints(mut self, hints: ServerHints) -> Self {
        self.server_hints = Some(hints);
        self
    }
}

impl std::fmt::Debug for ClientInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the password in debug output
        let certs = match &self.certificates {
            CertificateInput::None => 0,
            CertificateInput::Single(_) => 1,
            CertificateInput::Sequence(v) => v.len(),
        };
        f.debug_struct("ClientInfo")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("certificates", &certs)
            .field("server_hints", &self.server_hints)
            .finish()
    }
}

/// Shared session state. Selections refer back to it weakly; the session
/// outlives all of them.
pub(crate) struct SessionInner {
    pub(crate) hostname: String,
    pub(crate) service: String,
    pub(crate) username: String,
    pub(crate) specific_name: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) certificates: Vec<Arc<dyn ClientCertificate>>,
    pub(crate) hints: Option<ServerHints>,
    pub(crate) default_spnego: bool,
    pub(crate) providers: Providers,
    pub(crate) selections: SelectionSet,
    pub(crate) krb_context: OnceCell<Arc<dyn KerberosContext>>,
    cancelled: AtomicBool,
}

impl SessionInner {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add_selection(
        self: &Arc<Self>,
        client: &str,
        client_type: ClientNameType,
        server: Option<String>,
        server_type: ServerNameType,
        mech: Mechanism,
        flags: AddFlags,
    ) -> AddOutcome {
        self.selections.add(
            &Arc::downgrade(self),
            client,
            client_type,
            server,
            server_type,
            mech,
            flags,
        )
    }

    /// Base flags for guesser adds: the session-wide SPNEGO default.
    pub(crate) fn default_flags(&self) -> AddFlags {
        if self.default_spnego {
            AddFlags::USE_SPNEGO
        } else {
            AddFlags::empty()
        }
    }

    pub(crate) fn hints_contain(&self, oid: MechOid) -> bool {
        self.hints.as_ref().is_some_and(|h| h.contains(oid))
    }

    pub(crate) fn hints_contain_any(&self, oids: &[MechOid]) -> bool {
        self.hints.as_ref().is_some_and(|h| h.contains_any(oids))
    }

    /// The specific-name when the username was delimited, else the
    /// username itself.
    pub(crate) fn specific_or_username(&self) -> &str {
        self.specific_name.as_deref().unwrap_or(&self.username)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        for selection in self.selections.snapshot() {
            selection.latch.cancel();
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        // Wake any waiter that outlived the session through a clone of a
        // selection handle.
        self.cancel();
    }
}

/// One negotiation against one target service.
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Enumerate candidate selections for `hostname`/`service`.
    ///
    /// Returns immediately once the guessers have run; selections with
    /// unresolved servers keep resolving in the background and must be
    /// [`Selection::wait`]ed on before use.
    ///
    /// # Errors
    ///
    /// [`Error::NoUsername`] when no username was supplied and the OS has
    /// none; [`Error::NoMechanism`] when the guessers produced zero
    /// selections.
    pub async fn create(
        providers: Providers,
        hostname: &str,
        service: &str,
        info: Option<ClientInfo>,
    ) -> Result<Self> {
        let info = info.unwrap_or_default();
        let hostname = canonical_hostname(hostname);
        let username = match info.username {
            Some(name) if !name.is_empty() => name,
            _ => os_login_name().ok_or(Error::NoUsername)?,
        };
        let specific_name = split_specific_name(&username);
        let certificates = info.certificates.into_vec();
        let hints = info.server_hints;

        // AFP servers that do not advertise AppleLKDC cannot negotiate;
        // everything else defaults to SPNEGO wrapping.
        let apple_lkdc = hints
            .as_ref()
            .is_some_and(|h| h.contains(MechOid::AppleLkdc));
        let default_spnego = !(service == service_class::AFP && !apple_lkdc);

        let inner = Arc::new(SessionInner {
            selections: SelectionSet::new(specific_name.clone()),
            hostname,
            service: service.to_owned(),
            username,
            specific_name,
            password: info.password,
            certificates,
            hints,
            default_spnego,
            providers,
            krb_context: OnceCell::new(),
            cancelled: AtomicBool::new(false),
        });

        tracing::debug!(
            hostname = %inner.hostname,
            service = %inner.service,
            user = %inner.username,
            "enumerating authentication candidates"
        );

        user_selections::run(&inner);
        kerberos_guess::run(&inner);
        ntlm_guess::run(&inner).await;

        if inner.selections.is_empty() {
            return Err(Error::NoMechanism);
        }
        Ok(Self { inner })
    }

    /// The candidate selections in preference order.
    #[must_use]
    pub fn selections(&self) -> Vec<Arc<Selection>> {
        self.inner.selections.snapshot()
    }

    /// The canonical hostname the session negotiates against.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.inner.hostname
    }

    /// The service class.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// The resolved user name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.inner.username
    }

    /// Cancel the session: every pending or future wait observes failure,
    /// and in-flight acquisition results are discarded.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether the session was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub(crate) fn inner(&self) -> &Arc<SessionInner> {
        &self.inner
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("hostname", &self.inner.hostname)
            .field("service", &self.inner.service)
            .field("username", &self.inner.username)
            .field("selections", &self.inner.selections.snapshot().len())
            .finish()
    }
}

/// Canonicalise a hostname: drop Bonjour browser-service labels
/// (`_service._proto`) and trim leading/trailing dots.
fn canonical_hostname(raw: &str) -> String {
    let trimmed = raw.trim_matches('.');
    if !trimmed.contains("._") {
        return trimmed.to_owned();
    }
    trimmed
        .split('.')
        .filter(|label| !label.starts_with('_'))
        .collect::<Vec<_>>()
        .join(".")
}

/// The short user name: prefix before the first `@`, else suffix after the
/// first `\`. `None` when the username carries no delimiter.
fn split_specific_name(username: &str) -> Option<String> {
    if let Some(at) = username.find('@') {
        return Some(username[..at].to_owned());
    }
    username
        .find('\\')
        .map(|backslash| username[backslash + 1..].to_owned())
}

/// The OS login name, when the environment carries one.
fn os_login_name() -> Option<String> {
    ["USER", "LOGNAME", "USERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|name| !name.is_empty())
}

/// Whether a hostname is link-local for LKDC purposes.
pub(crate) fn hostname_is_local(hostname: &str) -> bool {
    let lower = hostname.to_ascii_lowercase();
    LOCAL_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}
