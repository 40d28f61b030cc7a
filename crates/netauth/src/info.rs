//! Output projection for settled selections.
//!
//! Once [`crate::Selection::wait`] returns true, callers read the selection
//! either keyed field by field or as one [`AuthInfo`] record carrying the
//! numeric GSSD name-type codes downstream daemons expect.

use crate::mechanism::{ClientNameType, GssdClientType, GssdServerType, Mechanism, ServerNameType};
use crate::selection::Selection;

/// Name used for SPNEGO-wrapped mechanisms.
const SPNEGO_NAME: &str = "SPNEGO";

/// Keys accepted by [`Selection::info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKey {
    /// The client name.
    Client,
    /// The server name.
    Server,
    /// The negotiated mechanism name, SPNEGO-wrapped when applicable.
    Mechanism,
    /// The raw inner mechanism name.
    InnerMechanism,
    /// The credential type.
    CredentialType,
    /// The human-readable label.
    Label,
    /// Whether a credential is already bound.
    HaveCredential,
    /// Whether the mechanism is wrapped in SPNEGO.
    UseSpnego,
    /// A printable client form for UI display.
    PrintableClient,
}

/// A projected selection field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoValue {
    /// A string field.
    Text(String),
    /// A boolean field.
    Flag(bool),
}

impl InfoValue {
    /// The string payload, if this is a text field.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Flag(_) => None,
        }
    }

    /// The boolean payload, if this is a flag field.
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(*flag),
            Self::Text(_) => None,
        }
    }
}

/// The full projection of a settled selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthInfo {
    /// Client name.
    pub client: String,
    /// Server name.
    pub server: String,
    /// Mechanism name, SPNEGO-wrapped when the flag is set.
    pub mechanism: String,
    /// Raw inner mechanism name.
    pub inner_mechanism: String,
    /// Numeric client-name code.
    pub client_name_type: GssdClientType,
    /// Numeric server-name code.
    pub server_name_type: GssdServerType,
    /// Whether the mechanism is wrapped in SPNEGO.
    pub use_spnego: bool,
    /// Whether a credential is already bound.
    pub have_credential: bool,
    /// Human-readable label, when one was derived.
    pub label: Option<String>,
}

impl Selection {
    /// Read one projected field.
    ///
    /// Meaningful after [`Selection::wait`] returned true; `Server` is
    /// `None` while a resolver still owns the selection.
    #[must_use]
    pub fn info(&self, key: InfoKey) -> Option<InfoValue> {
        let state = self.state.lock();
        let mech = self.mechanism();
        match key {
            InfoKey::Client => Some(InfoValue::Text(state.client.clone())),
            InfoKey::Server => state.server.clone().map(InfoValue::Text),
            InfoKey::Mechanism => Some(InfoValue::Text(wrapped_name(mech, state.spnego))),
            InfoKey::InnerMechanism | InfoKey::CredentialType => {
                Some(InfoValue::Text(mech.name().to_owned()))
            }
            InfoKey::Label => state.label.clone().map(InfoValue::Text),
            InfoKey::HaveCredential => Some(InfoValue::Flag(state.have_cred)),
            InfoKey::UseSpnego => Some(InfoValue::Flag(state.spnego)),
            InfoKey::PrintableClient => Some(InfoValue::Text(
                state.label.clone().unwrap_or_else(|| state.client.clone()),
            )),
        }
    }

    /// Project the selection into one [`AuthInfo`] record.
    ///
    /// Returns `None` while the server principal is unresolved or after
    /// cancellation.
    #[must_use]
    pub fn auth_info(&self) -> Option<AuthInfo> {
        if self.latch.is_cancelled() {
            return None;
        }
        let state = self.state.lock();
        let server = state.server.clone()?;
        let mech = self.mechanism();

        let client_name_type = match state.client_type {
            ClientNameType::Username if mech == Mechanism::Ntlm => GssdClientType::NtlmPrincipal,
            ClientNameType::Username | ClientNameType::Uuid => GssdClientType::User,
            ClientNameType::Krb5Principal => GssdClientType::Krb5Principal,
            ClientNameType::Krb5PrincipalReferral => GssdClientType::Krb5Referral,
        };
        let server_name_type = match self.server_type() {
            ServerNameType::ServiceBased => GssdServerType::HostBased,
            ServerNameType::Krb5Principal => GssdServerType::Krb5Principal,
            ServerNameType::Krb5PrincipalReferral => GssdServerType::Krb5Referral,
        };

        Some(AuthInfo {
            client: state.client.clone(),
            server,
            mechanism: wrapped_name(mech, state.spnego),
            inner_mechanism: mech.name().to_owned(),
            client_name_type,
            server_name_type,
            use_spnego: state.spnego,
            have_credential: state.have_cred,
            label: state.label.clone(),
        })
    }
}

fn wrapped_name(mech: Mechanism, spnego: bool) -> String {
    if spnego {
        SPNEGO_NAME.to_owned()
    } else {
        mech.name().to_owned()
    }
}
