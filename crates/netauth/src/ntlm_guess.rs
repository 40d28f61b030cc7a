//! The NTLM guesser.
//!
//! NTLM is only worth offering for SMB-like services, and never when the
//! caller brought client certificates (a certificate identity always
//! negotiates through a Kerberos-family mechanism). Client names come from
//! the `user@realm` / `domain\user` split of the supplied username, with a
//! host-scoped fallback, plus one candidate per credential the provider
//! already holds.

use std::sync::Arc;

use crate::hints::MechOid;
use crate::mechanism::{ClientNameType, Mechanism, ServerNameType, service_class};
use crate::selection::AddFlags;
use crate::session::SessionInner;

pub(crate) async fn run(session: &Arc<SessionInner>) {
    if !session.certificates.is_empty() {
        return;
    }
    let service = session.service.as_str();
    if service != service_class::CIFS && service != service_class::HOST {
        return;
    }
    if let Some(hints) = &session.hints {
        if !hints.contains(MechOid::Ntlm) {
            return;
        }
    }

    let mut flags = session.default_flags();
    if session
        .hints
        .as_ref()
        .is_some_and(|h| h.value_is_raw(MechOid::Ntlm))
    {
        // The server speaks raw NTLM, not the SPNEGO-wrapped variant.
        flags -= AddFlags::USE_SPNEGO;
    }

    let server = format!("{}@{}", session.service, session.hostname);

    if session.password.is_some() {
        let username = session.username.as_str();
        if username.contains('@') {
            session.add_selection(
                username,
                ClientNameType::Username,
                Some(server.clone()),
                ServerNameType::ServiceBased,
                Mechanism::Ntlm,
                flags | AddFlags::FORCE_ADD,
            );
        } else if let Some(backslash) = username.find('\\') {
            let domain = &username[..backslash];
            let user = &username[backslash + 1..];
            let client = format!("{user}@{domain}");
            session.add_selection(
                &client,
                ClientNameType::Username,
                Some(server.clone()),
                ServerNameType::ServiceBased,
                Mechanism::Ntlm,
                flags | AddFlags::FORCE_ADD,
            );
        } else {
            let client = format!("{username}@\\{}", session.hostname);
            session.add_selection(
                &client,
                ClientNameType::Username,
                Some(server.clone()),
                ServerNameType::ServiceBased,
                Mechanism::Ntlm,
                flags,
            );
        }

        if session.specific_name.is_some() {
            let client = format!("{}@\\{}", session.specific_or_username(), session.hostname);
            session.add_selection(
                &client,
                ClientNameType::Username,
                Some(server.clone()),
                ServerNameType::ServiceBased,
                Mechanism::Ntlm,
                flags,
            );
        }
    }

    match session.providers.ntlm.credentials(Mechanism::Ntlm).await {
        Ok(creds) => {
            for cred in creds {
                let name = cred.display_name();
                let outcome = session.add_selection(
                    &name,
                    ClientNameType::Username,
                    Some(server.clone()),
                    ServerNameType::ServiceBased,
                    Mechanism::Ntlm,
                    flags,
                );
                if let Some(selection) = outcome.added() {
                    selection.bind_credential(cred);
                }
            }
        }
        Err(err) => tracing::warn!(%err, "NTLM credential enumeration failed"),
    }
}
