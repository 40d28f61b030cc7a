//! The Kerberos guesser cluster.
//!
//! Produces candidates from five sources, in order: existing LKDC
//! credential caches, the wellknown LKDC pseudo-realm, classic
//! host-realm/default-realm Kerberos (non-local hosts), classic LKDC with
//! certificate fingerprints (local hosts), and existing non-LKDC caches.
//! Which sources run is decided up front from the server hints, the service
//! class, and the GSS feature flag.
//!
//! Provider failures here are logged and swallowed: a broken cache or an
//! unreadable realm list must not stop the remaining sources from
//! producing viable candidates.

use std::sync::Arc;

use crate::certs::{friendly_display_name, sha1_fingerprint_hex};
use crate::hints::MechOid;
use crate::kerberos::KerberosContext;
use crate::mechanism::{
    ClientNameType, Mechanism, ServerNameType, WELLKNOWN_LKDC_REALM, cache_config, service_class,
};
use crate::selection::{AddFlags, Selection};
use crate::session::{SessionInner, hostname_is_local};

/// Source gating decided from hints, service class, and the feature flag.
#[derive(Debug, Clone, Copy)]
struct Decisions {
    try_iakerb_with_lkdc: bool,
    try_wlkdc: bool,
    try_lkdc_classic: bool,
    have_kerberos: bool,
}

impl Decisions {
    fn decide(session: &SessionInner) -> Self {
        let service = session.service.as_str();
        let smb_like = service == service_class::CIFS || service == service_class::HOST;

        let mut try_iakerb_with_lkdc = false;
        let mut try_wlkdc = false;
        if session.providers.preferences.gss_enabled()
            && session.password.is_some()
            && session.hints_contain(MechOid::Iakerb)
            && session.hints_contain(MechOid::AppleLkdc)
            && !smb_like
        {
            try_iakerb_with_lkdc = true;
        } else if session.hints_contain(MechOid::Pku2u)
            || session.hints_contain(MechOid::AppleLkdc)
            || service == service_class::VNC
        {
            try_wlkdc = true;
        }

        let mut try_lkdc_classic = true;
        if session.hints_contain(MechOid::Pku2u) || session.hints_contain(MechOid::AppleLkdc) {
            try_lkdc_classic = false;
        }
        if let Some(spnego_host) = session.hints.as_ref().and_then(|h| h.spnego_hostname()) {
            if !spnego_host.contains("@LKDC") {
                try_lkdc_classic = false;
            }
        }

        let have_kerberos = session.hints.is_none()
            || session.hints_contain_any(&[
                MechOid::Iakerb,
                MechOid::Kerberos,
                MechOid::KerberosMicrosoft,
                MechOid::Pku2u,
            ]);

        Self {
            try_iakerb_with_lkdc,
            try_wlkdc,
            try_lkdc_classic,
            have_kerberos,
        }
    }
}

pub(crate) fn run(session: &Arc<SessionInner>) {
    let decisions = Decisions::decide(session);
    if !decisions.have_kerberos {
        tracing::debug!("server hints advertise no Kerberos-family mechanism");
        return;
    }

    let context = match session.providers.kerberos.new_context() {
        Ok(context) => {
            let _ = session.krb_context.set(Arc::clone(&context));
            context
        }
        Err(err) => {
            tracing::warn!(%err, "Kerberos context unavailable, skipping Kerberos candidates");
            return;
        }
    };

    existing_caches(session, &context, true);
    wellknown_lkdc(session, &decisions);
    if !hostname_is_local(&session.hostname) {
        classic_kerberos(session, &context);
    } else if decisions.try_lkdc_classic {
        classic_lkdc(session, &context);
    }
    existing_caches(session, &context, false);
}

/// One pass over the credential-cache collection. `lkdc_pass` selects the
/// LKDC caches (with the hostname check) or everything else.
fn existing_caches(session: &Arc<SessionInner>, context: &Arc<dyn KerberosContext>, lkdc_pass: bool) {
    let caches = match context.caches() {
        Ok(caches) => caches,
        Err(err) => {
            tracing::warn!(%err, "credential cache enumeration failed");
            return;
        }
    };

    for cache in caches {
        let principal = match cache.principal() {
            Ok(principal) => principal,
            Err(err) => {
                tracing::debug!(%err, cache = %cache.name(), "cache has no readable principal");
                continue;
            }
        };
        if principal.is_lkdc() != lkdc_pass {
            continue;
        }

        let server = if lkdc_pass {
            // Only offer LKDC caches created for this very host.
            match cache.config(cache_config::LKDC_HOSTNAME) {
                Some(host) if host == session.hostname => {}
                _ => continue,
            }
            let realm = principal.realm();
            format!("{}/{realm}@{realm}", session.service)
        } else {
            format!(
                "{}/{}@{}",
                session.service,
                session.hostname,
                principal.realm()
            )
        };

        let outcome = session.add_selection(
            principal.as_str(),
            ClientNameType::Krb5Principal,
            Some(server),
            ServerNameType::Krb5Principal,
            Mechanism::Kerberos,
            session.default_flags(),
        );
        if let Some(selection) = outcome.added() {
            let label = cache.config(cache_config::FRIENDLY_NAME);
            selection.bind_cache(Arc::clone(&cache), label);
        }
    }
}

/// Candidates in the wellknown LKDC pseudo-realm, for the session user and
/// for each client certificate.
fn wellknown_lkdc(session: &Arc<SessionInner>, decisions: &Decisions) {
    let mech = if decisions.try_iakerb_with_lkdc {
        Mechanism::KerberosIakerb
    } else if decisions.try_wlkdc {
        Mechanism::Kerberos
    } else {
        return;
    };

    let server = format!(
        "{}/localhost@{WELLKNOWN_LKDC_REALM}",
        session.service
    );
    let client = format!("{}@{WELLKNOWN_LKDC_REALM}", session.username);
    session.add_selection(
        &client,
        ClientNameType::Username,
        Some(server.clone()),
        ServerNameType::Krb5Principal,
        mech,
        session.default_flags(),
    );

    let store = session.providers.certificates.as_ref();
    for cert in &session.certificates {
        let name = store
            .kerberos_principal(cert.as_ref())
            .or_else(|| store.apple_id(cert.as_ref()));
        let Some(name) = name else {
            tracing::debug!("certificate maps to neither a principal nor an AppleID");
            continue;
        };
        let client = format!("{name}@{WELLKNOWN_LKDC_REALM}");
        let outcome = session.add_selection(
            &client,
            ClientNameType::Username,
            Some(server.clone()),
            ServerNameType::Krb5Principal,
            mech,
            session.default_flags(),
        );
        if let Some(selection) = outcome.added() {
            selection.attach_certificate(
                Arc::clone(cert),
                friendly_display_name(store, cert.as_ref()),
            );
        }
    }
}

/// Classic host-realm Kerberos for non-local hosts: explicit domains from
/// the username, then the host realm and the default realms.
fn classic_kerberos(session: &Arc<SessionInner>, context: &Arc<dyn KerberosContext>) {
    let username = session.username.as_str();
    let flags = session.default_flags();

    if let Some(at) = username.find('@') {
        let domain = username[at + 1..].to_uppercase();
        if !domain.is_empty() {
            let server = format!("{}/{}@{domain}", session.service, session.hostname);
            session.add_selection(
                username,
                ClientNameType::Username,
                Some(server),
                ServerNameType::Krb5Principal,
                Mechanism::Kerberos,
                flags,
            );
        }
    }

    if let Some(backslash) = username.find('\\') {
        let domain = username[..backslash].to_uppercase();
        let user = &username[backslash + 1..];
        if !domain.is_empty() && !user.is_empty() {
            let client = format!("{user}@{domain}");
            let server = format!("{}/{}@{domain}", session.service, session.hostname);
            session.add_selection(
                &client,
                ClientNameType::Username,
                Some(server),
                ServerNameType::Krb5Principal,
                Mechanism::Kerberos,
                flags | AddFlags::FORCE_ADD,
            );
        }
    }

    let mut realms = Vec::new();
    match context.host_realms(&session.hostname) {
        Ok(found) => realms.extend(found),
        Err(err) => tracing::debug!(%err, "host realm lookup failed"),
    }
    match context.default_realms() {
        Ok(found) => realms.extend(found),
        Err(err) => tracing::debug!(%err, "default realm lookup failed"),
    }
    for realm in realms {
        if realm.is_empty() {
            continue;
        }
        let client = format!("{username}@{realm}");
        let server = format!("{}/{}@{realm}", session.service, session.hostname);
        session.add_selection(
            &client,
            ClientNameType::Username,
            Some(server),
            ServerNameType::Krb5Principal,
            Mechanism::Kerberos,
            flags,
        );
    }
}

/// Classic LKDC for local hosts: certificate fingerprints (and the plain
/// username when a password exists) with the realm resolved in the
/// background.
fn classic_lkdc(session: &Arc<SessionInner>, context: &Arc<dyn KerberosContext>) {
    let store = session.providers.certificates.as_ref();
    for cert in &session.certificates {
        let fingerprint = sha1_fingerprint_hex(cert.der());
        let outcome = session.add_selection(
            &fingerprint,
            ClientNameType::Username,
            None,
            ServerNameType::Krb5Principal,
            Mechanism::Kerberos,
            session.default_flags(),
        );
        if let Some(selection) = outcome.added() {
            selection.attach_certificate(
                Arc::clone(cert),
                friendly_display_name(store, cert.as_ref()),
            );
            spawn_lkdc_resolver(session, context, selection);
        }
    }

    if session.password.is_some() {
        let outcome = session.add_selection(
            &session.username,
            ClientNameType::Username,
            None,
            ServerNameType::Krb5Principal,
            Mechanism::Kerberos,
            session.default_flags(),
        );
        if let Some(selection) = outcome.added() {
            spawn_lkdc_resolver(session, context, selection);
        }
    }
}

/// Resolve the host's LKDC realm off the session's path and complete the
/// selection. The client stem gains the realm suffix and the server becomes
/// the realm's own service principal; both writes land before the latch
/// signals.
fn spawn_lkdc_resolver(
    session: &Arc<SessionInner>,
    context: &Arc<dyn KerberosContext>,
    selection: &Arc<Selection>,
) {
    let context = Arc::clone(context);
    let selection = Arc::clone(selection);
    let hostname = session.hostname.clone();
    let service = session.service.clone();
    tokio::spawn(async move {
        let discovered = tokio::task::spawn_blocking({
            let context = Arc::clone(&context);
            let hostname = hostname.clone();
            move || context.discover_lkdc_realm(&hostname)
        })
        .await;

        match discovered {
            Ok(Ok(realm)) => {
                {
                    let mut state = selection.state.lock();
                    let stem = std::mem::take(&mut state.client);
                    state.client = format!("{stem}@{realm}");
                    state.server = Some(format!("{service}/{realm}@{realm}"));
                }
                selection.latch.signal();
            }
            Ok(Err(err)) => {
                tracing::warn!(%err, %hostname, "LKDC realm discovery failed");
                selection.latch.cancel();
            }
            Err(err) => {
                tracing::warn!(%err, "LKDC resolver task aborted");
                selection.latch.cancel();
            }
        }
    });
}
