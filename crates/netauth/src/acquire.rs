//! Credential acquisition.
//!
//! Turns a chosen selection into live credentials. The Kerberos path runs
//! the blocking initial-credential exchange on the blocking pool, stores
//! the result in a matching cache, and adopts whatever client principal the
//! KDC settled on — referrals may rewrite both the client and the server on
//! the selection. The NTLM and IAKERB paths drive the GSS-layer provider
//! asynchronously.
//!
//! Cancellation supersedes success everywhere: a result computed while the
//! session is being cancelled is discarded and the caller sees
//! [`Error::Cancelled`].

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::kerberos::{CredCache, InitialCredsRequest, KrbPrincipal};
use crate::mechanism::{ClientNameType, Mechanism, cache_config, realm_is_lkdc};
use crate::selection::Selection;
use crate::session::SessionInner;

/// Per-call acquisition options.
#[derive(Default)]
pub struct AcquireOptions {
    /// Password override; falls back to the session password.
    pub password: Option<String>,
}

impl AcquireOptions {
    /// Empty options: use whatever the session already holds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the password for this acquisition only.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl std::fmt::Debug for AcquireOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the password in debug output
        f.debug_struct("AcquireOptions")
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Selection {
    /// Acquire credentials for this selection, waiting for the server
    /// principal to resolve first.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] when the session was cancelled (including while
    /// waiting); [`Error::MissingCredentials`] when there is nothing to
    /// try; provider failures verbatim.
    pub async fn acquire_credential(&self, options: AcquireOptions) -> Result<()> {
        if !self.wait().await {
            return Err(Error::Cancelled);
        }
        self.acquire_credential_have_result(options).await
    }

    /// Acquire credentials without waiting for server resolution.
    ///
    /// Callers that already observed [`Selection::wait`] return true use
    /// this form to skip the latch.
    ///
    /// # Errors
    ///
    /// As [`Selection::acquire_credential`].
    pub async fn acquire_credential_have_result(&self, options: AcquireOptions) -> Result<()> {
        let session = self.session.upgrade().ok_or(Error::Cancelled)?;
        if session.is_cancelled() || self.latch.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let result = match self.mechanism() {
            Mechanism::Ntlm => acquire_ntlm(self, &session, &options).await,
            Mechanism::KerberosIakerb => acquire_iakerb(self, &session, &options).await,
            Mechanism::Kerberos | Mechanism::KerberosU2u | Mechanism::KerberosPku2u => {
                acquire_kerberos(self, &session, &options).await
            }
        };

        if session.is_cancelled() {
            return Err(Error::Cancelled);
        }
        result
    }

    /// Acquire in the background and deliver the result to `callback`.
    pub fn acquire_credential_async<F>(self: &Arc<Self>, options: AcquireOptions, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let selection = Arc::clone(self);
        tokio::spawn(async move {
            let result = selection.acquire_credential(options).await;
            callback(result);
        });
    }
}

fn effective_password(session: &SessionInner, options: &AcquireOptions) -> Option<String> {
    options
        .password
        .clone()
        .or_else(|| session.password.clone())
}

/// Kerberos-family acquisition: run the initial-credential exchange and
/// adopt the canonical names the KDC returned.
async fn acquire_kerberos(
    selection: &Selection,
    session: &Arc<SessionInner>,
    options: &AcquireOptions,
) -> Result<()> {
    // A bound cache means credentials already exist; the handle clone is
    // the reference bump.
    if selection.credential_cache().is_some() {
        return Ok(());
    }

    let password = effective_password(session, options);
    let certificate = selection.certificate();
    if password.is_none() && certificate.is_none() {
        return Err(Error::MissingCredentials);
    }

    let context = session
        .krb_context
        .get_or_try_init(|| session.providers.kerberos.new_context())?;

    let client = selection.client();
    let enterprise = client.matches('@').count() == 2;
    let hostname = session.hostname.clone();
    let service = session.service.clone();

    let exchange = {
        let context = Arc::clone(context);
        let client = client.clone();
        let hostname = hostname.clone();
        tokio::task::spawn_blocking(move || -> Result<(KrbPrincipal, Arc<dyn CredCache>)> {
            let principal = context.parse_name(&client, enterprise)?;
            let request = InitialCredsRequest {
                kdc_hostname: principal.is_lkdc().then(|| format!("tcp/{hostname}")),
                client: principal,
                password,
                certificate,
                canonicalize: true,
            };
            let creds = context.acquire_initial_creds(&request)?;

            let cache = match context.cache_match(creds.client()) {
                Some(cache) => cache,
                None => context.cache_new_unique()?,
            };
            cache.initialize(creds.client())?;
            cache.store(&creds)?;
            cache.set_config(cache_config::FRIENDLY_NAME, Some(&client))?;
            cache.set_config(cache_config::NAH_CREATED, Some("1"))?;
            Ok((creds.client().clone(), cache))
        })
    };
    let (canonical, cache) = exchange
        .await
        .map_err(|err| Error::Io(format!("acquisition task aborted: {err}")))??;

    let label = cache.config(cache_config::FRIENDLY_NAME);
    let mut state = selection.state.lock();
    if canonical.as_str() != state.client {
        // Referral or canonicalisation: adopt the returned principal and
        // rebuild the server to match its realm.
        tracing::debug!(
            from = %state.client,
            to = %canonical,
            "KDC canonicalised the client principal"
        );
        state.client = canonical.as_str().to_owned();
        state.client_type = ClientNameType::Krb5Principal;
        let realm = canonical.realm();
        state.server = Some(if realm_is_lkdc(realm) {
            format!("{service}/{realm}@{realm}")
        } else {
            format!("{service}/{hostname}@{realm}")
        });
    }
    state.cache = Some(cache);
    state.have_cred = true;
    if state.label.is_none() {
        state.label = label;
    }
    Ok(())
}

/// NTLM acquisition: split the client into user and realm at the first `@`
/// and hand the identity to the provider.
async fn acquire_ntlm(
    selection: &Selection,
    session: &Arc<SessionInner>,
    options: &AcquireOptions,
) -> Result<()> {
    if selection.have_credential() {
        return Ok(());
    }
    let Some(password) = effective_password(session, options) else {
        return Err(Error::MissingCredentials);
    };

    let client = selection.client();
    let (user, realm) = match client.find('@') {
        Some(at) => (&client[..at], &client[at + 1..]),
        None => (client.as_str(), ""),
    };
    let cred = session
        .providers
        .ntlm
        .acquire_cred(user, realm, &password, Mechanism::Ntlm)
        .await?;
    cred.set_label(cache_config::FRIENDLY_NAME, Some(&client))?;
    cred.set_label(cache_config::NAH_CREATED, Some("1"))?;
    selection.bind_credential(cred);
    Ok(())
}

/// IAKERB acquisition: run the provider's initial-credential exchange and
/// adopt the credential's UUID as the client name.
async fn acquire_iakerb(
    selection: &Selection,
    session: &Arc<SessionInner>,
    options: &AcquireOptions,
) -> Result<()> {
    if selection.have_credential() {
        return Err(Error::MissingCredentials);
    }
    let Some(password) = effective_password(session, options) else {
        return Err(Error::MissingCredentials);
    };

    let client = selection.client();
    let cred = session
        .providers
        .ntlm
        .initial_cred(&client, Mechanism::KerberosIakerb, &password)
        .await?;
    let uuid = cred.uuid().ok_or_else(|| {
        Error::provider(Mechanism::KerberosIakerb, -1, "credential has no UUID")
    })?;

    let mut state = selection.state.lock();
    state.client = uuid;
    state.client_type = ClientNameType::Uuid;
    state.cred = Some(cred);
    state.have_cred = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_options_debug_redacts_password() {
        let options = AcquireOptions::new().with_password("hunter2");
        let debug = format!("{options:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
