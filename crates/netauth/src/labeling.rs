//! Reference-counted credential labelling.
//!
//! Acquired credentials can be pinned by multiple consumers. Each consumer
//! addresses a credential through a reference key derived from the
//! selection, takes and drops references, and may stamp a label so a later
//! sweep can release everything it pinned in one call. Only credentials
//! this crate originated — marked `nah-created` at acquisition — are ever
//! touched.

use crate::gss::NtlmProvider;
use crate::mechanism::{Mechanism, cache_config};
use crate::selection::Selection;
use crate::session::Session;

/// Reference-key prefix for Kerberos-family credentials.
pub const KRB5_KEY_PREFIX: &str = "krb5:";

/// Reference-key prefix for NTLM credentials.
pub const NTLM_KEY_PREFIX: &str = "ntlm:";

impl Selection {
    /// The reference key addressing this selection's credential.
    #[must_use]
    pub fn reference_key(&self) -> String {
        let prefix = if self.mechanism().is_kerberos_family() {
            KRB5_KEY_PREFIX
        } else {
            NTLM_KEY_PREFIX
        };
        format!("{prefix}{}", self.client())
    }
}

/// Apply a reference-count change (and optional label) to the credential
/// addressed by `key`.
///
/// Returns false when the key is malformed, the credential cannot be
/// located, it lacks the `nah-created` marker, or the provider refuses the
/// change. A positive `delta` holds, a negative one unholds, zero only
/// stamps the label.
pub fn cred_change(
    provider: &dyn NtlmProvider,
    key: &str,
    delta: i32,
    label: Option<&str>,
) -> bool {
    let (mech, name) = if let Some(rest) = key.strip_prefix(KRB5_KEY_PREFIX) {
        (Mechanism::Kerberos, rest)
    } else if let Some(rest) = key.strip_prefix(NTLM_KEY_PREFIX) {
        (Mechanism::Ntlm, rest)
    } else {
        tracing::debug!(key, "malformed reference key");
        return false;
    };

    let Ok(cred) = provider.acquire_existing(name, mech) else {
        return false;
    };
    if cred.label(cache_config::NAH_CREATED).is_none() {
        // Not ours; never touch credentials another origin acquired.
        tracing::debug!(key, "credential was not created here, refusing");
        return false;
    }

    let changed = if delta > 0 {
        cred.hold()
    } else if delta < 0 {
        cred.unhold()
    } else {
        Ok(())
    };
    if changed.is_err() {
        return false;
    }
    if let Some(label) = label {
        if cred.set_label(label, Some("1")).is_err() {
            return false;
        }
    }
    true
}

/// Release every held credential carrying `label`, across all mechanisms.
///
/// Credentials without the `nah-created` marker are skipped.
pub async fn find_by_label_and_release(provider: &dyn NtlmProvider, label: &str) {
    for mech in [
        Mechanism::Kerberos,
        Mechanism::Ntlm,
        Mechanism::KerberosIakerb,
    ] {
        let creds = match provider.credentials(mech).await {
            Ok(creds) => creds,
            Err(err) => {
                tracing::debug!(%err, %mech, "credential enumeration failed");
                continue;
            }
        };
        for cred in creds {
            if cred.label(cache_config::NAH_CREATED).is_none() {
                continue;
            }
            if cred.label(label).is_some() {
                if let Err(err) = cred.set_label(label, None) {
                    tracing::warn!(%err, label, "failed to clear credential label");
                }
                if let Err(err) = cred.unhold() {
                    tracing::warn!(%err, label, "failed to release credential");
                }
            }
        }
    }
}

impl Session {
    /// Take a reference on a selection's credential and stamp `label` on it.
    #[must_use]
    pub fn add_reference_and_label(&self, selection: &Selection, label: &str) -> bool {
        cred_change(
            self.inner().providers.ntlm.as_ref(),
            &selection.reference_key(),
            1,
            Some(label),
        )
    }

    /// Take a reference on the credential addressed by `key`.
    #[must_use]
    pub fn cred_add_reference(&self, key: &str) -> bool {
        cred_change(self.inner().providers.ntlm.as_ref(), key, 1, None)
    }

    /// Drop a reference on the credential addressed by `key`.
    #[must_use]
    pub fn cred_remove_reference(&self, key: &str) -> bool {
        cred_change(self.inner().providers.ntlm.as_ref(), key, -1, None)
    }

    /// Release every credential this session's provider holds under `label`.
    pub async fn find_by_label_and_release(&self, label: &str) {
        find_by_label_and_release(self.inner().providers.ntlm.as_ref(), label).await;
    }
}
