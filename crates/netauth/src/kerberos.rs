//! Kerberos provider interface.
//!
//! The core never speaks krb5 itself; it drives an implementation of
//! [`KerberosProvider`] supplied by the embedding application. The provider
//! hands out session-scoped [`KerberosContext`] handles through which the
//! guessers enumerate credential caches and resolve realms, and through
//! which acquisition runs the initial-credential exchange (password or
//! PKINIT pre-authentication, canonicalisation, referrals).
//!
//! Context and cache handles are owning: dropping them releases the
//! underlying provider resources.

use std::fmt;
use std::sync::Arc;

use crate::certs::ClientCertificate;
use crate::error::Result;
use crate::mechanism::realm_is_lkdc;

/// A parsed, provider-validated Kerberos principal.
///
/// The unparsed form is [`KrbPrincipal::as_str`]; the provider guarantees
/// `full` and `realm` are consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrbPrincipal {
    full: String,
    realm: String,
    enterprise: bool,
}

impl KrbPrincipal {
    /// Construct a principal from its unparsed form and realm.
    ///
    /// Intended for provider implementations; the core only consumes
    /// principals handed back by [`KerberosContext::parse_name`] or carried
    /// in [`InitialCreds`].
    #[must_use]
    pub fn new(full: impl Into<String>, realm: impl Into<String>, enterprise: bool) -> Self {
        Self {
            full: full.into(),
            realm: realm.into(),
            enterprise,
        }
    }

    /// The unparsed principal string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// The principal's realm.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Whether the principal was parsed as an enterprise name.
    #[must_use]
    pub fn is_enterprise(&self) -> bool {
        self.enterprise
    }

    /// Whether the principal's realm is an LKDC realm.
    #[must_use]
    pub fn is_lkdc(&self) -> bool {
        realm_is_lkdc(&self.realm)
    }
}

impl fmt::Display for KrbPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// Parameters for the initial-credential exchange.
pub struct InitialCredsRequest {
    /// Client principal to authenticate as.
    pub client: KrbPrincipal,
    /// Password for password pre-authentication.
    pub password: Option<String>,
    /// Certificate for PKINIT pre-authentication. Takes precedence over
    /// the password when both are set.
    pub certificate: Option<Arc<dyn ClientCertificate>>,
    /// Ask the KDC to canonicalise the client principal.
    pub canonicalize: bool,
    /// Pin the exchange to a specific KDC endpoint, e.g. `tcp/host`.
    pub kdc_hostname: Option<String>,
}

impl fmt::Debug for InitialCredsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose the password in debug output
        f.debug_struct("InitialCredsRequest")
            .field("client", &self.client)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("certificate", &self.certificate.is_some())
            .field("canonicalize", &self.canonicalize)
            .field("kdc_hostname", &self.kdc_hostname)
            .finish()
    }
}

/// Outcome of a successful initial-credential exchange.
///
/// `client` is the principal the KDC settled on; referrals and
/// canonicalisation may make it differ from the requested one, and callers
/// must adopt it. The ticket material is opaque to the core and only
/// round-trips into [`CredCache::store`].
#[derive(Debug, Clone)]
pub struct InitialCreds {
    client: KrbPrincipal,
    ticket: bytes::Bytes,
}

impl InitialCreds {
    /// Construct from the canonical client and opaque ticket material.
    #[must_use]
    pub fn new(client: KrbPrincipal, ticket: bytes::Bytes) -> Self {
        Self { client, ticket }
    }

    /// The canonical client principal the KDC returned.
    #[must_use]
    pub fn client(&self) -> &KrbPrincipal {
        &self.client
    }

    /// Opaque ticket material.
    #[must_use]
    pub fn ticket(&self) -> &bytes::Bytes {
        &self.ticket
    }
}

/// Factory for session-scoped Kerberos contexts.
pub trait KerberosProvider: Send + Sync {
    /// Open a new context. Called once per session, from the Kerberos
    /// guesser; failure aborts the Kerberos pipeline.
    fn new_context(&self) -> Result<Arc<dyn KerberosContext>>;
}

/// A session-scoped Kerberos context.
///
/// The core guarantees a context is never used concurrently by the guessers
/// and the acquisition task. `discover_lkdc_realm` and
/// `acquire_initial_creds` may block on the network; the core always calls
/// them from a blocking-capable task.
pub trait KerberosContext: Send + Sync {
    /// Parse a name into a principal. `enterprise` selects enterprise-name
    /// parsing (the core sets it when the client string contains two `@`).
    fn parse_name(&self, name: &str, enterprise: bool) -> Result<KrbPrincipal>;

    /// Snapshot of the credential-cache collection.
    fn caches(&self) -> Result<Vec<Arc<dyn CredCache>>>;

    /// Find an existing cache whose principal matches `client`.
    fn cache_match(&self, client: &KrbPrincipal) -> Option<Arc<dyn CredCache>>;

    /// Create a new uniquely-named cache.
    fn cache_new_unique(&self) -> Result<Arc<dyn CredCache>>;

    /// Realms mapped to a hostname by local configuration or DNS.
    fn host_realms(&self, hostname: &str) -> Result<Vec<String>>;

    /// The locally configured default realms.
    fn default_realms(&self) -> Result<Vec<String>>;

    /// Discover the LKDC realm of a host on the local network. Blocking.
    fn discover_lkdc_realm(&self, hostname: &str) -> Result<String>;

    /// Run the initial-credential exchange. Blocking.
    fn acquire_initial_creds(&self, request: &InitialCredsRequest) -> Result<InitialCreds>;
}

/// An owning credential-cache handle.
pub trait CredCache: Send + Sync {
    /// The cache's client principal.
    fn principal(&self) -> Result<KrbPrincipal>;

    /// Read a cache config entry.
    fn config(&self, key: &str) -> Option<String>;

    /// Write (`Some`) or remove (`None`) a cache config entry.
    fn set_config(&self, key: &str, value: Option<&str>) -> Result<()>;

    /// Reset the cache to hold credentials for `client`.
    fn initialize(&self, client: &KrbPrincipal) -> Result<()>;

    /// Store acquired credentials, including their init-creds config.
    fn store(&self, creds: &InitialCreds) -> Result<()>;

    /// The cache's resolvable name.
    fn name(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_accessors() {
        let p = KrbPrincipal::new("alice@EXAMPLE.COM", "EXAMPLE.COM", false);
        assert_eq!(p.as_str(), "alice@EXAMPLE.COM");
        assert_eq!(p.realm(), "EXAMPLE.COM");
        assert!(!p.is_enterprise());
        assert!(!p.is_lkdc());
    }

    #[test]
    fn test_lkdc_principal() {
        let p = KrbPrincipal::new(
            "user@LKDC:SHA1.0123456789ABCDEF0123456789ABCDEF01234567",
            "LKDC:SHA1.0123456789ABCDEF0123456789ABCDEF01234567",
            false,
        );
        assert!(p.is_lkdc());
    }

    #[test]
    fn test_request_debug_redacts_password() {
        let req = InitialCredsRequest {
            client: KrbPrincipal::new("a@R", "R", false),
            password: Some("hunter2".into()),
            certificate: None,
            canonicalize: true,
            kdc_hostname: None,
        };
        let debug = format!("{req:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
