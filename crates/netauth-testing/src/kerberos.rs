//! In-memory Kerberos provider.
//!
//! Simulates the provider surface the selection engine drives: a cache
//! collection, realm lookups, LKDC realm discovery, and the
//! initial-credential exchange with configurable canonicalisation
//! (referral) rewrites. A [`Gate`] can hold realm discovery open so tests
//! can cancel a session mid-resolve.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use netauth::error::{Error, Result};
use netauth::kerberos::{
    CredCache, InitialCreds, InitialCredsRequest, KerberosContext, KerberosProvider, KrbPrincipal,
};
use netauth::mechanism::Mechanism;
use parking_lot::{Condvar, Mutex};

/// A manually opened gate blocking-callers can wait on.
pub struct Gate {
    open: Mutex<bool>,
    cvar: Condvar,
}

impl Gate {
    /// A closed gate.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            open: Mutex::new(false),
            cvar: Condvar::new(),
        })
    }

    /// Open the gate, releasing every waiter.
    pub fn open(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.cvar.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cvar.wait(&mut open);
        }
    }
}

/// One observed initial-credential exchange.
#[derive(Debug, Clone)]
pub struct RecordedExchange {
    /// The requested client principal.
    pub client: String,
    /// Whether enterprise parsing was requested.
    pub enterprise: bool,
    /// The pinned KDC endpoint, if any.
    pub kdc_hostname: Option<String>,
    /// Whether a certificate drove the pre-authentication.
    pub used_certificate: bool,
}

/// An in-memory credential cache.
pub struct MockCredCache {
    name: String,
    principal: Mutex<Option<KrbPrincipal>>,
    configs: Mutex<HashMap<String, String>>,
    stored: AtomicUsize,
}

impl MockCredCache {
    /// Create a cache holding credentials for `principal`.
    #[must_use]
    pub fn new(name: impl Into<String>, principal: KrbPrincipal) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            principal: Mutex::new(Some(principal)),
            configs: Mutex::new(HashMap::new()),
            stored: AtomicUsize::new(0),
        })
    }

    fn empty(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            principal: Mutex::new(None),
            configs: Mutex::new(HashMap::new()),
            stored: AtomicUsize::new(0),
        })
    }

    /// Seed a config entry.
    pub fn put_config(&self, key: &str, value: &str) {
        self.configs.lock().insert(key.to_owned(), value.to_owned());
    }

    /// How many times credentials were stored into this cache.
    #[must_use]
    pub fn store_count(&self) -> usize {
        self.stored.load(Ordering::SeqCst)
    }
}

impl CredCache for MockCredCache {
    fn principal(&self) -> Result<KrbPrincipal> {
        self.principal
            .lock()
            .clone()
            .ok_or_else(|| Error::provider(Mechanism::Kerberos, -1, "cache has no principal"))
    }

    fn config(&self, key: &str) -> Option<String> {
        self.configs.lock().get(key).cloned()
    }

    fn set_config(&self, key: &str, value: Option<&str>) -> Result<()> {
        let mut configs = self.configs.lock();
        match value {
            Some(value) => configs.insert(key.to_owned(), value.to_owned()),
            None => configs.remove(key),
        };
        Ok(())
    }

    fn initialize(&self, client: &KrbPrincipal) -> Result<()> {
        *self.principal.lock() = Some(client.clone());
        Ok(())
    }

    fn store(&self, _creds: &InitialCreds) -> Result<()> {
        self.stored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

struct KerberosState {
    fail_context: bool,
    host_realms: HashMap<String, Vec<String>>,
    default_realms: Vec<String>,
    lkdc_realms: HashMap<String, String>,
    canonical: HashMap<String, String>,
    caches: Mutex<Vec<Arc<MockCredCache>>>,
    discovery_gate: Option<Arc<Gate>>,
    exchanges: Mutex<Vec<RecordedExchange>>,
}

/// Configurable in-memory Kerberos provider.
pub struct MockKerberos {
    state: Arc<KerberosState>,
}

impl MockKerberos {
    /// Start configuring a provider.
    #[must_use]
    pub fn builder() -> MockKerberosBuilder {
        MockKerberosBuilder::default()
    }

    /// A provider with no realms, no caches, and no LKDC neighbours.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Self::builder().build()
    }

    /// The caches currently in the collection.
    #[must_use]
    pub fn caches(&self) -> Vec<Arc<MockCredCache>> {
        self.state.caches.lock().clone()
    }

    /// Every initial-credential exchange the provider ran.
    #[must_use]
    pub fn exchanges(&self) -> Vec<RecordedExchange> {
        self.state.exchanges.lock().clone()
    }
}

/// Builder for [`MockKerberos`].
#[derive(Default)]
pub struct MockKerberosBuilder {
    fail_context: bool,
    host_realms: HashMap<String, Vec<String>>,
    default_realms: Vec<String>,
    lkdc_realms: HashMap<String, String>,
    canonical: HashMap<String, String>,
    caches: Vec<Arc<MockCredCache>>,
    discovery_gate: Option<Arc<Gate>>,
}

impl MockKerberosBuilder {
    /// Make `new_context` fail, aborting the Kerberos pipeline.
    #[must_use]
    pub fn with_broken_context(mut self) -> Self {
        self.fail_context = true;
        self
    }

    /// Map a hostname to a realm.
    #[must_use]
    pub fn with_host_realm(mut self, hostname: impl Into<String>, realm: impl Into<String>) -> Self {
        self.host_realms
            .entry(hostname.into())
            .or_default()
            .push(realm.into());
        self
    }

    /// Add a locally configured default realm.
    #[must_use]
    pub fn with_default_realm(mut self, realm: impl Into<String>) -> Self {
        self.default_realms.push(realm.into());
        self
    }

    /// Give a local host a discoverable LKDC realm.
    #[must_use]
    pub fn with_lkdc_realm(mut self, hostname: impl Into<String>, realm: impl Into<String>) -> Self {
        self.lkdc_realms.insert(hostname.into(), realm.into());
        self
    }

    /// Canonicalise `client` to `canonical` during the exchange (a KDC
    /// referral).
    #[must_use]
    pub fn with_canonical(mut self, client: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.canonical.insert(client.into(), canonical.into());
        self
    }

    /// Seed an existing credential cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<MockCredCache>) -> Self {
        self.caches.push(cache);
        self
    }

    /// Block LKDC realm discovery until the gate opens.
    #[must_use]
    pub fn with_discovery_gate(mut self, gate: Arc<Gate>) -> Self {
        self.discovery_gate = Some(gate);
        self
    }

    /// Finish the provider.
    #[must_use]
    pub fn build(self) -> Arc<MockKerberos> {
        Arc::new(MockKerberos {
            state: Arc::new(KerberosState {
                fail_context: self.fail_context,
                host_realms: self.host_realms,
                default_realms: self.default_realms,
                lkdc_realms: self.lkdc_realms,
                canonical: self.canonical,
                caches: Mutex::new(self.caches),
                discovery_gate: self.discovery_gate,
                exchanges: Mutex::new(Vec::new()),
            }),
        })
    }
}

impl KerberosProvider for MockKerberos {
    fn new_context(&self) -> Result<Arc<dyn KerberosContext>> {
        if self.state.fail_context {
            return Err(Error::provider(Mechanism::Kerberos, -1, "context unavailable"));
        }
        Ok(Arc::new(MockContext {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockContext {
    state: Arc<KerberosState>,
}

/// Parse `name` into a principal by splitting at the last `@`.
fn parse_principal(name: &str, enterprise: bool) -> Result<KrbPrincipal> {
    let at = name
        .rfind('@')
        .ok_or_else(|| Error::Parse(format!("principal has no realm: {name}")))?;
    if at == 0 || at == name.len() - 1 {
        return Err(Error::Parse(format!("malformed principal: {name}")));
    }
    Ok(KrbPrincipal::new(name, &name[at + 1..], enterprise))
}

impl KerberosContext for MockContext {
    fn parse_name(&self, name: &str, enterprise: bool) -> Result<KrbPrincipal> {
        parse_principal(name, enterprise)
    }

    fn caches(&self) -> Result<Vec<Arc<dyn CredCache>>> {
        Ok(self
            .state
            .caches
            .lock()
            .iter()
            .map(|cache| Arc::clone(cache) as Arc<dyn CredCache>)
            .collect())
    }

    fn cache_match(&self, client: &KrbPrincipal) -> Option<Arc<dyn CredCache>> {
        self.state
            .caches
            .lock()
            .iter()
            .find(|cache| {
                cache
                    .principal()
                    .map(|principal| principal.as_str() == client.as_str())
                    .unwrap_or(false)
            })
            .map(|cache| Arc::clone(cache) as Arc<dyn CredCache>)
    }

    fn cache_new_unique(&self) -> Result<Arc<dyn CredCache>> {
        let cache = MockCredCache::empty(format!("MEMORY:{}", uuid::Uuid::new_v4()));
        self.state.caches.lock().push(Arc::clone(&cache));
        Ok(cache)
    }

    fn host_realms(&self, hostname: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .host_realms
            .get(hostname)
            .cloned()
            .unwrap_or_default())
    }

    fn default_realms(&self) -> Result<Vec<String>> {
        Ok(self.state.default_realms.clone())
    }

    fn discover_lkdc_realm(&self, hostname: &str) -> Result<String> {
        if let Some(gate) = &self.state.discovery_gate {
            gate.wait();
        }
        self.state
            .lkdc_realms
            .get(hostname)
            .cloned()
            .ok_or_else(|| Error::Io(format!("no LKDC realm for {hostname}")))
    }

    fn acquire_initial_creds(&self, request: &InitialCredsRequest) -> Result<InitialCreds> {
        if request.password.is_none() && request.certificate.is_none() {
            return Err(Error::provider(
                Mechanism::Kerberos,
                -1,
                "no pre-authentication material",
            ));
        }
        self.state.exchanges.lock().push(RecordedExchange {
            client: request.client.as_str().to_owned(),
            enterprise: request.client.is_enterprise(),
            kdc_hostname: request.kdc_hostname.clone(),
            used_certificate: request.certificate.is_some(),
        });
        let returned = self
            .state
            .canonical
            .get(request.client.as_str())
            .cloned()
            .unwrap_or_else(|| request.client.as_str().to_owned());
        let client = parse_principal(&returned, false)?;
        Ok(InitialCreds::new(client, Bytes::from_static(b"ticket")))
    }
}
