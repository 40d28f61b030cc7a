//! In-memory NTLM/IAKERB provider.
//!
//! Holds credentials in a plain list, hands out configurable acquisition
//! results, and tracks labels and hold counts so reference-counting tests
//! can observe every change.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use netauth::error::{Error, Result};
use netauth::gss::{GssCredential, NtlmProvider};
use netauth::mechanism::{Mechanism, cache_config};
use parking_lot::Mutex;

/// An in-memory GSS credential.
pub struct MockGssCredential {
    name: String,
    mech: Mechanism,
    uuid: Option<String>,
    labels: Mutex<HashMap<String, String>>,
    holds: AtomicI32,
}

impl MockGssCredential {
    fn new(name: impl Into<String>, mech: Mechanism, uuid: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            mech,
            uuid,
            labels: Mutex::new(HashMap::new()),
            holds: AtomicI32::new(0),
        })
    }

    /// Current hold count.
    #[must_use]
    pub fn hold_count(&self) -> i32 {
        self.holds.load(Ordering::SeqCst)
    }

    /// Seed a label (tests use this to mark foreign credentials).
    pub fn put_label(&self, key: &str, value: &str) {
        self.labels.lock().insert(key.to_owned(), value.to_owned());
    }
}

impl GssCredential for MockGssCredential {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn uuid(&self) -> Option<String> {
        self.uuid.clone()
    }

    fn label(&self, key: &str) -> Option<String> {
        self.labels.lock().get(key).cloned()
    }

    fn set_label(&self, key: &str, value: Option<&str>) -> Result<()> {
        let mut labels = self.labels.lock();
        match value {
            Some(value) => labels.insert(key.to_owned(), value.to_owned()),
            None => labels.remove(key),
        };
        Ok(())
    }

    fn hold(&self) -> Result<()> {
        self.holds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unhold(&self) -> Result<()> {
        self.holds.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

struct NtlmState {
    held: Mutex<Vec<Arc<MockGssCredential>>>,
    fail_acquire: bool,
}

/// Configurable in-memory NTLM/IAKERB provider.
pub struct MockNtlm {
    state: Arc<NtlmState>,
}

impl MockNtlm {
    /// Start configuring a provider.
    #[must_use]
    pub fn builder() -> MockNtlmBuilder {
        MockNtlmBuilder::default()
    }

    /// A provider holding no credentials.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Self::builder().build()
    }

    /// Every credential the provider currently holds.
    #[must_use]
    pub fn held(&self) -> Vec<Arc<MockGssCredential>> {
        self.state.held.lock().clone()
    }

    /// Find a held credential by display name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Arc<MockGssCredential>> {
        self.state
            .held
            .lock()
            .iter()
            .find(|cred| cred.display_name() == name)
            .cloned()
    }
}

/// Builder for [`MockNtlm`].
#[derive(Default)]
pub struct MockNtlmBuilder {
    held: Vec<Arc<MockGssCredential>>,
    fail_acquire: bool,
}

impl MockNtlmBuilder {
    /// Seed a credential the layer already holds. `ours` stamps the
    /// `nah-created` marker.
    #[must_use]
    pub fn with_held_credential(
        mut self,
        name: impl Into<String>,
        mech: Mechanism,
        ours: bool,
    ) -> Self {
        let cred = MockGssCredential::new(name, mech, None);
        if ours {
            cred.put_label(cache_config::NAH_CREATED, "1");
        }
        self.held.push(cred);
        self
    }

    /// Make every new acquisition fail.
    #[must_use]
    pub fn with_acquire_failure(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    /// Finish the provider.
    #[must_use]
    pub fn build(self) -> Arc<MockNtlm> {
        Arc::new(MockNtlm {
            state: Arc::new(NtlmState {
                held: Mutex::new(self.held),
                fail_acquire: self.fail_acquire,
            }),
        })
    }
}

#[async_trait]
impl NtlmProvider for MockNtlm {
    async fn acquire_cred(
        &self,
        user: &str,
        realm: &str,
        _password: &str,
        mech: Mechanism,
    ) -> Result<Arc<dyn GssCredential>> {
        if self.state.fail_acquire {
            return Err(Error::provider(mech, -1, "acquisition refused"));
        }
        let name = if realm.is_empty() {
            user.to_owned()
        } else {
            format!("{user}@{realm}")
        };
        let cred = MockGssCredential::new(name, mech, None);
        self.state.held.lock().push(Arc::clone(&cred));
        Ok(cred)
    }

    async fn initial_cred(
        &self,
        user: &str,
        mech: Mechanism,
        _password: &str,
    ) -> Result<Arc<dyn GssCredential>> {
        if self.state.fail_acquire {
            return Err(Error::provider(mech, -1, "acquisition refused"));
        }
        let cred = MockGssCredential::new(user, mech, Some(uuid::Uuid::new_v4().to_string()));
        self.state.held.lock().push(Arc::clone(&cred));
        Ok(cred)
    }

    async fn credentials(&self, mech: Mechanism) -> Result<Vec<Arc<dyn GssCredential>>> {
        Ok(self
            .state
            .held
            .lock()
            .iter()
            .filter(|cred| cred.mech == mech)
            .map(|cred| Arc::clone(cred) as Arc<dyn GssCredential>)
            .collect())
    }

    fn acquire_existing(&self, name: &str, mech: Mechanism) -> Result<Arc<dyn GssCredential>> {
        self.state
            .held
            .lock()
            .iter()
            .find(|cred| cred.mech == mech && cred.display_name() == name)
            .map(|cred| Arc::clone(cred) as Arc<dyn GssCredential>)
            .ok_or_else(|| Error::provider(mech, -1, format!("no credential for {name}")))
    }
}
