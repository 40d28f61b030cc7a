//! Test fixture utilities.

use std::sync::Arc;

use netauth::session::Providers;

use crate::certs::MockCertStore;
use crate::gss::MockNtlm;
use crate::kerberos::MockKerberos;
use crate::prefs::MockPreferences;

/// A full set of mock collaborators with concrete handles kept around so
/// tests can inspect provider state after the session ran.
pub struct TestEnv {
    /// Kerberos provider.
    pub kerberos: Arc<MockKerberos>,
    /// NTLM/IAKERB provider.
    pub ntlm: Arc<MockNtlm>,
    /// Certificate store.
    pub certificates: Arc<MockCertStore>,
    /// Preferences store.
    pub preferences: Arc<MockPreferences>,
}

impl TestEnv {
    /// All-default mocks: no realms, no caches, no held credentials, no
    /// overrides.
    #[must_use]
    pub fn new() -> Self {
        Self {
            kerberos: MockKerberos::empty(),
            ntlm: MockNtlm::empty(),
            certificates: MockCertStore::empty(),
            preferences: MockPreferences::empty(),
        }
    }

    /// Swap in a configured Kerberos provider.
    #[must_use]
    pub fn with_kerberos(mut self, kerberos: Arc<MockKerberos>) -> Self {
        self.kerberos = kerberos;
        self
    }

    /// Swap in a configured NTLM provider.
    #[must_use]
    pub fn with_ntlm(mut self, ntlm: Arc<MockNtlm>) -> Self {
        self.ntlm = ntlm;
        self
    }

    /// Swap in a configured certificate store.
    #[must_use]
    pub fn with_certificates(mut self, certificates: Arc<MockCertStore>) -> Self {
        self.certificates = certificates;
        self
    }

    /// Swap in a configured preferences store.
    #[must_use]
    pub fn with_preferences(mut self, preferences: Arc<MockPreferences>) -> Self {
        self.preferences = preferences;
        self
    }

    /// The provider bundle a session consumes.
    #[must_use]
    pub fn providers(&self) -> Providers {
        Providers {
            kerberos: self.kerberos.clone(),
            ntlm: self.ntlm.clone(),
            certificates: self.certificates.clone(),
            preferences: self.preferences.clone(),
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
