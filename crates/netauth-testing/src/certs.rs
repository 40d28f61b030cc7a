//! In-memory certificate store and test certificates.

use std::collections::HashMap;
use std::sync::Arc;

use netauth::certs::{CertificateStore, ClientCertificate, SubjectAttr, sha1_fingerprint_hex};
use parking_lot::Mutex;

/// A client certificate backed by fixed DER bytes.
pub struct TestCertificate {
    der: Vec<u8>,
}

impl TestCertificate {
    /// Create a certificate from raw DER bytes.
    #[must_use]
    pub fn new(der: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self { der: der.into() })
    }

    /// The certificate's uppercase-hex SHA-1 fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        sha1_fingerprint_hex(&self.der)
    }
}

impl ClientCertificate for TestCertificate {
    fn der(&self) -> &[u8] {
        &self.der
    }
}

#[derive(Default)]
struct CertEntry {
    kerberos_principal: Option<String>,
    apple_id: Option<String>,
    inferred_label: Option<String>,
    subject: HashMap<SubjectAttr, String>,
}

/// Configurable in-memory certificate store, keyed by fingerprint.
#[derive(Default)]
pub struct MockCertStore {
    entries: Mutex<HashMap<String, CertEntry>>,
}

impl MockCertStore {
    /// An empty store: certificates map to nothing.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Map a certificate to a Kerberos principal name.
    pub fn put_kerberos_principal(&self, cert: &TestCertificate, name: &str) {
        self.entries
            .lock()
            .entry(cert.fingerprint())
            .or_default()
            .kerberos_principal = Some(name.to_owned());
    }

    /// Map a certificate to an AppleID account.
    pub fn put_apple_id(&self, cert: &TestCertificate, account: &str) {
        self.entries
            .lock()
            .entry(cert.fingerprint())
            .or_default()
            .apple_id = Some(account.to_owned());
    }

    /// Map a certificate to an inferred label.
    pub fn put_inferred_label(&self, cert: &TestCertificate, label: &str) {
        self.entries
            .lock()
            .entry(cert.fingerprint())
            .or_default()
            .inferred_label = Some(label.to_owned());
    }

    /// Set a subject attribute on a certificate.
    pub fn put_subject(&self, cert: &TestCertificate, attr: SubjectAttr, value: &str) {
        self.entries
            .lock()
            .entry(cert.fingerprint())
            .or_default()
            .subject
            .insert(attr, value.to_owned());
    }

    fn with_entry<T>(&self, cert: &dyn ClientCertificate, read: impl FnOnce(&CertEntry) -> T) -> Option<T> {
        let fingerprint = sha1_fingerprint_hex(cert.der());
        self.entries.lock().get(&fingerprint).map(read)
    }
}

impl CertificateStore for MockCertStore {
    fn kerberos_principal(&self, cert: &dyn ClientCertificate) -> Option<String> {
        self.with_entry(cert, |entry| entry.kerberos_principal.clone())
            .flatten()
    }

    fn apple_id(&self, cert: &dyn ClientCertificate) -> Option<String> {
        self.with_entry(cert, |entry| entry.apple_id.clone()).flatten()
    }

    fn inferred_label(&self, cert: &dyn ClientCertificate) -> Option<String> {
        self.with_entry(cert, |entry| entry.inferred_label.clone())
            .flatten()
    }

    fn subject_values(
        &self,
        cert: &dyn ClientCertificate,
        attrs: &[SubjectAttr],
    ) -> HashMap<SubjectAttr, String> {
        self.with_entry(cert, |entry| {
            attrs
                .iter()
                .filter_map(|attr| entry.subject.get(attr).map(|v| (*attr, v.clone())))
                .collect()
        })
        .unwrap_or_default()
    }
}
