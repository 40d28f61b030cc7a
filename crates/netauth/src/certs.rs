//! Certificate store interface and certificate-derived names.
//!
//! Client certificates enter the session as opaque handles; the store maps
//! them to Kerberos principals, AppleID accounts, and subject attributes.
//! The core computes SHA-1 fingerprints itself (classic-LKDC client
//! principals are fingerprint strings) and derives the human-readable label
//! shown next to certificate-backed selections.

use std::collections::HashMap;
use std::fmt::Write as _;

use sha1::{Digest, Sha1};

/// An opaque client certificate (or identity) handle.
pub trait ClientCertificate: Send + Sync {
    /// DER encoding of the certificate.
    fn der(&self) -> &[u8];
}

/// Subject attributes the store can extract from a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectAttr {
    /// Subject description.
    Description,
    /// Subject common name.
    CommonName,
    /// Subject organizational unit.
    OrganizationalUnit,
    /// Full X.509v1 subject name.
    SubjectName,
}

/// The certificate-store collaborator.
pub trait CertificateStore: Send + Sync {
    /// The Kerberos principal mapped to a certificate, if any.
    fn kerberos_principal(&self, cert: &dyn ClientCertificate) -> Option<String>;

    /// The AppleID account bound to a certificate, if any.
    fn apple_id(&self, cert: &dyn ClientCertificate) -> Option<String>;

    /// A label inferred from the certificate when nothing better exists.
    fn inferred_label(&self, cert: &dyn ClientCertificate) -> Option<String>;

    /// Extract the requested subject attributes.
    fn subject_values(
        &self,
        cert: &dyn ClientCertificate,
        attrs: &[SubjectAttr],
    ) -> HashMap<SubjectAttr, String>;
}

/// Subject descriptions that mark sharing certificates whose label is the
/// `commonName@organizationalUnit` pair.
const SHARING_CERT_DESCRIPTIONS: [&str; 2] =
    [".Mac Sharing Certificate", "MobileMe Sharing Certificate"];

/// Uppercase-hex SHA-1 fingerprint of a certificate's DER encoding.
///
/// Forty characters; used verbatim as the client principal stem of
/// classic-LKDC selections.
#[must_use]
pub fn sha1_fingerprint_hex(der: &[u8]) -> String {
    let digest = Sha1::digest(der);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// Derive the human-readable name for a certificate-backed selection.
///
/// Sharing certificates label as `commonName@organizationalUnit`; otherwise
/// the AppleID account; otherwise whatever the store infers.
#[must_use]
pub fn friendly_display_name(
    store: &dyn CertificateStore,
    cert: &dyn ClientCertificate,
) -> Option<String> {
    let values = store.subject_values(
        cert,
        &[
            SubjectAttr::Description,
            SubjectAttr::CommonName,
            SubjectAttr::OrganizationalUnit,
        ],
    );
    if let Some(description) = values.get(&SubjectAttr::Description) {
        if SHARING_CERT_DESCRIPTIONS.contains(&description.as_str()) {
            if let (Some(cn), Some(ou)) = (
                values.get(&SubjectAttr::CommonName),
                values.get(&SubjectAttr::OrganizationalUnit),
            ) {
                return Some(format!("{cn}@{ou}"));
            }
        }
    }
    store.apple_id(cert).or_else(|| store.inferred_label(cert))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_40_uppercase_hex_chars() {
        let fp = sha1_fingerprint_hex(b"certificate bytes");
        assert_eq!(fp.len(), 40);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, fp.to_uppercase());
    }

    #[test]
    fn test_fingerprint_known_vector() {
        // SHA-1("abc")
        assert_eq!(
            sha1_fingerprint_hex(b"abc"),
            "A9993E364706816ABA3E25717850C26C9CD0D89D"
        );
    }
}
