//! Server-advertised authentication hints.
//!
//! Servers that speak SPNEGO advertise the mechanisms they accept before the
//! client commits to one. The advertisement arrives as a small map from
//! mechanism OID to an opaque value blob, optionally accompanied by the
//! server's idea of its own hostname. The guessers consult these hints to
//! prune candidate mechanisms up front.

use std::collections::HashMap;

use bytes::Bytes;

/// Mechanism OIDs that may appear in a server hint map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MechOid {
    /// Kerberos 5, `1.2.840.113554.1.2.2`.
    Kerberos,
    /// The historical Microsoft Kerberos OID, `1.2.840.48018.1.2.2`.
    KerberosMicrosoft,
    /// NTLM, `1.3.6.1.4.1.311.2.2.10`.
    Ntlm,
    /// IAKERB, `1.3.6.1.5.2.5`.
    Iakerb,
    /// PKU2U, `1.3.6.1.5.2.7`.
    Pku2u,
    /// Apple LKDC support marker, `1.2.752.43.14.3`.
    AppleLkdc,
}

impl MechOid {
    /// Dotted-decimal form of the OID.
    #[must_use]
    pub fn dotted(&self) -> &'static str {
        match self {
            Self::Kerberos => "1.2.840.113554.1.2.2",
            Self::KerberosMicrosoft => "1.2.840.48018.1.2.2",
            Self::Ntlm => "1.3.6.1.4.1.311.2.2.10",
            Self::Iakerb => "1.3.6.1.5.2.5",
            Self::Pku2u => "1.3.6.1.5.2.7",
            Self::AppleLkdc => "1.2.752.43.14.3",
        }
    }
}

/// NTLM hint value signalling the raw (non-SPNEGO) protocol variant.
const RAW_TAG: &[u8] = b"raw";

/// Server-advertised mechanism hints plus the optional SPNEGO hostname hint.
///
/// An *absent* hint map (no advertisement at all) and an *empty* one carry
/// different meanings to the guessers; sessions therefore hold an
/// `Option<ServerHints>` and this type always represents a present
/// advertisement.
#[derive(Debug, Clone, Default)]
pub struct ServerHints {
    mechs: HashMap<MechOid, Bytes>,
    spnego_hostname: Option<String>,
}

impl ServerHints {
    /// Create an empty hint set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an advertised mechanism with no value payload.
    #[must_use]
    pub fn with_mech(mut self, oid: MechOid) -> Self {
        self.mechs.insert(oid, Bytes::new());
        self
    }

    /// Record an advertised mechanism with an opaque value payload.
    #[must_use]
    pub fn with_mech_value(mut self, oid: MechOid, value: impl Into<Bytes>) -> Self {
        self.mechs.insert(oid, value.into());
        self
    }

    /// Record the SPNEGO hostname hint.
    #[must_use]
    pub fn with_spnego_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.spnego_hostname = Some(hostname.into());
        self
    }

    /// Check whether the advertisement names the given mechanism.
    #[must_use]
    pub fn contains(&self, oid: MechOid) -> bool {
        self.mechs.contains_key(&oid)
    }

    /// Check whether any of the given mechanisms is advertised.
    #[must_use]
    pub fn contains_any(&self, oids: &[MechOid]) -> bool {
        oids.iter().any(|oid| self.contains(*oid))
    }

    /// The opaque value advertised for a mechanism, if any.
    #[must_use]
    pub fn value(&self, oid: MechOid) -> Option<&Bytes> {
        self.mechs.get(&oid)
    }

    /// Check whether a mechanism's value is exactly the 3-byte `raw` tag.
    #[must_use]
    pub fn value_is_raw(&self, oid: MechOid) -> bool {
        self.value(oid).is_some_and(|v| v.as_ref() == RAW_TAG)
    }

    /// The server's SPNEGO hostname hint, if advertised.
    #[must_use]
    pub fn spnego_hostname(&self) -> Option<&str> {
        self.spnego_hostname.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_and_value() {
        let hints = ServerHints::new()
            .with_mech(MechOid::Kerberos)
            .with_mech_value(MechOid::Ntlm, &b"raw"[..]);

        assert!(hints.contains(MechOid::Kerberos));
        assert!(hints.contains(MechOid::Ntlm));
        assert!(!hints.contains(MechOid::Pku2u));
        assert!(hints.contains_any(&[MechOid::Pku2u, MechOid::Kerberos]));
    }

    #[test]
    fn test_raw_tag_probe_is_exact() {
        let raw = ServerHints::new().with_mech_value(MechOid::Ntlm, &b"raw"[..]);
        assert!(raw.value_is_raw(MechOid::Ntlm));

        let padded = ServerHints::new().with_mech_value(MechOid::Ntlm, &b"raw\0"[..]);
        assert!(!padded.value_is_raw(MechOid::Ntlm));

        let absent = ServerHints::new().with_mech(MechOid::Ntlm);
        assert!(!absent.value_is_raw(MechOid::Ntlm));
    }

    #[test]
    fn test_spnego_hostname_hint() {
        let hints = ServerHints::new().with_spnego_hostname("host@LKDC:SHA1.ABC");
        assert_eq!(hints.spnego_hostname(), Some("host@LKDC:SHA1.ABC"));
        assert!(ServerHints::new().spnego_hostname().is_none());
    }
}
