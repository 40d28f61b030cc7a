//! Mechanism tags, name types, and well-known name constants.
//!
//! A candidate selection pairs a [`Mechanism`] with client and server names
//! whose interpretation is pinned by [`ClientNameType`] and
//! [`ServerNameType`]. The numeric GSSD projections of the name types are
//! what downstream authentication daemons consume.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The LKDC pseudo-realm used to select a local KDC without pinning to a
/// specific host realm.
pub const WELLKNOWN_LKDC_REALM: &str = "WELLKNOWN:COM.APPLE.LKDC";

/// Prefix carried by concrete per-host LKDC realms.
const LKDC_REALM_PREFIX: &str = "LKDC:";

/// Check whether a realm names a local KDC, either a concrete per-host
/// `LKDC:SHA1.*` realm or the wellknown pseudo-realm.
#[must_use]
pub fn realm_is_lkdc(realm: &str) -> bool {
    realm.starts_with(LKDC_REALM_PREFIX) || realm == WELLKNOWN_LKDC_REALM
}

/// Service class strings recognised by the guessers.
pub mod service_class {
    /// SMB file sharing.
    pub const CIFS: &str = "cifs";
    /// Generic host service.
    pub const HOST: &str = "host";
    /// Apple file sharing.
    pub const AFP: &str = "afpserver";
    /// Screen sharing.
    pub const VNC: &str = "vnc";
}

/// Credential-cache and credential config keys written by acquisition.
pub mod cache_config {
    /// Human-readable label for a cache or credential.
    pub const FRIENDLY_NAME: &str = "FriendlyName";
    /// Marker stamped on every credential this crate originates. Labelling
    /// operations refuse credentials without it.
    pub const NAH_CREATED: &str = "nah-created";
    /// Hostname an LKDC cache was created for.
    pub const LKDC_HOSTNAME: &str = "lkdc-hostname";
}

/// Authentication mechanism of a candidate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// Plain Kerberos 5.
    Kerberos,
    /// Kerberos user-to-user.
    KerberosU2u,
    /// Kerberos tunnelled through the authenticated party (IAKERB).
    KerberosIakerb,
    /// Peer-to-peer public-key Kerberos (PKU2U).
    KerberosPku2u,
    /// NTLM.
    Ntlm,
}

impl Mechanism {
    /// The raw mechanism name, never wrapped as SPNEGO.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kerberos => "Kerberos",
            Self::KerberosU2u => "KerberosU2U",
            Self::KerberosIakerb => "IAKERB",
            Self::KerberosPku2u => "PKU2U",
            Self::Ntlm => "NTLM",
        }
    }

    /// Check if this mechanism belongs to the Kerberos family.
    #[must_use]
    pub fn is_kerberos_family(&self) -> bool {
        !matches!(self, Self::Ntlm)
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kerberos" => Ok(Self::Kerberos),
            "kerberosu2u" => Ok(Self::KerberosU2u),
            "iakerb" => Ok(Self::KerberosIakerb),
            "pku2u" => Ok(Self::KerberosPku2u),
            "ntlm" => Ok(Self::Ntlm),
            _ => Err(Error::Parse(format!("unknown mechanism: {s}"))),
        }
    }
}

/// Interpretation of a selection's client name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientNameType {
    /// Bare user name, possibly realm-qualified by synthesis.
    #[default]
    Username,
    /// A parsed Kerberos principal.
    Krb5Principal,
    /// A Kerberos principal subject to referral rewriting.
    Krb5PrincipalReferral,
    /// Credential UUID standing in for the client (IAKERB).
    Uuid,
}

/// Interpretation of a selection's server name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerNameType {
    /// Host-based service name, `service@hostname`.
    #[default]
    ServiceBased,
    /// A concrete Kerberos service principal, `service/host@REALM`.
    Krb5Principal,
    /// A Kerberos service principal subject to referral rewriting.
    Krb5PrincipalReferral,
}

/// Numeric client-name codes consumed by the authentication daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GssdClientType {
    /// Bare user name (also covers UUID clients).
    User = 0,
    /// Kerberos principal.
    Krb5Principal = 1,
    /// Kerberos principal with referrals.
    Krb5Referral = 2,
    /// NTLM principal.
    NtlmPrincipal = 3,
}

/// Numeric server-name codes consumed by the authentication daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GssdServerType {
    /// Host-based service name.
    HostBased = 0,
    /// Kerberos service principal with referrals.
    Krb5Referral = 1,
    /// Kerberos service principal.
    Krb5Principal = 2,
}
