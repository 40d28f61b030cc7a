//! # netauth
//!
//! Client-side network authentication negotiation.
//!
//! Given a target service (hostname + service class), optional credentials
//! (password, client certificates), and optional server-advertised
//! authentication hints, a [`Session`] enumerates a ranked list of
//! candidate [`Selection`]s — concrete (mechanism, client principal, server
//! principal, wrapper policy) quadruples — and acquires the underlying
//! credentials for whichever candidate the caller picks.
//!
//! ## How candidates are found
//!
//! - **User overrides**: selections the user pinned for a host in the
//!   preferences store always come first.
//! - **Kerberos**: existing credential caches, the wellknown LKDC
//!   pseudo-realm, host-realm/default-realm candidates for ordinary hosts,
//!   and certificate-fingerprint LKDC candidates for local hosts.
//! - **NTLM**: `user@realm` / `domain\user` splits of the supplied
//!   username plus credentials the GSS layer already holds.
//!
//! Selections whose server principal needs a network lookup resolve in
//! background tasks; [`Selection::wait`] parks the caller until a selection
//! settles or the session is cancelled.
//!
//! ## Example
//!
//! ```rust,ignore
//! use netauth::{AcquireOptions, ClientInfo, Providers, Session};
//!
//! # async fn run(providers: Providers) -> Result<(), netauth::Error> {
//! let info = ClientInfo::new()
//!     .with_username("DOMAIN\\alice")
//!     .with_password("secret");
//! let session = Session::create(providers, "fs.corp.example.com", "cifs", Some(info)).await?;
//!
//! for selection in session.selections() {
//!     if selection.wait().await {
//!         selection.acquire_credential(AcquireOptions::new()).await?;
//!         let auth = selection.auth_info();
//!         // hand `auth` to the session layer...
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! External collaborators — the Kerberos provider, the NTLM/IAKERB
//! provider, the certificate store, and the preferences store — enter
//! through the traits in [`kerberos`], [`gss`], [`certs`], and [`prefs`];
//! the crate performs no protocol I/O of its own.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod acquire;
pub mod certs;
pub mod error;
pub mod gss;
pub mod hints;
pub mod info;
pub mod kerberos;
pub mod labeling;
pub mod mechanism;
pub mod prefs;
pub mod selection;
pub mod session;

mod kerberos_guess;
mod latch;
mod ntlm_guess;
mod user_selections;

// Re-export commonly used types
pub use acquire::AcquireOptions;
pub use certs::{
    CertificateStore, ClientCertificate, SubjectAttr, friendly_display_name, sha1_fingerprint_hex,
};
pub use error::{Error, Result};
pub use gss::{GssCredential, NtlmProvider};
pub use hints::{MechOid, ServerHints};
pub use info::{AuthInfo, InfoKey, InfoValue};
pub use kerberos::{
    CredCache, InitialCreds, InitialCredsRequest, KerberosContext, KerberosProvider, KrbPrincipal,
};
pub use labeling::{cred_change, find_by_label_and_release};
pub use mechanism::{
    ClientNameType, GssdClientType, GssdServerType, Mechanism, ServerNameType,
    WELLKNOWN_LKDC_REALM, cache_config, realm_is_lkdc, service_class,
};
pub use prefs::{PreferencesStore, UserSelection};
pub use selection::Selection;
pub use session::{CertificateInput, ClientInfo, Providers, Session};
