//! # netauth-testing
//!
//! Test infrastructure for netauth development.
//!
//! This crate provides in-memory implementations of every provider trait
//! the selection engine consumes, so sessions can be exercised end to end
//! without a KDC, a GSS layer, a keychain, or a preferences file.
//!
//! ## Example
//!
//! ```rust,ignore
//! use netauth::{ClientInfo, Session};
//! use netauth_testing::{MockKerberos, TestEnv};
//!
//! #[tokio::test]
//! async fn test_host_realm_candidates() {
//!     let env = TestEnv::new().with_kerberos(
//!         MockKerberos::builder()
//!             .with_host_realm("fs.example.com", "EXAMPLE.COM")
//!             .build(),
//!     );
//!     let info = ClientInfo::new().with_username("alice").with_password("p");
//!     let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
//!         .await
//!         .unwrap();
//!     assert!(!session.selections().is_empty());
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod certs;
pub mod fixtures;
pub mod gss;
pub mod kerberos;
pub mod prefs;

pub use certs::{MockCertStore, TestCertificate};
pub use fixtures::TestEnv;
pub use gss::{MockGssCredential, MockNtlm, MockNtlmBuilder};
pub use kerberos::{Gate, MockCredCache, MockKerberos, MockKerberosBuilder, RecordedExchange};
pub use prefs::MockPreferences;
