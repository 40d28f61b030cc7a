//! NTLM/IAKERB provider interface.
//!
//! This is the GSS-layer collaborator: it acquires NTLM credentials from
//! username/realm/password identities, runs the IAKERB initial-credential
//! exchange, enumerates credentials the layer already holds, and carries the
//! label/hold bookkeeping that reference-counted credential labelling is
//! built on.
//!
//! The original enumeration API delivers one credential per callback and a
//! null sentinel to terminate; [`NtlmProvider::credentials`] re-expresses
//! that as a completed `Vec`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::mechanism::Mechanism;

/// An owning GSS credential handle.
pub trait GssCredential: Send + Sync {
    /// Human-readable display name of the credential's initiator.
    fn display_name(&self) -> String;

    /// The credential's UUID, when the layer assigns one.
    fn uuid(&self) -> Option<String>;

    /// Read a credential label.
    fn label(&self, key: &str) -> Option<String>;

    /// Write (`Some`) or clear (`None`) a credential label.
    fn set_label(&self, key: &str, value: Option<&str>) -> Result<()>;

    /// Take a reference on the credential, pinning it in the layer.
    fn hold(&self) -> Result<()>;

    /// Drop a reference taken with [`GssCredential::hold`].
    fn unhold(&self) -> Result<()>;
}

/// The NTLM/IAKERB mechanism provider.
#[async_trait]
pub trait NtlmProvider: Send + Sync {
    /// Acquire an initiator credential for `{user, realm, password}` under
    /// the given mechanism.
    async fn acquire_cred(
        &self,
        user: &str,
        realm: &str,
        password: &str,
        mech: Mechanism,
    ) -> Result<Arc<dyn GssCredential>>;

    /// Run the IAKERB-style initial-credential exchange for `user` with the
    /// password carried in the input map.
    async fn initial_cred(
        &self,
        user: &str,
        mech: Mechanism,
        password: &str,
    ) -> Result<Arc<dyn GssCredential>>;

    /// Enumerate credentials the layer already holds for a mechanism.
    async fn credentials(&self, mech: Mechanism) -> Result<Vec<Arc<dyn GssCredential>>>;

    /// Locate an existing credential by initiator name without supplying
    /// new key material. Used by the labelling operations.
    fn acquire_existing(&self, name: &str, mech: Mechanism) -> Result<Arc<dyn GssCredential>>;
}
