//! Interface for directory protocol operations.

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::entry::{Entry, Operation};
use crate::error::Result;

/// Attribute with its raw values, as sent on `add`.
pub type Attribute = (String, Vec<Vec<u8>>);

/// One modification sent on `modify`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modification {
    pub operation: Operation,
    pub attribute: String,
    pub values: Vec<Vec<u8>>,
}

/// Opens authenticated sessions on a directory.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Bind as `dn`. Fails with [`crate::Error::InvalidCredentials`] when
    /// the directory rejects the password.
    async fn bind(&self, dn: &str, password: &str) -> Result<Box<dyn Session>>;
}

/// Authenticated session on a directory.
#[async_trait]
pub trait Session: Send {
    /// Subtree search under `base`.
    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<Entry>>;

    async fn add(&mut self, dn: &str, attributes: Vec<Attribute>) -> Result<()>;

    async fn modify(
        &mut self,
        dn: &str,
        modifications: Vec<Modification>,
    ) -> Result<()>;

    /// Move `dn` to `new_dn`, both fully qualified.
    async fn modify_dn(&mut self, dn: &str, new_dn: &str) -> Result<()>;

    async fn delete(&mut self, dn: &str) -> Result<()>;

    /// Close the session.
    async fn unbind(&mut self) -> Result<()>;
}
