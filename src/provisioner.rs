//! Authenticated session provisioning.

use std::sync::Arc;

use crate::config::Configuration;
use crate::error::Result;
use crate::transport::{Connector, Session};

/// Identity used to bind a session.
#[derive(Clone, Copy, Debug)]
pub enum Identity<'a> {
    /// Configured service account.
    Service,
    /// Explicit principal.
    Principal { dn: &'a str, password: &'a str },
}

/// Opens one session per operation.
#[derive(Clone)]
pub struct Provisioner {
    config: Arc<Configuration>,
    connector: Arc<dyn Connector>,
}

impl Provisioner {
    /// Create a new [`Provisioner`].
    pub fn new(config: Arc<Configuration>, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    /// Bind a fresh session as `identity`.
    ///
    /// A failed bind never returns a session, so nothing is left to release.
    pub async fn connect(&self, identity: Identity<'_>) -> Result<Box<dyn Session>> {
        let (dn, password) = match identity {
            Identity::Service => {
                (self.config.ldap.user.as_str(), self.config.ldap.password.as_str())
            },
            Identity::Principal { dn, password } => (dn, password),
        };

        tracing::debug!(%dn, "binding directory session");
        self.connector.bind(dn, password).await.inspect_err(|err| {
            tracing::debug!(%dn, error = %err, "bind failed");
        })
    }

    /// Close `session`, logging instead of failing.
    pub async fn release(&self, mut session: Box<dyn Session>) {
        if let Err(err) = session.unbind().await {
            tracing::warn!(error = %err, "failed to unbind directory session");
        }
    }
}
