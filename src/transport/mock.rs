//! In-memory directory recording every call.
//!
//! MUST NEVER be used in production.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Attribute, Connector, Modification, Session};
use crate::entry::Entry;
use crate::error::{Error, Result};

/// Call received by the mock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Bind { dn: String },
    Search {
        base: String,
        filter: String,
        attributes: Vec<String>,
    },
    Add { dn: String, attributes: Vec<Attribute> },
    Modify {
        dn: String,
        modifications: Vec<Modification>,
    },
    ModifyDn { dn: String, new_dn: String },
    Delete { dn: String },
    Unbind,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    entries: Vec<Entry>,
    passwords: HashMap<String, String>,
    bind_failure: Option<u32>,
    failing: HashSet<String>,
    failing_renames: HashSet<String>,
}

/// Shared fake directory, cloned into every session.
#[derive(Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<State>>,
}

impl MockDirectory {
    /// Entries returned by every search, in order.
    pub fn with_entries(self, entries: Vec<Entry>) -> Self {
        self.state.lock().unwrap().entries = entries;
        self
    }

    /// Accept `password` for `dn`; unknown DNs accept any password.
    pub fn with_password(self, dn: &str, password: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .passwords
            .insert(dn.into(), password.into());
        self
    }

    /// Fail every bind with result code `code`.
    pub fn with_bind_failure(self, code: u32) -> Self {
        self.state.lock().unwrap().bind_failure = Some(code);
        self
    }

    /// Fail every mutation targeting `dn`.
    pub fn failing_on(self, dn: &str) -> Self {
        self.state.lock().unwrap().failing.insert(dn.into());
        self
    }

    /// Fail only renames of `dn`, other mutations succeed.
    pub fn failing_rename_on(self, dn: &str) -> Self {
        self.state.lock().unwrap().failing_renames.insert(dn.into());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls changing the directory.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::Add { .. }
                        | Call::Modify { .. }
                        | Call::ModifyDn { .. }
                        | Call::Delete { .. }
                )
            })
            .collect()
    }

    fn record(&self, call: Call) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let failed = match &call {
            Call::ModifyDn { dn, .. } => {
                state.failing.contains(dn) || state.failing_renames.contains(dn)
            },
            Call::Add { dn, .. } | Call::Modify { dn, .. } | Call::Delete { dn } => {
                state.failing.contains(dn)
            },
            _ => false,
        };
        state.calls.push(call);

        if failed {
            return Err(Error::Operation {
                code: 50,
                text: "insufficient access rights".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for MockDirectory {
    async fn bind(&self, dn: &str, password: &str) -> Result<Box<dyn Session>> {
        // only successful binds are recorded, each must meet an unbind.
        let failure = {
            let mut state = self.state.lock().unwrap();
            let failure =
                state.bind_failure.or_else(|| match state.passwords.get(dn) {
                    Some(expected) if expected != password => Some(49),
                    _ => None,
                });
            if failure.is_none() {
                state.calls.push(Call::Bind { dn: dn.into() });
            }
            failure
        };

        match failure {
            Some(49) => Err(Error::InvalidCredentials),
            Some(code) => Err(Error::Auth {
                code,
                reason: "server unavailable".into(),
            }),
            None => Ok(Box::new(self.clone())),
        }
    }
}

#[async_trait]
impl Session for MockDirectory {
    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<Entry>> {
        self.record(Call::Search {
            base: base.into(),
            filter: filter.into(),
            attributes: attributes.to_vec(),
        })?;
        Ok(self.state.lock().unwrap().entries.clone())
    }

    async fn add(&mut self, dn: &str, attributes: Vec<Attribute>) -> Result<()> {
        self.record(Call::Add {
            dn: dn.into(),
            attributes,
        })
    }

    async fn modify(
        &mut self,
        dn: &str,
        modifications: Vec<Modification>,
    ) -> Result<()> {
        self.record(Call::Modify {
            dn: dn.into(),
            modifications,
        })
    }

    async fn modify_dn(&mut self, dn: &str, new_dn: &str) -> Result<()> {
        self.record(Call::ModifyDn {
            dn: dn.into(),
            new_dn: new_dn.into(),
        })
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        self.record(Call::Delete { dn: dn.into() })
    }

    async fn unbind(&mut self) -> Result<()> {
        self.record(Call::Unbind)
    }
}
