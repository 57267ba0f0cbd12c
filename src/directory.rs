//! Create, read, update, delete and move user entries.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Configuration;
use crate::entry::{
    Change, Entry, EntryBuilder, Outcome, PASSWORD_ATTRIBUTE, Planner,
    Resolver, entry_dn, equality_filter, escape_dn_value, first_value,
    require_fragment, split_dn, to_wire,
};
use crate::error::{EntryFailure, Error, Result};
use crate::ldap::LdapConnector;
use crate::mapper::{Direction, FieldMapper};
use crate::provisioner::{Identity, Provisioner};
use crate::telemetry::track;
use crate::transport::{Attribute, Connector, Session};

/// Stands for the DN of a search result that carries none.
const UNKNOWN_DN: &str = "<unknown>";

/// Options of [`Directory::read`].
#[derive(Clone, Debug, Default)]
pub struct ReadOptions {
    /// Replaces the configured projection.
    pub attributes: Option<Vec<String>>,
}

/// Entry moved by [`Directory::move_entries`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relocation {
    pub dn: String,
    pub new_dn: String,
}

/// Entry manager.
///
/// Every operation binds its own session and releases it before returning,
/// whatever the outcome.
#[derive(Clone)]
pub struct Directory {
    config: Arc<Configuration>,
    provisioner: Provisioner,
}

impl Directory {
    /// Create a new [`Directory`] over any transport.
    pub fn new(config: Arc<Configuration>, connector: Arc<dyn Connector>) -> Self {
        let provisioner = Provisioner::new(Arc::clone(&config), connector);
        Self { config, provisioner }
    }

    /// Create a new [`Directory`] speaking LDAP to the configured server.
    pub fn connect(config: Arc<Configuration>) -> Self {
        let connector = Arc::new(LdapConnector::new(&config.ldap));
        Self::new(config, connector)
    }

    /// Configuration the directory was built with.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    async fn session(&self) -> Result<Box<dyn Session>> {
        self.provisioner.connect(Identity::Service).await
    }

    /// Create a user entry. Returns the entry as stored, password excluded.
    #[tracing::instrument(skip_all)]
    pub async fn create(&self, entry: Entry) -> Result<Entry> {
        let start = Instant::now();
        let mut entry = EntryBuilder::new(&self.config.ldap).build(entry)?;

        let dn = first_value(&entry, "distinguishedName")
            .unwrap_or_default()
            .to_owned();
        let attributes = entry
            .iter()
            .map(|(name, value)| (name.clone(), to_wire(name, value.to_vec())))
            .collect::<Vec<Attribute>>();

        let result = match self.session().await {
            Ok(mut session) => {
                let result = session.add(&dn, attributes).await;
                self.provisioner.release(session).await;
                result
            },
            Err(err) => Err(err),
        };
        track("create", start, &result);
        result?;

        tracing::info!(%dn, "entry created");
        entry.retain(|name, _| !name.eq_ignore_ascii_case(PASSWORD_ATTRIBUTE));
        Ok(entry)
    }

    /// Entries matching `filter`, in directory order.
    #[tracing::instrument(skip(self, options))]
    pub async fn read(
        &self,
        filter: &str,
        options: ReadOptions,
    ) -> Result<Vec<Entry>> {
        require_fragment(filter)?;
        let start = Instant::now();

        let result = match self.session().await {
            Ok(mut session) => {
                let result = Resolver::new(&self.config.ldap)
                    .find(&mut *session, filter, options.attributes.as_deref())
                    .await;
                self.provisioner.release(session).await;
                result
            },
            Err(err) => Err(err),
        };

        track("read", start, &result);
        result
    }

    /// Apply `changes` to the entry matching `filter`.
    ///
    /// Changing `givenName` or `sn` also rewrites `displayName` and moves
    /// the entry to `CN={givenName} {sn},{base_dn}`.
    #[tracing::instrument(skip(self, changes))]
    pub async fn update(&self, filter: &str, changes: &[Change]) -> Result<Outcome> {
        require_fragment(filter)?;
        if changes.is_empty() {
            return Err(Error::validation("changes", "No change requested."));
        }
        let start = Instant::now();

        let result = match self.session().await {
            Ok(mut session) => {
                let result = Planner::new(&self.config.ldap)
                    .update(&mut *session, filter, changes)
                    .await;
                self.provisioner.release(session).await;
                result
            },
            Err(err) => Err(err),
        };

        track("update", start, &result);
        if let Ok(outcome) = &result {
            tracing::info!(?outcome, "entry updated");
        }
        result
    }

    /// Set the password of the entry matching `filter`.
    #[tracing::instrument(skip(self, password))]
    pub async fn set_password(&self, filter: &str, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(Error::validation("password", "Password must not be empty."));
        }

        self.update(filter, &[Change::replace(PASSWORD_ATTRIBUTE, password)])
            .await
            .map(|_| ())
    }

    /// Delete every entry matching `filter`.
    ///
    /// Each entry is attempted even when a previous one failed; the error
    /// then lists every failing DN. Returns the deleted DNs.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, filter: &str) -> Result<Vec<String>> {
        require_fragment(filter)?;
        let start = Instant::now();

        let result = match self.session().await {
            Ok(mut session) => {
                let result = self.delete_all(&mut *session, filter).await;
                self.provisioner.release(session).await;
                result
            },
            Err(err) => Err(err),
        };

        track("delete", start, &result);
        result
    }

    async fn delete_all(
        &self,
        session: &mut dyn Session,
        filter: &str,
    ) -> Result<Vec<String>> {
        let entries = self.resolve_all(session, filter, &["dn"]).await?;
        let total = entries.len();

        let mut deleted = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for entry in &entries {
            let dn = match entry_dn(entry) {
                Ok(dn) => dn,
                Err(error) => {
                    failures.push(unnamed_failure(error));
                    continue;
                },
            };

            match session.delete(&dn).await {
                Ok(()) => {
                    tracing::info!(%dn, "entry deleted");
                    deleted.push(dn);
                },
                Err(error) => {
                    tracing::warn!(%dn, %error, "failed to delete entry");
                    failures.push(EntryFailure { dn, error });
                },
            }
        }

        if failures.is_empty() {
            Ok(deleted)
        } else {
            Err(Error::Batch { total, failures })
        }
    }

    /// Move every entry matching `filter` under `new_base`, or keep it
    /// under its current parent. Entries already in place are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn move_entries(
        &self,
        filter: &str,
        new_base: Option<&str>,
    ) -> Result<Vec<Relocation>> {
        require_fragment(filter)?;
        let start = Instant::now();

        let result = match self.session().await {
            Ok(mut session) => {
                let result = self.move_all(&mut *session, filter, new_base).await;
                self.provisioner.release(session).await;
                result
            },
            Err(err) => Err(err),
        };

        track("move", start, &result);
        result
    }

    async fn move_all(
        &self,
        session: &mut dyn Session,
        filter: &str,
        new_base: Option<&str>,
    ) -> Result<Vec<Relocation>> {
        let entries = self.resolve_all(session, filter, &["dn", "cn"]).await?;
        let total = entries.len();

        let mut moved = Vec::new();
        let mut failures = Vec::new();
        for entry in &entries {
            let dn = match entry_dn(entry) {
                Ok(dn) => dn,
                Err(error) => {
                    failures.push(unnamed_failure(error));
                    continue;
                },
            };
            let new_dn = target_dn(entry, &dn, new_base);

            if new_dn.eq_ignore_ascii_case(&dn) {
                tracing::debug!(%dn, "entry already in place");
                continue;
            }

            match session.modify_dn(&dn, &new_dn).await {
                Ok(()) => {
                    tracing::info!(%dn, %new_dn, "entry moved");
                    moved.push(Relocation { dn, new_dn });
                },
                Err(error) => {
                    tracing::warn!(%dn, %new_dn, %error, "failed to move entry");
                    failures.push(EntryFailure { dn, error });
                },
            }
        }

        if failures.is_empty() {
            Ok(moved)
        } else {
            Err(Error::Batch { total, failures })
        }
    }

    /// Check `credential` by binding as `principal`.
    ///
    /// A rejected password is `Ok(false)`; any other bind failure is an
    /// error.
    #[tracing::instrument(skip(self, credential))]
    pub async fn authenticate(&self, principal: &str, credential: &str) -> Result<bool> {
        if principal.is_empty() || credential.is_empty() {
            return Err(Error::InvalidCredentials);
        }
        let start = Instant::now();

        let result = self.check_bind(principal, credential).await;

        track("authenticate", start, &result);
        result
    }

    /// Check `password` of the account named `account` (`sAMAccountName`).
    ///
    /// Unknown or ambiguous accounts are `Ok(false)`.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate_account(
        &self,
        account: &str,
        password: &str,
    ) -> Result<bool> {
        if account.is_empty() || password.is_empty() {
            return Err(Error::InvalidCredentials);
        }
        let start = Instant::now();

        let result = match self.account_dn(account).await {
            Ok(Some(dn)) => self.check_bind(&dn, password).await,
            Ok(None) => Ok(false),
            Err(err) => Err(err),
        };

        track("authenticate_account", start, &result);
        result
    }

    async fn check_bind(&self, dn: &str, password: &str) -> Result<bool> {
        match self
            .provisioner
            .connect(Identity::Principal { dn, password })
            .await
        {
            Ok(session) => {
                self.provisioner.release(session).await;
                Ok(true)
            },
            Err(err) if err.is_invalid_credentials() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// DN of `account`, `None` unless exactly one entry matches.
    async fn account_dn(&self, account: &str) -> Result<Option<String>> {
        let filter = equality_filter("sAMAccountName", account);
        let mut session = self.session().await?;
        let result = Resolver::new(&self.config.ldap)
            .find(&mut *session, &filter, Some(&["dn".to_string()][..]))
            .await;
        self.provisioner.release(session).await;

        match result?.as_slice() {
            [entry] => entry_dn(entry).map(Some),
            entries => {
                tracing::debug!(count = entries.len(), "account not uniquely resolved");
                Ok(None)
            },
        }
    }

    /// Rename `record` fields through the configured mapping.
    pub fn convert_model(&self, record: &Entry, direction: Direction) -> Result<Entry> {
        FieldMapper::new(self.config.mapping.as_ref()).convert(record, direction)
    }

    async fn resolve_all(
        &self,
        session: &mut dyn Session,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<Entry>> {
        let attributes = attributes.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        let entries = Resolver::new(&self.config.ldap)
            .find(session, filter, Some(attributes.as_slice()))
            .await?;

        if entries.is_empty() {
            return Err(Error::NotFound {
                filter: filter.to_owned(),
            });
        }
        Ok(entries)
    }
}

/// Failure of a search result carrying no DN.
fn unnamed_failure(error: Error) -> EntryFailure {
    tracing::warn!(%error, "search result skipped");
    EntryFailure {
        dn: UNKNOWN_DN.into(),
        error,
    }
}

/// `CN={cn},{parent}` where parent is `new_base` or the current parent.
fn target_dn(entry: &Entry, dn: &str, new_base: Option<&str>) -> String {
    let (rdn, parent) = split_dn(dn);
    let rdn = match first_value(entry, "cn") {
        Some(cn) => format!("CN={}", escape_dn_value(cn)),
        None => rdn.to_owned(),
    };

    match new_base.or(parent) {
        Some(base) => format!("{rdn},{base}"),
        None => rdn,
    }
}
