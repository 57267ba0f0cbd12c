//! LDAP support.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{
    Ldap as Ldap3, LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry,
};

use crate::config::Ldap as LdapSettings;
use crate::entry::{AttrValue, Entry, Operation, split_dn};
use crate::error::{Error, INVALID_CREDENTIALS, Result};
use crate::transport::{Attribute, Connector, Modification, Session};

/// Connector opening [`Ldap3`] sessions.
#[derive(Clone)]
pub struct LdapConnector {
    addr: String,
    settings: LdapConnSettings,
}

impl LdapConnector {
    /// Create a new [`LdapConnector`].
    pub fn new(config: &LdapSettings) -> Self {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(config.timeout))
            .set_starttls(config.starttls)
            .set_no_tls_verify(!config.tls_verify);

        Self {
            addr: config.address.clone(),
            settings,
        }
    }
}

#[async_trait]
impl Connector for LdapConnector {
    async fn bind(&self, dn: &str, password: &str) -> Result<Box<dyn Session>> {
        let (handle, mut conn) =
            LdapConnAsync::with_settings(self.settings.clone(), &self.addr)
                .await?;
        ldap3::drive!(handle);

        let result = match conn.simple_bind(dn, password).await {
            Ok(result) => result,
            Err(err) => {
                let _ = conn.unbind().await;
                return Err(err.into());
            },
        };

        if result.rc != 0 {
            // do not leave an half-open connection behind.
            let _ = conn.unbind().await;

            return Err(if result.rc == INVALID_CREDENTIALS {
                Error::InvalidCredentials
            } else {
                Error::Auth {
                    code: result.rc,
                    reason: result.text,
                }
            });
        }

        Ok(Box::new(LdapSession { conn }))
    }
}

/// Bound [`Ldap3`] connection.
pub struct LdapSession {
    conn: Ldap3,
}

#[async_trait]
impl Session for LdapSession {
    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<Entry>> {
        let (results, _) = self
            .conn
            .search(base, Scope::Subtree, filter, attributes.to_vec())
            .await?
            .success()?;

        Ok(results
            .into_iter()
            .map(SearchEntry::construct)
            .map(into_entry)
            .collect())
    }

    async fn add(&mut self, dn: &str, attributes: Vec<Attribute>) -> Result<()> {
        let attrs = attributes
            .into_iter()
            .map(|(name, values)| {
                (name.into_bytes(), values.into_iter().collect::<HashSet<_>>())
            })
            .collect::<Vec<_>>();

        check(self.conn.add(dn, attrs).await?)
    }

    async fn modify(
        &mut self,
        dn: &str,
        modifications: Vec<Modification>,
    ) -> Result<()> {
        let mods = modifications
            .into_iter()
            .map(|m| {
                let name = m.attribute.into_bytes();
                let values = m.values.into_iter().collect::<HashSet<_>>();
                match m.operation {
                    Operation::Replace => Mod::Replace(name, values),
                    Operation::Add => Mod::Add(name, values),
                    Operation::Delete => Mod::Delete(name, values),
                }
            })
            .collect::<Vec<_>>();

        check(self.conn.modify(dn, mods).await?)
    }

    async fn modify_dn(&mut self, dn: &str, new_dn: &str) -> Result<()> {
        let (rdn, superior) = split_dn(new_dn);
        check(self.conn.modifydn(dn, rdn, true, superior).await?)
    }

    async fn delete(&mut self, dn: &str) -> Result<()> {
        check(self.conn.delete(dn).await?)
    }

    async fn unbind(&mut self) -> Result<()> {
        Ok(self.conn.unbind().await?)
    }
}

fn check(result: ldap3::LdapResult) -> Result<()> {
    if result.rc == 0 {
        Ok(())
    } else {
        Err(result.into())
    }
}

/// Keep text attributes and expose the DN as `dn`.
///
/// Binary attributes and response controls are dropped.
fn into_entry(entry: SearchEntry) -> Entry {
    let mut out = entry
        .attrs
        .into_iter()
        .map(|(name, values)| (name, AttrValue::from_values(values)))
        .collect::<Entry>();
    out.insert("dn".into(), AttrValue::Single(entry.dn));
    out
}

/// Escape a value placed inside a search filter.
pub fn escape_ldap(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '*' => out.push_str(r"\2a"),
            '(' => out.push_str(r"\28"),
            ')' => out.push_str(r"\29"),
            '\\' => out.push_str(r"\5c"),
            '\0' => out.push_str(r"\00"),
            c => out.push(c),
        }
    }
    out
}
