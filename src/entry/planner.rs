//! Attribute changes and rename-on-update.
//!
//! An update goes through `resolve -> plan -> rename? -> apply`. Planning is
//! pure: it only reads the resolved entry and the requested changes, so the
//! whole change set is known before the directory is touched.

use crate::config::Ldap as LdapSettings;
use crate::entry::{
    AttrValue, Change, Entry, Operation, Resolver, escape_dn_value,
    get_ignore_case, to_wire,
};
use crate::error::{Error, Result};
use crate::transport::{Modification, Session};

/// Attributes whose change moves the entry to a new DN.
pub const NAME_ATTRIBUTES: [&str; 2] = ["givenName", "sn"];

/// LDAP result code `other`.
const OTHER: u32 = 80;

/// Change set computed for one entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    pub dn: String,
    pub modifications: Vec<Modification>,
    /// New DN when the name changed.
    pub rename: Option<String>,
}

/// Result of an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left to send once values were resolved.
    Unchanged,
    Modified { dn: String },
    Renamed { dn: String, new_dn: String },
}

/// Whether `changes` touch `givenName` or `sn`.
pub fn rename_implied(changes: &[Change]) -> bool {
    changes.iter().any(|c| is_name_attribute(&c.attribute))
}

fn is_name_attribute(attribute: &str) -> bool {
    NAME_ATTRIBUTES
        .iter()
        .any(|name| name.eq_ignore_ascii_case(attribute))
}

/// Attributes to fetch before planning `changes`.
pub fn projection(changes: &[Change]) -> Vec<String> {
    let mut attributes: Vec<String> = Vec::new();
    let names = changes.iter().map(|c| c.attribute.as_str());
    let extra: &[&str] = if rename_implied(changes) {
        &NAME_ATTRIBUTES[..]
    } else {
        &[]
    };

    for name in names.chain(extra.iter().copied()) {
        if !attributes.iter().any(|a| a.eq_ignore_ascii_case(name)) {
            attributes.push(name.to_owned());
        }
    }
    attributes
}

/// DN of a resolved entry.
pub fn entry_dn(entry: &Entry) -> Result<String> {
    get_ignore_case(entry, "dn")
        .or_else(|| get_ignore_case(entry, "distinguishedName"))
        .and_then(AttrValue::first)
        .map(str::to_owned)
        .ok_or_else(|| Error::Operation {
            code: OTHER,
            text: "search result carries no DN".into(),
        })
}

/// Compute the change set of `changes` against the current `entry`.
///
/// Returns `None` when every change resolved to no value.
pub fn plan(
    entry: &Entry,
    changes: &[Change],
    base_dn: &str,
) -> Result<Option<Plan>> {
    let dn = entry_dn(entry)?;

    let mut modifications = changes
        .iter()
        .filter_map(|change| {
            let value = match change.operation {
                Operation::Delete => get_ignore_case(entry, &change.attribute),
                Operation::Replace | Operation::Add => change.value.as_ref(),
            }?;

            Some(Modification {
                operation: change.operation,
                attribute: change.attribute.clone(),
                values: to_wire(&change.attribute, value.to_vec()),
            })
        })
        .collect::<Vec<_>>();

    if modifications.is_empty() {
        return Ok(None);
    }

    let mut rename = None;
    if rename_implied(changes) {
        let full_name = full_name(entry, changes)?;
        let new_dn = format!("CN={},{base_dn}", escape_dn_value(&full_name));

        modifications.push(Modification {
            operation: Operation::Replace,
            attribute: "displayName".into(),
            values: vec![full_name.into_bytes()],
        });

        if new_dn.eq_ignore_ascii_case(&dn) {
            tracing::debug!(%dn, "name unchanged, no rename needed");
        } else {
            rename = Some(new_dn);
        }
    }

    Ok(Some(Plan {
        dn,
        modifications,
        rename,
    }))
}

/// `"{givenName} {sn}"`, request values first, then the current entry.
fn full_name(entry: &Entry, changes: &[Change]) -> Result<String> {
    let resolve = |name: &'static str| -> Result<String> {
        changes
            .iter()
            .rev()
            .filter(|c| c.operation != Operation::Delete)
            .filter(|c| c.attribute.eq_ignore_ascii_case(name))
            .find_map(|c| c.value.as_ref().and_then(AttrValue::first))
            .or_else(|| get_ignore_case(entry, name).and_then(AttrValue::first))
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| {
                Error::validation(name, "Rename needs both 'givenName' and 'sn'.")
            })
    };

    Ok(format!("{} {}", resolve("givenName")?, resolve("sn")?))
}

/// Resolves then mutates the target of an update.
pub struct Planner<'a> {
    settings: &'a LdapSettings,
}

impl<'a> Planner<'a> {
    /// Create a new [`Planner`].
    pub fn new(settings: &'a LdapSettings) -> Self {
        Self { settings }
    }

    /// Apply `changes` to the first entry matching `fragment`.
    ///
    /// Attributes are modified first; the rename only runs once they are
    /// saved. A failed rename is returned as is, with attributes updated.
    pub async fn update(
        &self,
        session: &mut dyn Session,
        fragment: &str,
        changes: &[Change],
    ) -> Result<Outcome> {
        let attributes = projection(changes);
        let entries = Resolver::new(self.settings)
            .find(session, fragment, Some(attributes.as_slice()))
            .await?;

        if entries.len() > 1 {
            tracing::warn!(
                filter = %fragment,
                count = entries.len(),
                "filter matches several entries, updating the first one"
            );
        }
        let entry = entries.first().ok_or_else(|| Error::NotFound {
            filter: fragment.to_owned(),
        })?;

        let Some(plan) = plan(entry, changes, &self.settings.base_dn)? else {
            tracing::debug!(filter = %fragment, "empty change set");
            return Ok(Outcome::Unchanged);
        };

        self.apply(session, plan).await
    }

    /// Send a computed [`Plan`].
    pub async fn apply(
        &self,
        session: &mut dyn Session,
        plan: Plan,
    ) -> Result<Outcome> {
        let Plan {
            dn,
            modifications,
            rename,
        } = plan;

        session.modify(&dn, modifications).await?;

        match rename {
            Some(new_dn) => {
                session.modify_dn(&dn, &new_dn).await.inspect_err(|err| {
                    tracing::warn!(
                        %dn,
                        %new_dn,
                        error = %err,
                        "attributes updated but rename failed"
                    );
                })?;
                Ok(Outcome::Renamed { dn, new_dn })
            },
            None => Ok(Outcome::Modified { dn }),
        }
    }
}
