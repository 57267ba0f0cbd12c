//! Search entries under the configured base.

use crate::config::Ldap as LdapSettings;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::ldap::escape_ldap;
use crate::transport::Session;

/// Reject empty caller filters.
pub fn require_fragment(fragment: &str) -> Result<()> {
    if fragment.trim().is_empty() {
        return Err(Error::validation("filter", "Filter must not be empty."));
    }
    Ok(())
}

/// Combine `fragment` with the mandatory default filter.
pub fn effective_filter(default: &str, fragment: &str) -> Result<String> {
    require_fragment(fragment)?;

    Ok(format!("(&{}{})", parenthesize(default), parenthesize(fragment)))
}

fn parenthesize(filter: &str) -> String {
    let filter = filter.trim();
    if filter.starts_with('(') && filter.ends_with(')') {
        filter.to_owned()
    } else {
        format!("({filter})")
    }
}

/// Equality filter with `value` escaped.
pub fn equality_filter(attribute: &str, value: &str) -> String {
    format!("({attribute}={})", escape_ldap(value))
}

/// Runs filtered searches on a session.
pub struct Resolver<'a> {
    settings: &'a LdapSettings,
}

impl<'a> Resolver<'a> {
    /// Create a new [`Resolver`].
    pub fn new(settings: &'a LdapSettings) -> Self {
        Self { settings }
    }

    /// Find entries matching `fragment`, in directory order.
    ///
    /// `attributes` replaces the configured projection when set. An empty
    /// result is not an error.
    pub async fn find(
        &self,
        session: &mut dyn Session,
        fragment: &str,
        attributes: Option<&[String]>,
    ) -> Result<Vec<Entry>> {
        let filter = effective_filter(&self.settings.filter, fragment)?;
        let attributes = attributes.unwrap_or(self.settings.attributes.as_slice());

        let entries = session
            .search(&self.settings.base_dn, &filter, attributes)
            .await?;

        tracing::debug!(%filter, count = entries.len(), "directory search");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AttrValue;
    use crate::transport::mock::{Call, MockDirectory};

    #[test]
    fn test_effective_filter() {
        assert_eq!(
            effective_filter("(objectClass=user)", "(sn=Doe)").unwrap(),
            "(&(objectClass=user)(sn=Doe))"
        );
        assert_eq!(
            effective_filter("objectClass=user", " sn=Doe ").unwrap(),
            "(&(objectClass=user)(sn=Doe))"
        );
    }

    #[test]
    fn test_empty_filter() {
        assert!(matches!(
            effective_filter("(objectClass=user)", "  "),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_equality_filter() {
        assert_eq!(
            equality_filter("sAMAccountName", "j*doe"),
            r"(sAMAccountName=j\2adoe)"
        );
    }

    #[tokio::test]
    async fn test_find_uses_default_filter_and_projection() {
        let settings = LdapSettings {
            base_dn: "DC=example,DC=com".into(),
            ..Default::default()
        };
        let entry = Entry::from([("cn".to_string(), AttrValue::from("A"))]);
        let mut mock = MockDirectory::default().with_entries(vec![entry.clone()]);

        let resolver = Resolver::new(&settings);
        let found = resolver.find(&mut mock, "(cn=A)", None).await.unwrap();
        assert_eq!(found, vec![entry]);

        let projection = vec!["mail".to_string()];
        resolver
            .find(&mut mock, "(cn=A)", Some(projection.as_slice()))
            .await
            .unwrap();

        let calls = mock.calls();
        assert_eq!(
            calls[0],
            Call::Search {
                base: "DC=example,DC=com".into(),
                filter: "(&(objectClass=user)(cn=A))".into(),
                attributes: settings.attributes.clone(),
            }
        );
        assert!(matches!(
            &calls[1],
            Call::Search { attributes, .. } if attributes == &projection
        ));
    }
}
