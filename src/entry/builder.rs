//! Computed attributes of new entries.

use validator::{ValidationError, ValidationErrors};

use crate::config::Ldap as LdapSettings;
use crate::entry::{
    AttrValue, Entry, escape_dn_value, first_value, get_ignore_case,
};
use crate::error::{Error, Result};

/// Caller field naming the path, under the base DN, to file the entry in.
pub const RELATIVE_DN_FIELD: &str = "dn";

/// Derives `displayName`, `cn`, `name`, `distinguishedName` and
/// `userPrincipalName` for a new entry.
#[derive(Debug, Clone)]
pub struct EntryBuilder<'a> {
    base_dn: &'a str,
    suffix: &'a str,
    object_classes: &'a [String],
}

impl<'a> EntryBuilder<'a> {
    /// Create a new [`EntryBuilder`].
    pub fn new(settings: &'a LdapSettings) -> Self {
        Self {
            base_dn: &settings.base_dn,
            suffix: &settings.suffix,
            object_classes: &settings.object_classes,
        }
    }

    /// Build a full entry from caller fields.
    ///
    /// `sn` and `givenName` are required. `userPrincipalName` is always
    /// derived, even without `sAMAccountName`: it is then the bare suffix.
    pub fn build(&self, mut partial: Entry) -> Result<Entry> {
        let (given_name, sn) = required_names(&partial)?;

        let display_name = first_value(&partial, "displayName")
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("{given_name} {sn}"));

        let relative = take_ignore_case(&mut partial, RELATIVE_DN_FIELD)
            .and_then(|dn| dn.first().map(|p| p.trim().trim_matches(',').to_owned()))
            .filter(|p| !p.is_empty());
        let dn = match relative {
            Some(path) => format!(
                "CN={},{path},{}",
                escape_dn_value(&display_name),
                self.base_dn
            ),
            None => {
                format!("CN={},{}", escape_dn_value(&display_name), self.base_dn)
            },
        };

        let account = first_value(&partial, "sAMAccountName").unwrap_or_default();
        if account.is_empty() {
            tracing::warn!(
                %dn,
                "missing `sAMAccountName`, `userPrincipalName` is only the suffix"
            );
        }
        let principal = format!("{account}{}", self.suffix);

        set(&mut partial, "displayName", display_name.clone().into());
        set(&mut partial, "cn", display_name.clone().into());
        set(&mut partial, "name", display_name.into());
        set(&mut partial, "distinguishedName", dn.into());
        set(&mut partial, "userPrincipalName", principal.into());

        if get_ignore_case(&partial, "objectClass").is_none()
            && !self.object_classes.is_empty()
        {
            partial.insert(
                "objectClass".into(),
                AttrValue::Multi(self.object_classes.to_vec()),
            );
        }

        Ok(partial)
    }
}

/// Remove `name` whatever its case.
fn take_ignore_case(entry: &mut Entry, name: &str) -> Option<AttrValue> {
    let key = entry
        .keys()
        .find(|key| key.eq_ignore_ascii_case(name))
        .cloned()?;
    entry.remove(&key)
}

/// Insert `name`, replacing any spelling of it the caller used.
fn set(entry: &mut Entry, name: &str, value: AttrValue) {
    entry.retain(|key, _| !key.eq_ignore_ascii_case(name));
    entry.insert(name.to_owned(), value);
}

fn required_names(entry: &Entry) -> Result<(String, String)> {
    let mut errors = ValidationErrors::new();

    let given_name = first_value(entry, "givenName").filter(|v| !v.is_empty());
    if given_name.is_none() {
        errors.add(
            "givenName",
            ValidationError::new("required")
                .with_message("Missing 'givenName' field.".into()),
        );
    }

    let sn = first_value(entry, "sn").filter(|v| !v.is_empty());
    if sn.is_none() {
        errors.add(
            "sn",
            ValidationError::new("required")
                .with_message("Missing 'sn' field.".into()),
        );
    }

    match (given_name, sn) {
        (Some(given_name), Some(sn)) => Ok((given_name.to_owned(), sn.to_owned())),
        _ => Err(Error::Validation(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LdapSettings {
        LdapSettings {
            base_dn: "OU=Users,DC=example,DC=com".into(),
            suffix: "@example.com".into(),
            ..Default::default()
        }
    }

    fn partial(pairs: &[(&str, &str)]) -> Entry {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AttrValue::from(*v)))
            .collect()
    }

    fn get<'e>(entry: &'e Entry, name: &str) -> &'e str {
        first_value(entry, name).unwrap()
    }

    #[test]
    fn test_derived_names() {
        let settings = settings();
        let entry = EntryBuilder::new(&settings)
            .build(partial(&[
                ("givenName", "Test"),
                ("sn", "User"),
                ("sAMAccountName", "tuser"),
            ]))
            .unwrap();

        assert_eq!(get(&entry, "displayName"), "Test User");
        assert_eq!(get(&entry, "cn"), "Test User");
        assert_eq!(get(&entry, "name"), "Test User");
        assert_eq!(
            get(&entry, "distinguishedName"),
            "CN=Test User,OU=Users,DC=example,DC=com"
        );
        assert_eq!(get(&entry, "userPrincipalName"), "tuser@example.com");
        assert_eq!(
            entry.get("objectClass"),
            Some(&AttrValue::Multi(settings.object_classes.clone()))
        );
    }

    #[test]
    fn test_explicit_display_name_and_relative_dn() {
        let settings = settings();
        let entry = EntryBuilder::new(&settings)
            .build(partial(&[
                ("givenName", "Test"),
                ("sn", "User"),
                ("displayName", "Tester"),
                ("dn", "OU=Sales"),
            ]))
            .unwrap();

        assert_eq!(get(&entry, "cn"), "Tester");
        assert_eq!(
            get(&entry, "distinguishedName"),
            "CN=Tester,OU=Sales,OU=Users,DC=example,DC=com"
        );
        assert!(!entry.contains_key("dn"));
    }

    #[test]
    fn test_suffix_only_principal() {
        let settings = settings();
        let entry = EntryBuilder::new(&settings)
            .build(partial(&[("givenName", "Test"), ("sn", "User")]))
            .unwrap();

        assert_eq!(get(&entry, "userPrincipalName"), "@example.com");
    }

    #[test]
    fn test_missing_names() {
        let settings = settings();
        let builder = EntryBuilder::new(&settings);

        match builder.build(partial(&[("givenName", "Test")])) {
            Err(Error::Validation(errors)) => {
                let fields = errors.field_errors();
                assert!(fields.contains_key("sn"));
                assert!(!fields.contains_key("givenName"));
            },
            _ => panic!("expected validation error"),
        }

        match builder.build(partial(&[("sn", ""), ("mail", "a@b")])) {
            Err(Error::Validation(errors)) => {
                assert_eq!(errors.field_errors().len(), 2);
            },
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_keep_object_class() {
        let settings = settings();
        let entry = EntryBuilder::new(&settings)
            .build(partial(&[
                ("givenName", "Test"),
                ("sn", "User"),
                ("objectClass", "inetOrgPerson"),
            ]))
            .unwrap();

        assert_eq!(get(&entry, "objectClass"), "inetOrgPerson");
    }

    #[test]
    fn test_attribute_names_ignore_case() {
        let settings = settings();
        let entry = EntryBuilder::new(&settings)
            .build(partial(&[
                ("givenname", "Test"),
                ("SN", "User"),
                ("samaccountname", "tuser"),
                ("displayname", "Tester"),
                ("objectclass", "inetOrgPerson"),
            ]))
            .unwrap();

        assert_eq!(get(&entry, "displayName"), "Tester");
        assert!(!entry.contains_key("displayname"));
        assert_eq!(get(&entry, "userPrincipalName"), "tuser@example.com");
        assert!(!entry.contains_key("objectClass"));
        assert_eq!(get(&entry, "objectclass"), "inetOrgPerson");
    }
}
