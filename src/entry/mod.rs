mod builder;
mod planner;
mod resolver;

pub use builder::*;
pub use planner::*;
pub use resolver::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute carrying the password of an Active Directory account.
pub const PASSWORD_ATTRIBUTE: &str = "unicodePwd";

/// Directory entry as plain record, attribute name to value.
pub type Entry = BTreeMap<String, AttrValue>;

/// Value of one attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Single(String),
    Multi(Vec<String>),
}

impl AttrValue {
    /// First value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            AttrValue::Single(value) => Some(value),
            AttrValue::Multi(values) => values.first().map(String::as_str),
        }
    }

    /// Every value as owned strings.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            AttrValue::Single(value) => vec![value.clone()],
            AttrValue::Multi(values) => values.clone(),
        }
    }

    /// Collapse directory values: one value stays scalar.
    pub fn from_values(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            AttrValue::Single(values.remove(0))
        } else {
            AttrValue::Multi(values)
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Single(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Single(value)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(values: Vec<String>) -> Self {
        AttrValue::Multi(values)
    }
}

/// Kind of change applied to one attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Replace,
    Add,
    Delete,
}

/// Requested change on an attribute.
///
/// A `delete` change takes its value from the current entry, so `value`
/// may be left empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub operation: Operation,
    pub attribute: String,
    #[serde(default)]
    pub value: Option<AttrValue>,
}

impl Change {
    /// Replace `attribute` with `value`.
    pub fn replace(
        attribute: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Self {
        Self {
            operation: Operation::Replace,
            attribute: attribute.into(),
            value: Some(value.into()),
        }
    }

    /// Add `value` to `attribute`.
    pub fn add(
        attribute: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Self {
        Self {
            operation: Operation::Add,
            attribute: attribute.into(),
            value: Some(value.into()),
        }
    }

    /// Remove the current values of `attribute`.
    pub fn delete(attribute: impl Into<String>) -> Self {
        Self {
            operation: Operation::Delete,
            attribute: attribute.into(),
            value: None,
        }
    }
}

/// Read the first value of `name` on `entry`, ignoring case.
pub fn first_value<'a>(entry: &'a Entry, name: &str) -> Option<&'a str> {
    get_ignore_case(entry, name).and_then(AttrValue::first)
}

/// Look up an attribute the way directories compare names.
pub fn get_ignore_case<'a>(
    entry: &'a Entry,
    name: &str,
) -> Option<&'a AttrValue> {
    entry.get(name).or_else(|| {
        entry
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// Encode a password the way Active Directory expects `unicodePwd`:
/// quoted, then UTF-16LE.
pub fn encode_password(password: &str) -> Vec<u8> {
    format!("\"{password}\"")
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Convert string values to wire bytes, encoding passwords on the way.
pub fn to_wire(attribute: &str, values: Vec<String>) -> Vec<Vec<u8>> {
    if attribute.eq_ignore_ascii_case(PASSWORD_ATTRIBUTE) {
        values.iter().map(|v| encode_password(v)).collect()
    } else {
        values.into_iter().map(String::into_bytes).collect()
    }
}

/// Escape a value placed in a relative distinguished name (RFC 4514).
pub fn escape_dn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(value.len());

    for (i, ch) in value.chars().enumerate() {
        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(ch);
            },
            '\0' => out.push_str(r"\00"),
            ' ' if i == 0 || i == last => out.push_str(r"\20"),
            '#' if i == 0 => out.push_str(r"\23"),
            _ => out.push(ch),
        }
    }
    out
}

/// Split a DN into its first RDN and the parent DN.
///
/// Escaped commas belong to the RDN.
pub fn split_dn(dn: &str) -> (&str, Option<&str>) {
    let mut escaped = false;
    for (i, b) in dn.bytes().enumerate() {
        match b {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b',' => return (dn[..i].trim(), Some(dn[i + 1..].trim())),
            _ => {},
        }
    }
    (dn.trim(), None)
}
