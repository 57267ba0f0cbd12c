//! Configuration manager for directory access.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const PASSWORD_ENV: &str = "LDAP_PASSWORD";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Related to LDAP3 configuration.
    pub ldap: Ldap,
    /// Directory attribute name to external field name.
    #[serde(default)]
    pub mapping: Option<BTreeMap<String, String>>,
    #[serde(skip)]
    path: PathBuf,
}

/// LDAP configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ldap {
    /// URL of the directory, `ldap://` is assumed without scheme.
    pub address: String,
    /// Service account DN used when no explicit identity is given.
    pub user: String,
    /// Service account password.
    #[serde(default, skip_serializing)]
    pub password: String,
    /// DN every search starts from.
    pub base_dn: String,
    /// Filter AND-ed with every caller filter.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Attributes returned by searches.
    #[serde(default = "default_attributes")]
    pub attributes: Vec<String>,
    /// Appended to `sAMAccountName` to form `userPrincipalName`.
    #[serde(default)]
    pub suffix: String,
    /// Set on new entries which do not bring their own.
    #[serde(default = "default_object_classes")]
    pub object_classes: Vec<String>,
    /// Connection timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub starttls: bool,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

impl Default for Ldap {
    fn default() -> Self {
        Self {
            address: String::default(),
            user: String::default(),
            password: String::default(),
            base_dn: String::default(),
            filter: default_filter(),
            attributes: default_attributes(),
            suffix: String::default(),
            object_classes: default_object_classes(),
            timeout: default_timeout(),
            starttls: false,
            tls_verify: true,
        }
    }
}

fn default_filter() -> String {
    "(objectClass=user)".into()
}

fn default_attributes() -> Vec<String> {
    [
        "dn",
        "cn",
        "sn",
        "givenName",
        "displayName",
        "sAMAccountName",
        "userPrincipalName",
        "mail",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_object_classes() -> Vec<String> {
    ["top", "person", "organizationalPerson", "user"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes the directory address by ensuring it carries a valid
    /// scheme (`ldap` or `ldaps`).
    fn normalize_address(&self, address: &str) -> Result<String> {
        let with_scheme = if address.starts_with("ldap://")
            || address.starts_with("ldaps://")
        {
            address.to_string()
        } else {
            format!("ldap://{address}")
        };

        let parsed = Url::parse(&with_scheme)
            .map_err(|err| Error::Configuration(err.to_string()))?;
        if parsed.host_str().is_none() {
            return Err(Error::Configuration(format!(
                "missing host in `{address}`"
            )));
        }

        Ok(with_scheme)
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let file = File::open(&file_path).map_err(|err| {
            tracing::error!(error = %err, path = %file_path.display(), "configuration file not found");
            Error::Configuration(format!(
                "cannot open `{}`: {err}",
                file_path.display()
            ))
        })?;

        let config: Configuration = serde_yaml::from_reader(file)
            .map_err(|err| Error::Configuration(err.to_string()))?;

        Ok(Arc::new(self.finalize(config)?))
    }

    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Arc<Self>> {
        let config: Configuration = serde_yaml::from_str(yaml)
            .map_err(|err| Error::Configuration(err.to_string()))?;

        Ok(Arc::new(Self::default().finalize(config)?))
    }

    fn finalize(&self, mut config: Configuration) -> Result<Self> {
        config.path = self.path.clone();
        config.ldap.address = self.normalize_address(&config.ldap.address)?;

        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            config.ldap.password = password;
        }

        if config.ldap.base_dn.is_empty() {
            return Err(Error::Configuration("`ldap.base_dn` is empty".into()));
        }

        if config.ldap.suffix.is_empty() {
            tracing::warn!(
                "`ldap.suffix` is empty, `userPrincipalName` will equal `sAMAccountName`"
            );
        }

        Ok(config)
    }
}
