//! Manage Active Directory user entries over LDAP.
//!
//! Entries are created with their naming attributes derived
//! (`displayName`, `cn`, DN, `userPrincipalName`), updated with
//! rename-on-name-change, deleted or moved in bulk.
//!
//! ```no_run
//! use ad_entries::{Change, Directory, config::Configuration};
//!
//! # async fn run() -> ad_entries::Result<()> {
//! let config = Configuration::default().read()?;
//! let directory = Directory::connect(config);
//!
//! directory
//!     .update("(sAMAccountName=tuser)", &[Change::replace("sn", "Smith")])
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
mod directory;
pub mod entry;
pub mod error;
pub mod ldap;
pub mod mapper;
pub mod provisioner;
pub mod telemetry;
pub mod transport;

pub use directory::{Directory, ReadOptions, Relocation};
pub use entry::{AttrValue, Change, Entry, Operation, Outcome};
pub use error::{Error, Result};
pub use mapper::Direction;
