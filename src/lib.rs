//! Core keg library: formula descriptors, prefix layout, caveat templates and
//! installer configuration shared by the installer crate.
//!
//! # Modules
//!
//! - [`caveat`] - Post-install caveat templates
//! - [`config`] - Installer configuration loaded from TOML
//! - [`digest`] - SHA-256 digest newtype
//! - [`error`] - Formula and configuration errors
//! - [`formula`] - Package descriptor model and loader
//! - [`install_rule`] - Payload-to-destination install rules
//! - [`layout`] - Destination directories beneath an installation prefix

pub mod caveat;
pub mod config;
pub mod digest;
pub mod error;
pub mod formula;
pub mod install_rule;
pub mod layout;

pub use config::InstallerConfig;
pub use error::FormulaError;
pub use formula::Formula;
