//! Configuration module for kcsync.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `kcsync.yaml`
//! - Validation of configuration values
//! - Fingerprinting desired sets for change detection

mod hash;
mod parser;
mod spec;
mod validator;

pub use hash::ConfigHasher;
pub use parser::{
    CLIENT_SECRET_VAR, ConfigParser, DEFAULT_CONFIG_FILES, PASSWORD_VAR, find_config_file,
};
pub use spec::{KeycloakConfig, MembershipEntry, StateConfig, SyncConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
