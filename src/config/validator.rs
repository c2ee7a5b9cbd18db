//! Configuration validation for sync configurations.
//!
//! All problems are collected before reporting, so `kcsync validate` can show
//! every issue at once while the other commands fail on the first.

use crate::error::{ConfigError, KcSyncError, Result};
use crate::identity::RelationKind;
use std::collections::HashSet;
use tracing::debug;

use super::spec::{KeycloakConfig, MembershipEntry, StateConfig, SyncConfig};

/// Validator for sync configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
    /// Tracking identifier claimed by an earlier entry.
    pub duplicate: Option<String>,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a sync configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found. Duplicate entries are reported as
    /// [`ConfigError::DuplicateEntry`].
    pub fn validate(&self, config: &SyncConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        let Some(first_error) = result.errors.first() else {
            debug!("Configuration validation passed");
            return Ok(result);
        };

        if let Some(tracking_id) = &first_error.duplicate {
            return Err(KcSyncError::Config(ConfigError::DuplicateEntry {
                tracking_id: tracking_id.clone(),
            }));
        }
        Err(KcSyncError::Config(ConfigError::ValidationError {
            message: first_error.message.clone(),
            field: Some(first_error.field.clone()),
        }))
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, config: &SyncConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_keycloak(&config.keycloak, &mut result);
        Self::validate_state(&config.state, &mut result);

        if config.parallelism == 0 {
            result.push_error("parallelism", "Parallelism must be at least 1");
        }

        Self::validate_memberships(&config.memberships, &mut result);
        result
    }

    fn validate_keycloak(keycloak: &KeycloakConfig, result: &mut ValidationResult) {
        if keycloak.url.is_empty() {
            result.push_error("keycloak.url", "Keycloak URL cannot be empty");
        } else if !keycloak.url.starts_with("http://") && !keycloak.url.starts_with("https://") {
            result.push_error(
                "keycloak.url",
                format!("Keycloak URL '{}' must start with http:// or https://", keycloak.url),
            );
        }

        if !keycloak.base_path.is_empty() && !keycloak.base_path.starts_with('/') {
            result.push_error(
                "keycloak.base_path",
                format!("Base path '{}' must start with '/'", keycloak.base_path),
            );
        }

        if keycloak.auth_realm.is_empty() {
            result.push_error("keycloak.auth_realm", "Authentication realm cannot be empty");
        }

        if keycloak.client_id.is_empty() {
            result.push_error("keycloak.client_id", "Client ID cannot be empty");
        }

        if keycloak.timeout_secs == 0 {
            result.push_error("keycloak.timeout_secs", "Timeout must be greater than 0");
        }
    }

    fn validate_state(state: &StateConfig, result: &mut ValidationResult) {
        if state.path.is_empty() {
            result.push_error("state.path", "State path cannot be empty");
        }
    }

    fn validate_memberships(entries: &[MembershipEntry], result: &mut ValidationResult) {
        if entries.is_empty() {
            result.warnings.push(String::from("No memberships defined in configuration"));
            return;
        }

        let mut seen = HashSet::new();

        for (i, entry) in entries.iter().enumerate() {
            let field = format!("memberships[{i}]");

            let tracking_id = match entry.tracking_id() {
                Ok(id) => id.encode(),
                Err(e) => {
                    result.push_error(&field, e.to_string());
                    continue;
                }
            };

            if !seen.insert(tracking_id.clone()) {
                result.errors.push(ValidationError {
                    field,
                    message: format!("Duplicate membership entry: {tracking_id}"),
                    duplicate: Some(tracking_id),
                });
                continue;
            }

            if entry.kind == RelationKind::DefaultGroups && entry.parent != entry.realm {
                result.push_error(
                    format!("{field}.parent"),
                    format!(
                        "Default groups belong to the realm; parent must be '{}', found '{}'",
                        entry.realm, entry.parent
                    ),
                );
            }

            let Some(members) = &entry.members else {
                result.warnings.push(format!(
                    "{tracking_id}: no members listed, entry will not be reconciled"
                ));
                continue;
            };

            Self::validate_members(&field, &tracking_id, entry.kind, members, result);
        }
    }

    fn validate_members(
        field: &str,
        tracking_id: &str,
        kind: RelationKind,
        members: &[String],
        result: &mut ValidationResult,
    ) {
        let mut seen = HashSet::new();

        for (j, member) in members.iter().enumerate() {
            let member_field = format!("{field}.members[{j}]");

            if member.is_empty() {
                result.push_error(member_field, "Member cannot be empty");
                continue;
            }

            if kind.requires_lowercase_members() && member.chars().any(char::is_uppercase) {
                result.push_error(
                    member_field,
                    format!("{} '{member}' must be lowercase", kind.member_label()),
                );
            }

            if !seen.insert(member.as_str()) {
                result.warnings.push(format!(
                    "{tracking_id}: member '{member}' is listed more than once"
                ));
            }
        }
    }
}

impl ValidationResult {
    fn push_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
            duplicate: None,
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
