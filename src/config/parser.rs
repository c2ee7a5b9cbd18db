//! Configuration parser for loading configuration files.
//!
//! This module handles loading configuration from YAML files, `.env` files
//! and environment variables, with environment values taking precedence.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, KcSyncError, Result};
use crate::keycloak::{ClientSettings, Credentials};

use super::spec::{KeycloakConfig, SyncConfig};

/// Environment variable holding the admin client secret.
pub const CLIENT_SECRET_VAR: &str = "KEYCLOAK_CLIENT_SECRET";

/// Environment variable holding the admin user's password.
pub const PASSWORD_VAR: &str = "KEYCLOAK_PASSWORD";

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["kcsync.yaml", "kcsync.yml"];

/// Configuration parser for loading sync configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<SyncConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(KcSyncError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            KcSyncError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<SyncConfig> {
        debug!("Parsing YAML configuration");

        let config: SyncConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            KcSyncError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed configuration with {} membership entr(y/ies)",
            config.memberships.len()
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Recognized variables: `KCSYNC_URL`, `KCSYNC_AUTH_REALM`,
    /// `KCSYNC_CLIENT_ID` and `KCSYNC_STATE_PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<SyncConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env_overrides(config: &mut SyncConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("KCSYNC_URL") {
            debug!("Overriding keycloak.url from environment");
            config.keycloak.url = url;
        }

        if let Some(realm) = lookup("KCSYNC_AUTH_REALM") {
            debug!("Overriding keycloak.auth_realm from environment");
            config.keycloak.auth_realm = realm;
        }

        if let Some(client_id) = lookup("KCSYNC_CLIENT_ID") {
            debug!("Overriding keycloak.client_id from environment");
            config.keycloak.client_id = client_id;
        }

        if let Some(path) = lookup("KCSYNC_STATE_PATH") {
            debug!("Overriding state.path from environment");
            config.state.path = path;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                KcSyncError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Builds Keycloak client settings, reading secrets from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required secret is not set.
    pub fn client_settings(config: &KeycloakConfig) -> Result<ClientSettings> {
        Self::client_settings_from(config, |name| std::env::var(name).ok())
    }

    /// Builds Keycloak client settings, reading secrets through `lookup`.
    ///
    /// The password grant is used when a username is configured; it requires
    /// `KEYCLOAK_PASSWORD` and takes an optional client secret. Otherwise the
    /// client-credentials grant requires `KEYCLOAK_CLIENT_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required secret is not set.
    pub fn client_settings_from(
        config: &KeycloakConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ClientSettings> {
        let client_secret = lookup(CLIENT_SECRET_VAR).filter(|s| !s.is_empty());

        let credentials = match &config.username {
            Some(username) => Credentials::Password {
                client_id: config.client_id.clone(),
                client_secret,
                username: username.clone(),
                password: lookup(PASSWORD_VAR).ok_or_else(|| missing(PASSWORD_VAR))?,
            },
            None => Credentials::ClientCredentials {
                client_id: config.client_id.clone(),
                client_secret: client_secret.ok_or_else(|| missing(CLIENT_SECRET_VAR))?,
            },
        };

        Ok(ClientSettings {
            url: config.url.clone(),
            base_path: config.base_path.clone(),
            auth_realm: config.auth_realm.clone(),
            credentials,
            timeout_secs: config.timeout_secs,
        })
    }
}

fn missing(name: &str) -> KcSyncError {
    KcSyncError::Config(ConfigError::MissingEnvVar {
        name: name.to_string(),
    })
}

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(KcSyncError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::RelationKind;
    use std::collections::HashMap;

    const MINIMAL: &str = r"
keycloak:
  url: https://sso.example.com
";

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = ConfigParser::new().parse_yaml(MINIMAL, None).unwrap();
        assert_eq!(config.keycloak.auth_realm, "master");
        assert_eq!(config.keycloak.client_id, "kcsync");
        assert_eq!(config.state.path, ".kcsync/state.json");
        assert_eq!(config.parallelism, 4);
        assert!(config.memberships.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
keycloak:
  url: https://sso.example.com
  base_path: /auth
  auth_realm: ops
  client_id: admin-cli
  username: admin
  timeout_secs: 10
state:
  path: /var/lib/kcsync/state.json
parallelism: 2
memberships:
  - realm: acme
    kind: group-memberships
    parent: 1c9b
    members: [alice, bob]
  - realm: acme
    kind: optional-scopes
    parent: c1
    members: [offline_access]
    exhaustive: false
";
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();
        assert_eq!(config.keycloak.base_path, "/auth");
        assert_eq!(config.keycloak.username.as_deref(), Some("admin"));
        assert_eq!(config.memberships.len(), 2);
        assert_eq!(config.memberships[1].kind, RelationKind::OptionalScopes);
        assert!(!config.memberships[1].exhaustive);
    }

    #[test]
    fn test_unknown_kind_is_parse_error() {
        let yaml = r"
keycloak:
  url: https://sso.example.com
memberships:
  - realm: acme
    kind: friendships
    parent: g1
";
        let err = ConfigParser::new().parse_yaml(yaml, None).unwrap_err();
        assert!(matches!(err, KcSyncError::Config(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ConfigParser::new().parse_yaml(MINIMAL, None).unwrap();
        ConfigParser::apply_env_overrides(
            &mut config,
            env(&[("KCSYNC_URL", "http://localhost:8080"), ("KCSYNC_STATE_PATH", "s.json")]),
        );
        assert_eq!(config.keycloak.url, "http://localhost:8080");
        assert_eq!(config.state.path, "s.json");
        assert_eq!(config.keycloak.auth_realm, "master");
    }

    #[test]
    fn test_client_credentials_require_secret() {
        let config = ConfigParser::new().parse_yaml(MINIMAL, None).unwrap();
        let err = ConfigParser::client_settings_from(&config.keycloak, env(&[])).unwrap_err();
        assert!(matches!(
            err,
            KcSyncError::Config(ConfigError::MissingEnvVar { ref name }) if name == CLIENT_SECRET_VAR
        ));

        let settings =
            ConfigParser::client_settings_from(&config.keycloak, env(&[(CLIENT_SECRET_VAR, "s")]))
                .unwrap();
        assert!(matches!(settings.credentials, Credentials::ClientCredentials { .. }));
    }

    #[test]
    fn test_password_grant_when_username_set() {
        let mut config = ConfigParser::new().parse_yaml(MINIMAL, None).unwrap();
        config.keycloak.username = Some(String::from("admin"));

        let err = ConfigParser::client_settings_from(&config.keycloak, env(&[])).unwrap_err();
        assert!(matches!(err, KcSyncError::Config(ConfigError::MissingEnvVar { .. })));

        let settings =
            ConfigParser::client_settings_from(&config.keycloak, env(&[(PASSWORD_VAR, "pw")]))
                .unwrap();
        assert!(matches!(
            settings.credentials,
            Credentials::Password { client_secret: None, .. }
        ));
    }

    #[test]
    fn test_find_config_file_searches_upward() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kcsync.yaml"), MINIMAL).unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("kcsync.yaml"));
    }
}
