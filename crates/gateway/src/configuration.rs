//! Gateway configuration, read from a YAML file at startup.

use registry::{Registry, User};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("field {0:?} must not be empty")]
    EmptyField(&'static str),
    #[error("user entry {0} is missing an id or key")]
    IncompleteUser(usize),
    #[error("duplicate user id {0:?}")]
    DuplicateUserId(String),
    #[error("duplicate API key for user {0:?}")]
    DuplicateKey(String),
}

/// A user seeded into the registry from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address the gateway listens on.
    pub listen: String,
    /// Upstream inference backend, host:port.
    pub upstream: String,
    /// Host header value presented to the upstream.
    pub upstream_host: String,
    /// Registered users; when empty, the simulation defaults are seeded.
    pub users: Vec<UserEntry>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
            upstream: "127.0.0.1:11434".to_string(),
            upstream_host: "localhost:11434".to_string(),
            users: Vec::new(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.is_empty() {
            return Err(ConfigError::EmptyField("listen"));
        }
        if self.upstream.is_empty() {
            return Err(ConfigError::EmptyField("upstream"));
        }
        if self.upstream_host.is_empty() {
            return Err(ConfigError::EmptyField("upstream_host"));
        }

        let mut ids = std::collections::HashSet::new();
        let mut keys = std::collections::HashSet::new();
        for (i, user) in self.users.iter().enumerate() {
            if user.id.is_empty() || user.key.is_empty() {
                return Err(ConfigError::IncompleteUser(i));
            }
            if !ids.insert(user.id.as_str()) {
                return Err(ConfigError::DuplicateUserId(user.id.clone()));
            }
            if !keys.insert(user.key.as_str()) {
                return Err(ConfigError::DuplicateKey(user.id.clone()));
            }
        }
        Ok(())
    }

    /// Build the registry: configured users, or the defaults when none are
    /// configured.
    pub fn registry(&self) -> Registry {
        if self.users.is_empty() {
            return Registry::default();
        }
        Registry::new(
            self.users
                .iter()
                .map(|u| User::new(u.id.clone(), u.key.clone(), u.admin)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_config_yaml() {
        let yaml_data = r#"
        listen: "127.0.0.1:9000"
        upstream: "127.0.0.1:11434"
        upstream_host: "localhost:11434"
        users:
          - id: alice
            key: sk-alice-001
          - id: admin
            key: sk-admin-001
            admin: true
        "#;

        let config: GatewayConfig =
            serde_yaml::from_str(yaml_data).expect("Failed to deserialize config");
        config.validate().expect("config should be valid");

        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.users.len(), 2);
        assert!(!config.users[0].admin);
        assert!(config.users[1].admin);

        let registry = config.registry();
        assert_eq!(registry.resolve("sk-admin-001"), Some(("admin", true)));
        assert_eq!(registry.resolve("sk-bob-001"), None);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: GatewayConfig = serde_yaml::from_str("listen: \"0.0.0.0:9999\"").unwrap();

        assert_eq!(config.listen, "0.0.0.0:9999");
        assert_eq!(config.upstream, "127.0.0.1:11434");
        assert!(config.users.is_empty());
        // Empty user list seeds the simulation defaults.
        assert_eq!(config.registry().len(), 4);
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let yaml_data = r#"
        users:
          - id: alice
            key: sk-1
          - id: alice
            key: sk-2
        "#;
        let config: GatewayConfig = serde_yaml::from_str(yaml_data).unwrap();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateUserId(_))
        ));
    }

    #[test]
    fn validate_rejects_duplicate_keys() {
        let yaml_data = r#"
        users:
          - id: alice
            key: sk-1
          - id: bob
            key: sk-1
        "#;
        let config: GatewayConfig = serde_yaml::from_str(yaml_data).unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::DuplicateKey(_))));
    }

    #[test]
    fn validate_rejects_incomplete_users() {
        let yaml_data = r#"
        users:
          - id: alice
            key: ""
        "#;
        let config: GatewayConfig = serde_yaml::from_str(yaml_data).unwrap();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::IncompleteUser(0))
        ));
    }
}
