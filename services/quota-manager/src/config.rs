use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use qm_id::{LabelKey, Username};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Label that marks a namespace as managed by this service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedLabel {
    pub name: LabelKey,
    pub value: String,
}

/// Template turning a username into the subject of a RoleBinding.
///
/// Contains exactly one `{}` placeholder, e.g. `{}@corp.example.com`, and
/// none of the characters a username may not contain (`/`, `%`, whitespace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameFormat(String);

impl UsernameFormat {
    pub const PLACEHOLDER: &'static str = "{}";

    pub fn parse(template: &str) -> Result<Self, String> {
        let n = template.matches(Self::PLACEHOLDER).count();
        if n != 1 {
            return Err(format!(
                "expected exactly one '{}' placeholder, found {n}",
                Self::PLACEHOLDER
            ));
        }
        if let Some(c) = template
            .chars()
            .find(|&c| c == '/' || c == '%' || c.is_whitespace())
        {
            return Err(format!("must not contain {c:?}"));
        }
        Ok(Self(template.to_string()))
    }

    pub fn format(&self, username: &Username) -> String {
        self.0.replacen(Self::PLACEHOLDER, username.as_str(), 1)
    }
}

impl Default for UsernameFormat {
    fn default() -> Self {
        Self(Self::PLACEHOLDER.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,

    /// Directory holding `schemes/` and `clusters/`.
    pub config_dir: PathBuf,

    pub log_level: String,
    pub managed_label: ManagedLabel,

    /// Group whose members may manage quotas, looked up on each cluster.
    pub quota_managers_group: String,

    pub username_format: UsernameFormat,

    /// Deadline for each cluster API call.
    pub cluster_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(var))
        };
        let invalid = |var: &'static str, reason: String| ConfigError::Invalid { var, reason };

        let listen_addr = lookup("QM_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:5000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| invalid("QM_LISTEN_ADDR", e.to_string()))?;

        let config_dir = PathBuf::from(required("QM_CONFIG_DIR")?);

        let log_level = lookup("QM_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let name = LabelKey::parse(&required("QM_MANAGED_LABEL_NAME")?)
            .map_err(|e| invalid("QM_MANAGED_LABEL_NAME", e.to_string()))?;
        let value = required("QM_MANAGED_LABEL_VALUE")?;
        if !qm_scheme::is_label_value(&value) {
            return Err(invalid(
                "QM_MANAGED_LABEL_VALUE",
                format!("'{value}' is not a valid label value"),
            ));
        }

        let quota_managers_group = required("QM_QUOTA_MANAGERS_GROUP")?;

        let username_format = match lookup("QM_USERNAME_FORMAT") {
            Some(template) => UsernameFormat::parse(&template)
                .map_err(|reason| invalid("QM_USERNAME_FORMAT", reason))?,
            None => UsernameFormat::default(),
        };

        let cluster_timeout = match lookup("QM_CLUSTER_TIMEOUT_SECS") {
            Some(secs) => match secs.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(invalid(
                        "QM_CLUSTER_TIMEOUT_SECS",
                        format!("'{secs}' is not a positive number of seconds"),
                    ))
                }
            },
            None => Duration::from_secs(10),
        };

        Ok(Self {
            listen_addr,
            config_dir,
            log_level,
            managed_label: ManagedLabel { name, value },
            quota_managers_group,
            username_format,
            cluster_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = [
            ("QM_CONFIG_DIR", "/etc/quota-manager"),
            ("QM_MANAGED_LABEL_NAME", "quota.example.com/managed"),
            ("QM_MANAGED_LABEL_VALUE", "true"),
            ("QM_QUOTA_MANAGERS_GROUP", "quota-managers"),
        ]
        .iter()
        .chain(pairs)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(env(&[])).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.config_dir, PathBuf::from("/etc/quota-manager"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.managed_label.name.as_str(), "quota.example.com/managed");
        assert_eq!(config.managed_label.value, "true");
        assert_eq!(config.quota_managers_group, "quota-managers");
        assert_eq!(config.username_format, UsernameFormat::default());
        assert_eq!(config.cluster_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(env(&[
            ("QM_LISTEN_ADDR", "127.0.0.1:8080"),
            ("QM_USERNAME_FORMAT", "{}@corp.example.com"),
            ("QM_CLUSTER_TIMEOUT_SECS", "3"),
            ("QM_LOG_LEVEL", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.cluster_timeout, Duration::from_secs(3));
        assert_eq!(config.log_level, "debug");

        let alice = Username::parse("alice").unwrap();
        assert_eq!(config.username_format.format(&alice), "alice@corp.example.com");
    }

    #[rstest]
    #[case("QM_CONFIG_DIR")]
    #[case("QM_MANAGED_LABEL_NAME")]
    #[case("QM_MANAGED_LABEL_VALUE")]
    #[case("QM_QUOTA_MANAGERS_GROUP")]
    fn test_missing_required(#[case] var: &'static str) {
        let err = Config::from_lookup(env(&[(var, "")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(var));
    }

    #[rstest]
    #[case("QM_LISTEN_ADDR", "not-an-address")]
    #[case("QM_MANAGED_LABEL_NAME", "-bad-")]
    #[case("QM_MANAGED_LABEL_VALUE", "has space")]
    #[case("QM_USERNAME_FORMAT", "no-placeholder")]
    #[case("QM_USERNAME_FORMAT", "{}{}")]
    #[case("QM_USERNAME_FORMAT", "corp/{}")]
    #[case("QM_USERNAME_FORMAT", "{}%40corp")]
    #[case("QM_USERNAME_FORMAT", "{} admin")]
    #[case("QM_CLUSTER_TIMEOUT_SECS", "0")]
    #[case("QM_CLUSTER_TIMEOUT_SECS", "ten")]
    fn test_invalid(#[case] var: &'static str, #[case] value: &str) {
        let err = Config::from_lookup(env(&[(var, value)])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: v, .. } if v == var));
    }
}
