//! Resolver configuration
//!
//! Settings that change how the persistence coordinator treats failed
//! delete-before-update cleanup and which kind name children hydration
//! matches in the discriminator column. Values come from code, from the
//! process environment or from any key lookup.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Environment key selecting the delete-before-update failure policy
pub const DELETE_POLICY_ENV: &str = "POLYMORPHIC_DELETE_POLICY";

/// Environment key selecting the children discriminator value
pub const CHILD_DISCRIMINATOR_ENV: &str = "POLYMORPHIC_CHILD_DISCRIMINATOR";

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value loaded from environment variable
    EnvVar(String),
    /// Default value used
    Default(String),
    /// Value provided programmatically
    Programmatic,
}

impl ConfigSource {
    pub fn is_env_var(&self) -> bool {
        matches!(self, ConfigSource::EnvVar(_))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ConfigSource::Default(_))
    }
}

/// Configuration that can be loaded from environment variables
pub trait EnvConfig: Sized {
    /// Load configuration from an arbitrary key lookup
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>;

    /// Load configuration from the process environment
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;
}

/// What happens when a delete-before-update cleanup fails in the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Log the failure and continue with the save
    #[default]
    BestEffort,
    /// Abort the save with the delete failure
    Strict,
}

impl FromStr for DeletePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best_effort" | "best-effort" | "besteffort" => Ok(DeletePolicy::BestEffort),
            "strict" => Ok(DeletePolicy::Strict),
            _ => Err(ConfigError::InvalidValue {
                field: "delete_policy".to_string(),
                value: s.to_string(),
                expected: "best_effort or strict".to_string(),
            }),
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletePolicy::BestEffort => write!(f, "best_effort"),
            DeletePolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Which kind name a children row's type column is matched against when
/// hydrating. Delete-before-update always matches the target kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscriminatorMatch {
    /// The owning record's kind, the same value parent stamping writes
    #[default]
    OwnerKind,
    /// The child's own declared target kind
    TargetKind,
}

impl FromStr for DiscriminatorMatch {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" | "owner_kind" => Ok(DiscriminatorMatch::OwnerKind),
            "target" | "target_kind" => Ok(DiscriminatorMatch::TargetKind),
            _ => Err(ConfigError::InvalidValue {
                field: "child_discriminator".to_string(),
                value: s.to_string(),
                expected: "owner or target".to_string(),
            }),
        }
    }
}

impl fmt::Display for DiscriminatorMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscriminatorMatch::OwnerKind => write!(f, "owner"),
            DiscriminatorMatch::TargetKind => write!(f, "target"),
        }
    }
}

/// Runtime settings for a polymorphic repository
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    pub delete_policy: DeletePolicy,
    pub discriminator_match: DiscriminatorMatch,

    /// Where each non-default value came from
    sources: HashMap<&'static str, ConfigSource>,
}

impl PartialEq for ResolverConfig {
    fn eq(&self, other: &Self) -> bool {
        self.delete_policy == other.delete_policy && self.discriminator_match == other.discriminator_match
    }
}

impl Eq for ResolverConfig {}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort saves whose delete-before-update cleanup fails
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self.sources.insert("delete_policy", ConfigSource::Programmatic);
        self
    }

    pub fn with_discriminator_match(mut self, matching: DiscriminatorMatch) -> Self {
        self.discriminator_match = matching;
        self.sources.insert("discriminator_match", ConfigSource::Programmatic);
        self
    }

    /// Report where each value came from, for debugging.
    ///
    /// Values assigned straight to the public fields report as defaults.
    pub fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let source = |field: &str, default: String| {
            self.sources
                .get(field)
                .cloned()
                .unwrap_or(ConfigSource::Default(default))
        };

        HashMap::from([
            (
                "delete_policy".to_string(),
                source("delete_policy", DeletePolicy::default().to_string()),
            ),
            (
                "discriminator_match".to_string(),
                source("discriminator_match", DiscriminatorMatch::default().to_string()),
            ),
        ])
    }
}

impl EnvConfig for ResolverConfig {
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(policy) = lookup(DELETE_POLICY_ENV) {
            config.delete_policy = policy.parse()?;
            config
                .sources
                .insert("delete_policy", ConfigSource::EnvVar(DELETE_POLICY_ENV.to_string()));
        }

        if let Some(matching) = lookup(CHILD_DISCRIMINATOR_ENV) {
            config.discriminator_match = matching.parse()?;
            config.sources.insert(
                "discriminator_match",
                ConfigSource::EnvVar(CHILD_DISCRIMINATOR_ENV.to_string()),
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Both settings are closed enums, so any parsed combination is valid.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}
