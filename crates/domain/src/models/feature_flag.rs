//! Feature flag domain model.
//!
//! A [`FeatureFlag`] is a named, environment-scoped toggle. It owns its
//! strategy configuration as an opaque JSON document; only the strategy
//! evaluator interprets that document, keyed by [`StrategyType`].

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::errors::DomainError;

/// Deployment environment a flag applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 3] = [
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    /// Converts to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(DomainError::InvalidArgument(format!(
                "unknown environment '{}'",
                other
            ))),
        }
    }
}

/// Rollout strategy selector.
///
/// Selects which schema the flag's [`StrategyConfig`] must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    AllOff,
    AllOn,
    Percentage,
    RoleBased,
}

impl StrategyType {
    /// Converts to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::AllOff => "all_off",
            StrategyType::AllOn => "all_on",
            StrategyType::Percentage => "percentage",
            StrategyType::RoleBased => "role_based",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyType {
    type Err = DomainError;

    /// Unknown strategy names are a configuration problem, not bad user input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_off" => Ok(StrategyType::AllOff),
            "all_on" => Ok(StrategyType::AllOn),
            "percentage" => Ok(StrategyType::Percentage),
            "role_based" => Ok(StrategyType::RoleBased),
            other => Err(DomainError::StrategyConfig(format!(
                "unknown strategy type '{}'",
                other
            ))),
        }
    }
}

/// Strategy-specific parameters, stored as a JSON object.
///
/// Serializes as the document's compact JSON text. Deserializes from either
/// that text or an inline object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrategyConfig(serde_json::Map<String, serde_json::Value>);

impl StrategyConfig {
    /// The empty document `{}`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a config document; an absent document is the empty one.
    pub fn parse(text: Option<&str>) -> Result<Self, DomainError> {
        match text {
            None => Ok(Self::empty()),
            Some(text) => {
                let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                    DomainError::InvalidArgument(format!(
                        "strategy config is not valid JSON: {}",
                        e
                    ))
                })?;
                Self::from_value(value)
            }
        }
    }

    /// Wraps an already-parsed JSON value, which must be an object.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DomainError> {
        match value {
            serde_json::Value::Object(map) => Ok(Self(map)),
            other => Err(DomainError::InvalidArgument(format!(
                "strategy config must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for StrategyConfig {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Serializing a map of JSON values cannot fail.
        let text = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl Serialize for StrategyConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StrategyConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let parsed = match value {
            serde_json::Value::Null => Ok(Self::empty()),
            serde_json::Value::String(text) => Self::parse(Some(&text)),
            other => Self::from_value(other),
        };
        parsed.map_err(de::Error::custom)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// A feature flag.
///
/// Fields are private: `is_enabled`, the strategy pair and `updated_at` change
/// only through [`FeatureFlag::set_enabled`] and [`FeatureFlag::update_strategy`],
/// and nothing else changes after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "FeatureFlagDocument")]
pub struct FeatureFlag {
    id: Uuid,
    name: String,
    environment: Environment,
    is_enabled: bool,
    strategy_type: StrategyType,
    strategy_config: StrategyConfig,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Field-by-field form of a flag, as stored or received over the wire.
///
/// Converting it into a [`FeatureFlag`] re-checks the entity invariants.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlagDocument {
    pub id: Uuid,
    pub name: String,
    pub environment: Environment,
    pub is_enabled: bool,
    pub strategy_type: StrategyType,
    #[serde(default)]
    pub strategy_config: StrategyConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeatureFlag {
    /// Creates a new flag with a fresh identity.
    ///
    /// `strategy_config` defaults to `{}` when absent. Fails with
    /// [`DomainError::InvalidArgument`] when the name is blank or not 3-100
    /// characters, or when the config is not a JSON object.
    pub fn new(
        name: &str,
        environment: Environment,
        is_enabled: bool,
        strategy_type: StrategyType,
        strategy_config: Option<&str>,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        shared::validation::validate_flag_name(name)?;
        let strategy_config = StrategyConfig::parse(strategy_config)?;
        let now = clock.now();

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            environment,
            is_enabled,
            strategy_type,
            strategy_config,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a flag from its stored fields.
    pub fn restore(document: FeatureFlagDocument) -> Result<Self, DomainError> {
        shared::validation::validate_flag_name(&document.name)?;

        Ok(Self {
            id: document.id,
            name: document.name,
            environment: document.environment,
            is_enabled: document.is_enabled,
            strategy_type: document.strategy_type,
            strategy_config: document.strategy_config,
            created_at: document.created_at,
            updated_at: document.updated_at,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn strategy_type(&self) -> StrategyType {
        self.strategy_type
    }

    pub fn strategy_config(&self) -> &StrategyConfig {
        &self.strategy_config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Sets the global kill switch.
    pub fn set_enabled(&mut self, enabled: bool, clock: &dyn Clock) {
        self.is_enabled = enabled;
        self.updated_at = clock.now();
    }

    /// Replaces the strategy type and its configuration together.
    ///
    /// The config is parsed before anything is assigned, so a failed update
    /// leaves the flag untouched. Only document syntax is checked here; the
    /// per-strategy schema is checked at evaluation time.
    pub fn update_strategy(
        &mut self,
        strategy_type: StrategyType,
        strategy_config: Option<&str>,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let strategy_config = StrategyConfig::parse(strategy_config)?;
        self.strategy_type = strategy_type;
        self.strategy_config = strategy_config;
        self.updated_at = clock.now();
        Ok(())
    }

    /// Converts back into the field-by-field form.
    pub fn into_document(self) -> FeatureFlagDocument {
        FeatureFlagDocument {
            id: self.id,
            name: self.name,
            environment: self.environment,
            is_enabled: self.is_enabled,
            strategy_type: self.strategy_type,
            strategy_config: self.strategy_config,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl TryFrom<FeatureFlagDocument> for FeatureFlag {
    type Error = DomainError;

    fn try_from(document: FeatureFlagDocument) -> Result<Self, Self::Error> {
        Self::restore(document)
    }
}

fn default_strategy_type() -> StrategyType {
    StrategyType::AllOn
}

/// Request payload for creating a feature flag.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeatureFlagRequest {
    #[validate(length(min = 3, max = 100, message = "Name must be between 3 and 100 characters"))]
    pub name: String,

    pub environment: Environment,

    #[serde(default)]
    pub is_enabled: bool,

    #[serde(default = "default_strategy_type")]
    pub strategy_type: StrategyType,

    /// Either the document's JSON text or an inline JSON object.
    #[serde(default)]
    pub strategy_config: Option<serde_json::Value>,
}

/// Request payload for flipping the global switch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetEnabledRequest {
    pub is_enabled: bool,
}

/// Request payload for replacing a flag's strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStrategyRequest {
    pub strategy_type: StrategyType,

    #[serde(default)]
    pub strategy_config: Option<serde_json::Value>,
}

/// Query parameters for listing flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFeatureFlagsQuery {
    pub environment: Option<Environment>,
}

/// Response for listing flags.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFeatureFlagsResponse {
    pub flags: Vec<FeatureFlag>,
    pub total: usize,
}

/// Normalizes a request's `strategyConfig` field to document text.
///
/// Accepts the text itself or an inline value; `null` means absent.
pub fn strategy_config_text(value: Option<serde_json::Value>) -> Option<String> {
    match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    }
}
