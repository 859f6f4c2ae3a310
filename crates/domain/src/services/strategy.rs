//! Parsed rollout strategies.
//!
//! A flag stores its strategy as an opaque `(StrategyType, StrategyConfig)`
//! pair. [`RolloutStrategy::parse`] checks the config against the schema its
//! type requires and produces a typed strategy. Parsing is the only place a
//! config schema is enforced.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::errors::DomainError;
use crate::models::{StrategyConfig, StrategyType};

const PERCENTAGE_KEY: &str = "percentage";
const BUCKET_BY_KEY: &str = "bucketBy";
const ROLES_KEY: &str = "roles";

/// Percentage rollout parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentageRollout {
    percentage: f64,
    bucket_by: Option<String>,
}

impl PercentageRollout {
    /// Creates a rollout for `percentage` of subjects, bucketed by user id.
    pub fn new(percentage: f64) -> Result<Self, DomainError> {
        shared::validation::validate_percentage(percentage).map_err(|e| {
            DomainError::StrategyConfig(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            )
        })?;
        Ok(Self {
            percentage,
            bucket_by: None,
        })
    }

    /// Buckets by the named context attribute instead of the user id.
    pub fn with_bucket_by(mut self, attribute: impl Into<String>) -> Self {
        self.bucket_by = Some(attribute.into());
        self
    }

    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    pub fn bucket_by(&self) -> Option<&str> {
        self.bucket_by.as_deref()
    }

    /// Rollout that reaches every subject, no identifier needed.
    pub fn is_full(&self) -> bool {
        self.percentage >= 100.0
    }

    /// Rollout that reaches no subject, no identifier needed.
    pub fn is_empty(&self) -> bool {
        self.percentage <= 0.0
    }

    fn from_config(config: &StrategyConfig) -> Result<Self, DomainError> {
        let percentage = match config.get(PERCENTAGE_KEY) {
            None => {
                return Err(DomainError::StrategyConfig(
                    "percentage strategy requires a 'percentage' value".to_string(),
                ))
            }
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
                DomainError::StrategyConfig(format!("percentage {} is not representable", n))
            })?,
            Some(other) => {
                return Err(DomainError::StrategyConfig(format!(
                    "percentage must be a number, got {}",
                    other
                )))
            }
        };

        let rollout = Self::new(percentage)?;
        match config.get(BUCKET_BY_KEY) {
            None | Some(Value::Null) => Ok(rollout),
            Some(Value::String(attribute)) if !attribute.is_empty() => {
                Ok(rollout.with_bucket_by(attribute.as_str()))
            }
            Some(other) => Err(DomainError::StrategyConfig(format!(
                "bucketBy must be a non-empty string, got {}",
                other
            ))),
        }
    }
}

/// Role-based rollout parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleRollout {
    roles: BTreeSet<String>,
}

impl RoleRollout {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    fn from_config(config: &StrategyConfig) -> Result<Self, DomainError> {
        let values = match config.get(ROLES_KEY) {
            Some(Value::Array(values)) => values,
            None => {
                return Err(DomainError::StrategyConfig(
                    "role_based strategy requires a 'roles' list".to_string(),
                ))
            }
            Some(other) => {
                return Err(DomainError::StrategyConfig(format!(
                    "roles must be a list of strings, got {}",
                    other
                )))
            }
        };

        let roles = values
            .iter()
            .map(|value| match value {
                Value::String(role) => Ok(role.clone()),
                other => Err(DomainError::StrategyConfig(format!(
                    "roles must be a list of strings, found {}",
                    other
                ))),
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Self { roles })
    }
}

/// A flag's strategy after its config has been checked.
#[derive(Debug, Clone, PartialEq)]
pub enum RolloutStrategy {
    AllOn,
    AllOff,
    Percentage(PercentageRollout),
    RoleBased(RoleRollout),
}

impl RolloutStrategy {
    /// Checks `config` against the schema `strategy_type` requires.
    ///
    /// `all_on` and `all_off` accept any config. Unknown keys are ignored.
    pub fn parse(
        strategy_type: StrategyType,
        config: &StrategyConfig,
    ) -> Result<Self, DomainError> {
        match strategy_type {
            StrategyType::AllOn => Ok(RolloutStrategy::AllOn),
            StrategyType::AllOff => Ok(RolloutStrategy::AllOff),
            StrategyType::Percentage => {
                PercentageRollout::from_config(config).map(RolloutStrategy::Percentage)
            }
            StrategyType::RoleBased => {
                RoleRollout::from_config(config).map(RolloutStrategy::RoleBased)
            }
        }
    }

    pub fn strategy_type(&self) -> StrategyType {
        match self {
            RolloutStrategy::AllOn => StrategyType::AllOn,
            RolloutStrategy::AllOff => StrategyType::AllOff,
            RolloutStrategy::Percentage(_) => StrategyType::Percentage,
            RolloutStrategy::RoleBased(_) => StrategyType::RoleBased,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> StrategyConfig {
        StrategyConfig::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_all_on_and_all_off_ignore_config() {
        let noisy = config(json!({"percentage": "junk", "roles": 7}));
        assert_eq!(
            RolloutStrategy::parse(StrategyType::AllOn, &noisy).unwrap(),
            RolloutStrategy::AllOn
        );
        assert_eq!(
            RolloutStrategy::parse(StrategyType::AllOff, &noisy).unwrap(),
            RolloutStrategy::AllOff
        );
    }

    #[test]
    fn test_parse_percentage() {
        let strategy =
            RolloutStrategy::parse(StrategyType::Percentage, &config(json!({"percentage": 12.5})))
                .unwrap();
        match strategy {
            RolloutStrategy::Percentage(rollout) => {
                assert_eq!(rollout.percentage(), 12.5);
                assert_eq!(rollout.bucket_by(), None);
            }
            other => panic!("expected percentage strategy, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_percentage_with_bucket_by() {
        let strategy = RolloutStrategy::parse(
            StrategyType::Percentage,
            &config(json!({"percentage": 30, "bucketBy": "tenant"})),
        )
        .unwrap();
        assert_eq!(
            strategy,
            RolloutStrategy::Percentage(PercentageRollout::new(30.0).unwrap().with_bucket_by("tenant"))
        );
    }

    #[test]
    fn test_parse_percentage_not_a_number() {
        let result = RolloutStrategy::parse(
            StrategyType::Percentage,
            &config(json!({"percentage": "not-a-number"})),
        );
        assert!(matches!(result, Err(DomainError::StrategyConfig(_))));
    }

    #[test]
    fn test_parse_percentage_missing_or_out_of_range() {
        for doc in [
            json!({}),
            json!({"percentage": -1}),
            json!({"percentage": 100.5}),
            json!({"percentage": null}),
        ] {
            let result = RolloutStrategy::parse(StrategyType::Percentage, &config(doc.clone()));
            assert!(
                matches!(result, Err(DomainError::StrategyConfig(_))),
                "{} should be rejected",
                doc
            );
        }
    }

    #[test]
    fn test_parse_percentage_bad_bucket_by() {
        for bucket_by in [json!(""), json!(42), json!(["userId"])] {
            let result = RolloutStrategy::parse(
                StrategyType::Percentage,
                &config(json!({"percentage": 10, "bucketBy": bucket_by})),
            );
            assert!(matches!(result, Err(DomainError::StrategyConfig(_))));
        }
    }

    #[test]
    fn test_parse_roles() {
        let strategy = RolloutStrategy::parse(
            StrategyType::RoleBased,
            &config(json!({"roles": ["admin", "beta", "admin"], "note": "ignored"})),
        )
        .unwrap();
        assert_eq!(strategy, RolloutStrategy::RoleBased(RoleRollout::new(["admin", "beta"])));
    }

    #[test]
    fn test_parse_empty_roles_is_allowed() {
        let strategy =
            RolloutStrategy::parse(StrategyType::RoleBased, &config(json!({"roles": []}))).unwrap();
        assert_eq!(strategy, RolloutStrategy::RoleBased(RoleRollout::default()));
    }

    #[test]
    fn test_parse_roles_rejects_bad_shapes() {
        for doc in [
            json!({}),
            json!({"roles": "admin"}),
            json!({"roles": ["admin", 3]}),
        ] {
            let result = RolloutStrategy::parse(StrategyType::RoleBased, &config(doc));
            assert!(matches!(result, Err(DomainError::StrategyConfig(_))));
        }
    }

    #[test]
    fn test_percentage_rollout_bounds() {
        assert!(PercentageRollout::new(0.0).unwrap().is_empty());
        assert!(PercentageRollout::new(100.0).unwrap().is_full());
        assert!(matches!(
            PercentageRollout::new(f64::NAN),
            Err(DomainError::StrategyConfig(_))
        ));
    }
}
