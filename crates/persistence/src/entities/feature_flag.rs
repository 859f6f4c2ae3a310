//! Feature flag entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{FeatureFlag, FeatureFlagDocument, StrategyConfig};
use domain::DomainError;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the feature_flags table.
#[derive(Debug, Clone, FromRow)]
pub struct FeatureFlagEntity {
    pub id: Uuid,
    pub name: String,
    pub environment: String,
    pub is_enabled: bool,
    pub strategy_type: String,
    pub strategy_config: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&FeatureFlag> for FeatureFlagEntity {
    fn from(flag: &FeatureFlag) -> Self {
        Self {
            id: flag.id(),
            name: flag.name().to_string(),
            environment: flag.environment().as_str().to_string(),
            is_enabled: flag.is_enabled(),
            strategy_type: flag.strategy_type().as_str().to_string(),
            strategy_config: flag.strategy_config().to_string(),
            created_at: flag.created_at(),
            updated_at: flag.updated_at(),
        }
    }
}

impl TryFrom<FeatureFlagEntity> for FeatureFlag {
    type Error = DomainError;

    fn try_from(entity: FeatureFlagEntity) -> Result<Self, Self::Error> {
        FeatureFlag::restore(FeatureFlagDocument {
            id: entity.id,
            name: entity.name,
            environment: entity.environment.parse()?,
            is_enabled: entity.is_enabled,
            strategy_type: entity.strategy_type.parse()?,
            strategy_config: StrategyConfig::parse(Some(&entity.strategy_config))?,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}
