//! Feature flag repository backed by PostgreSQL.

use domain::models::{Environment, FeatureFlag};
use domain::services::{FlagStore, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::FeatureFlagEntity;
use crate::metrics::QueryTimer;

/// SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

const COLUMNS: &str = "id, name, environment, is_enabled, strategy_type, strategy_config, created_at, updated_at";

/// Repository for feature flag database operations.
#[derive(Clone)]
pub struct FeatureFlagRepository {
    pool: PgPool,
}

impl FeatureFlagRepository {
    /// Creates a new FeatureFlagRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn backend_error(err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, "Feature flag query failed");
    StoreError::Backend(err.to_string())
}

/// Maps a write failure, turning a `(name, environment)` collision into a conflict.
fn write_error(err: sqlx::Error, flag: &FeatureFlag) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Conflict {
                name: flag.name().to_string(),
                environment: flag.environment(),
            };
        }
    }
    backend_error(err)
}

fn into_flag(entity: FeatureFlagEntity) -> Result<FeatureFlag, StoreError> {
    let id = entity.id;
    FeatureFlag::try_from(entity).map_err(|e| {
        tracing::error!(flag_id = %id, error = %e, "Stored feature flag violates invariants");
        StoreError::Corrupt(format!("flag {}: {}", id, e))
    })
}

#[async_trait::async_trait]
impl FlagStore for FeatureFlagRepository {
    async fn insert(&self, flag: &FeatureFlag) -> Result<(), StoreError> {
        let entity = FeatureFlagEntity::from(flag);
        let timer = QueryTimer::new("insert_feature_flag");
        let result = sqlx::query(
            r#"
            INSERT INTO feature_flags
                (id, name, environment, is_enabled, strategy_type, strategy_config, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entity.id)
        .bind(&entity.name)
        .bind(&entity.environment)
        .bind(entity.is_enabled)
        .bind(&entity.strategy_type)
        .bind(&entity.strategy_config)
        .bind(entity.created_at)
        .bind(entity.updated_at)
        .execute(&self.pool)
        .await;
        timer.record();

        result.map(|_| ()).map_err(|e| write_error(e, flag))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FeatureFlag>, StoreError> {
        let timer = QueryTimer::new("find_feature_flag_by_id");
        let result = sqlx::query_as::<_, FeatureFlagEntity>(&format!(
            "SELECT {} FROM feature_flags WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        result.map_err(backend_error)?.map(into_flag).transpose()
    }

    async fn find_by_name(
        &self,
        name: &str,
        environment: Environment,
    ) -> Result<Option<FeatureFlag>, StoreError> {
        let timer = QueryTimer::new("find_feature_flag_by_name");
        let result = sqlx::query_as::<_, FeatureFlagEntity>(&format!(
            "SELECT {} FROM feature_flags WHERE name = $1 AND environment = $2",
            COLUMNS
        ))
        .bind(name)
        .bind(environment.as_str())
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        result.map_err(backend_error)?.map(into_flag).transpose()
    }

    async fn list(&self, environment: Option<Environment>) -> Result<Vec<FeatureFlag>, StoreError> {
        let timer = QueryTimer::new("list_feature_flags");
        let result = sqlx::query_as::<_, FeatureFlagEntity>(&format!(
            r#"
            SELECT {}
            FROM feature_flags
            WHERE ($1::TEXT IS NULL OR environment = $1)
            ORDER BY
                CASE environment
                    WHEN 'development' THEN 0
                    WHEN 'staging' THEN 1
                    ELSE 2
                END,
                name
            "#,
            COLUMNS
        ))
        .bind(environment.map(|env| env.as_str()))
        .fetch_all(&self.pool)
        .await;
        timer.record();

        result
            .map_err(backend_error)?
            .into_iter()
            .map(into_flag)
            .collect()
    }

    async fn save(&self, flag: &FeatureFlag) -> Result<(), StoreError> {
        let entity = FeatureFlagEntity::from(flag);
        let timer = QueryTimer::new("save_feature_flag");
        let result = sqlx::query(
            r#"
            UPDATE feature_flags
            SET name = $2,
                environment = $3,
                is_enabled = $4,
                strategy_type = $5,
                strategy_config = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(entity.id)
        .bind(&entity.name)
        .bind(&entity.environment)
        .bind(entity.is_enabled)
        .bind(&entity.strategy_type)
        .bind(&entity.strategy_config)
        .bind(entity.updated_at)
        .execute(&self.pool)
        .await;
        timer.record();

        let done = result.map_err(|e| write_error(e, flag))?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound(flag.id()));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("delete_feature_flag");
        let result = sqlx::query("DELETE FROM feature_flags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();

        Ok(result.map_err(backend_error)?.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let timer = QueryTimer::new("ping");
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        timer.record();

        result.map(|_| ()).map_err(backend_error)
    }
}
