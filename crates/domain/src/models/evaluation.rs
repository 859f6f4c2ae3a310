//! Evaluation context and evaluation results.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::feature_flag::Environment;

/// Attributes of the subject a flag is evaluated for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    /// Stable identifier used for percentage bucketing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Roles held by the subject, matched exactly and case-sensitively.
    #[serde(default)]
    pub roles: BTreeSet<String>,

    /// Free-form attributes; any of them can be selected as the bucketing key.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Resolves the bucketing identifier.
    ///
    /// With no key, or the key `userId`, this is the user id; any other key
    /// names an attribute. Empty identifiers count as missing.
    pub fn identifier(&self, bucket_by: Option<&str>) -> Option<&str> {
        let value = match bucket_by {
            None | Some("userId") | Some("user_id") => self.user_id.as_deref(),
            Some(key) => self.attributes.get(key).map(String::as_str),
        };
        value.filter(|v| !v.is_empty())
    }

    /// True when the subject holds at least one of `roles`.
    pub fn has_any_role(&self, roles: &BTreeSet<String>) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }
}

/// Why an evaluation came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationReason {
    FlagDisabled,
    AllOn,
    AllOff,
    PercentageRollout,
    RoleMatch,
    RoleMismatch,
    /// Evaluation failed; only reported by bulk evaluation.
    Error,
}

impl EvaluationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationReason::FlagDisabled => "flag_disabled",
            EvaluationReason::AllOn => "all_on",
            EvaluationReason::AllOff => "all_off",
            EvaluationReason::PercentageRollout => "percentage_rollout",
            EvaluationReason::RoleMatch => "role_match",
            EvaluationReason::RoleMismatch => "role_mismatch",
            EvaluationReason::Error => "error",
        }
    }
}

impl std::fmt::Display for EvaluationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating a flag for a context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub enabled: bool,
    pub reason: EvaluationReason,
    /// Subject's position on the 0-100 scale, when a percentage rollout hashed it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<f64>,
}

impl Evaluation {
    pub fn new(enabled: bool, reason: EvaluationReason) -> Self {
        Self {
            enabled,
            reason,
            bucket: None,
        }
    }

    pub fn with_bucket(mut self, bucket: f64) -> Self {
        self.bucket = Some(bucket);
        self
    }
}

/// Request body for evaluating a single flag.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateFlagRequest {
    #[serde(default)]
    pub context: EvaluationContext,
}

/// Response for a single flag evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateFlagResponse {
    pub flag_id: Uuid,
    pub name: String,
    pub environment: Environment,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

/// Request body for evaluating every flag of an environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEvaluateRequest {
    pub environment: Environment,
    #[serde(default)]
    pub context: EvaluationContext,
}

/// State of a single flag in a bulk evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagState {
    pub enabled: bool,
    pub reason: EvaluationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Evaluation> for FlagState {
    fn from(evaluation: Evaluation) -> Self {
        Self {
            enabled: evaluation.enabled,
            reason: evaluation.reason,
            bucket: evaluation.bucket,
            error: None,
        }
    }
}

impl FlagState {
    /// A failed evaluation, reported as off.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            enabled: false,
            reason: EvaluationReason::Error,
            bucket: None,
            error: Some(message.into()),
        }
    }
}

/// Response for a bulk evaluation, keyed by flag name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEvaluateResponse {
    pub environment: Environment,
    pub flags: BTreeMap<String, FlagState>,
}
