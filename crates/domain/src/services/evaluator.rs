//! Strategy evaluation.
//!
//! Decides whether a flag is active for an evaluation context. Evaluation is
//! a pure function of the flag snapshot and the context.

use shared::crypto::{bucket_to_percent, rollout_bucket};

use super::strategy::{PercentageRollout, RoleRollout, RolloutStrategy};
use crate::errors::DomainError;
use crate::models::{Evaluation, EvaluationContext, EvaluationReason, FeatureFlag};

/// Evaluates flags against evaluation contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyEvaluator;

impl StrategyEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Returns whether `flag` is active for `context`.
    pub fn evaluate(
        &self,
        flag: &FeatureFlag,
        context: &EvaluationContext,
    ) -> Result<bool, DomainError> {
        self.explain(flag, context).map(|evaluation| evaluation.enabled)
    }

    /// Evaluates `flag` and reports why it came out as it did.
    ///
    /// A disabled flag is off before its strategy is looked at, so a broken
    /// config on a disabled flag does not fail evaluation.
    pub fn explain(
        &self,
        flag: &FeatureFlag,
        context: &EvaluationContext,
    ) -> Result<Evaluation, DomainError> {
        if !flag.is_enabled() {
            return Ok(Evaluation::new(false, EvaluationReason::FlagDisabled));
        }

        let strategy = RolloutStrategy::parse(flag.strategy_type(), flag.strategy_config())?;
        self.apply(&strategy, &flag.id().to_string(), context)
    }

    /// Applies a parsed strategy. `salt` scopes percentage buckets, normally
    /// the flag id.
    pub fn apply(
        &self,
        strategy: &RolloutStrategy,
        salt: &str,
        context: &EvaluationContext,
    ) -> Result<Evaluation, DomainError> {
        match strategy {
            RolloutStrategy::AllOn => Ok(Evaluation::new(true, EvaluationReason::AllOn)),
            RolloutStrategy::AllOff => Ok(Evaluation::new(false, EvaluationReason::AllOff)),
            RolloutStrategy::Percentage(rollout) => percentage(rollout, salt, context),
            RolloutStrategy::RoleBased(rollout) => Ok(roles(rollout, context)),
        }
    }
}

fn percentage(
    rollout: &PercentageRollout,
    salt: &str,
    context: &EvaluationContext,
) -> Result<Evaluation, DomainError> {
    if rollout.is_empty() {
        return Ok(Evaluation::new(false, EvaluationReason::PercentageRollout));
    }
    if rollout.is_full() {
        return Ok(Evaluation::new(true, EvaluationReason::PercentageRollout));
    }

    let identifier = context.identifier(rollout.bucket_by()).ok_or_else(|| {
        DomainError::InvalidArgument(format!(
            "evaluation context has no '{}' to bucket a percentage rollout by",
            rollout.bucket_by().unwrap_or("userId")
        ))
    })?;

    let bucket = bucket_to_percent(rollout_bucket(salt, identifier));
    Ok(
        Evaluation::new(bucket < rollout.percentage(), EvaluationReason::PercentageRollout)
            .with_bucket(bucket),
    )
}

fn roles(rollout: &RoleRollout, context: &EvaluationContext) -> Evaluation {
    if context.has_any_role(rollout.roles()) {
        Evaluation::new(true, EvaluationReason::RoleMatch)
    } else {
        Evaluation::new(false, EvaluationReason::RoleMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Environment, StrategyType};
    use chrono::{TimeZone, Utc};

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap())
    }

    fn flag(enabled: bool, strategy_type: StrategyType, config: &str) -> FeatureFlag {
        FeatureFlag::new(
            "dark-mode",
            Environment::Production,
            enabled,
            strategy_type,
            Some(config),
            &clock(),
        )
        .unwrap()
    }

    fn user(id: impl Into<String>) -> EvaluationContext {
        EvaluationContext::new().with_user_id(id)
    }

    #[test]
    fn test_all_on_and_all_off() {
        let evaluator = StrategyEvaluator::new();
        let ctx = EvaluationContext::new();

        assert!(evaluator.evaluate(&flag(true, StrategyType::AllOn, "{}"), &ctx).unwrap());
        assert!(!evaluator.evaluate(&flag(true, StrategyType::AllOff, "{}"), &ctx).unwrap());
    }

    #[test]
    fn test_disabled_flag_is_off_for_every_strategy() {
        let evaluator = StrategyEvaluator::new();
        let ctx = user("user-1").with_role("admin");
        let cases = [
            (StrategyType::AllOn, "{}"),
            (StrategyType::Percentage, r#"{"percentage":100}"#),
            (StrategyType::RoleBased, r#"{"roles":["admin"]}"#),
            // Broken config is never looked at.
            (StrategyType::Percentage, r#"{"percentage":"not-a-number"}"#),
        ];

        for (strategy_type, config) in cases {
            let mut f = flag(true, strategy_type, config);
            f.set_enabled(false, &clock());
            let evaluation = evaluator.explain(&f, &ctx).unwrap();
            assert!(!evaluation.enabled);
            assert_eq!(evaluation.reason, EvaluationReason::FlagDisabled);
        }
    }

    #[test]
    fn test_percentage_zero_is_off_for_every_context() {
        let evaluator = StrategyEvaluator::new();
        let f = flag(true, StrategyType::Percentage, r#"{"percentage":0}"#);

        assert!(!evaluator.evaluate(&f, &EvaluationContext::new()).unwrap());
        for i in 0..1_000 {
            assert!(!evaluator.evaluate(&f, &user(format!("user-{}", i))).unwrap());
        }
    }

    #[test]
    fn test_percentage_hundred_is_on_for_every_context() {
        let evaluator = StrategyEvaluator::new();
        let f = flag(true, StrategyType::Percentage, r#"{"percentage":100}"#);

        assert!(evaluator.evaluate(&f, &EvaluationContext::new()).unwrap());
        for i in 0..1_000 {
            assert!(evaluator.evaluate(&f, &user(format!("user-{}", i))).unwrap());
        }
    }

    #[test]
    fn test_percentage_fifty_activates_about_half() {
        let evaluator = StrategyEvaluator::new();
        let f = flag(true, StrategyType::Percentage, r#"{"percentage":50}"#);

        let active = (0..10_000)
            .filter(|i| evaluator.evaluate(&f, &user(format!("user-{}", i))).unwrap())
            .count();

        assert!(
            (4_500..=5_500).contains(&active),
            "{} of 10000 active",
            active
        );
    }

    #[test]
    fn test_percentage_is_deterministic() {
        let evaluator = StrategyEvaluator::new();
        let f = flag(true, StrategyType::Percentage, r#"{"percentage":37.5}"#);

        for i in 0..200 {
            let ctx = user(format!("user-{}", i));
            let first = evaluator.explain(&f, &ctx).unwrap();
            let second = evaluator.explain(&f.clone(), &ctx.clone()).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_percentage_is_monotonic_in_percentage() {
        // Raising the percentage never turns a subject off.
        let evaluator = StrategyEvaluator::new();
        let mut f = flag(true, StrategyType::Percentage, r#"{"percentage":20}"#);
        let ctxs: Vec<_> = (0..500).map(|i| user(format!("user-{}", i))).collect();
        let before: Vec<bool> = ctxs
            .iter()
            .map(|ctx| evaluator.evaluate(&f, ctx).unwrap())
            .collect();

        f.update_strategy(StrategyType::Percentage, Some(r#"{"percentage":60}"#), &clock())
            .unwrap();

        for (ctx, was_on) in ctxs.iter().zip(before) {
            if was_on {
                assert!(evaluator.evaluate(&f, ctx).unwrap());
            }
        }
    }

    #[test]
    fn test_percentage_reports_bucket() {
        let evaluator = StrategyEvaluator::new();
        let f = flag(true, StrategyType::Percentage, r#"{"percentage":50}"#);
        let evaluation = evaluator.explain(&f, &user("user-7")).unwrap();

        let bucket = evaluation.bucket.unwrap();
        assert!((0.0..100.0).contains(&bucket));
        assert_eq!(evaluation.enabled, bucket < 50.0);
        assert_eq!(evaluation.reason, EvaluationReason::PercentageRollout);
    }

    #[test]
    fn test_percentage_without_identifier_is_invalid_argument() {
        let evaluator = StrategyEvaluator::new();
        let f = flag(true, StrategyType::Percentage, r#"{"percentage":50}"#);

        let result = evaluator.evaluate(&f, &EvaluationContext::new().with_role("admin"));
        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[test]
    fn test_percentage_bucket_by_attribute() {
        let evaluator = StrategyEvaluator::new();
        let f = flag(
            true,
            StrategyType::Percentage,
            r#"{"percentage":50,"bucketBy":"tenant"}"#,
        );

        // Same tenant, different users: same decision.
        let a = EvaluationContext::new().with_user_id("u-1").with_attribute("tenant", "acme");
        let b = EvaluationContext::new().with_user_id("u-2").with_attribute("tenant", "acme");
        assert_eq!(evaluator.explain(&f, &a).unwrap(), evaluator.explain(&f, &b).unwrap());

        let missing = EvaluationContext::new().with_user_id("u-1");
        assert!(matches!(
            evaluator.evaluate(&f, &missing),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_percentage_not_a_number_is_config_error() {
        let evaluator = StrategyEvaluator::new();
        let f = flag(
            true,
            StrategyType::Percentage,
            r#"{"percentage":"not-a-number"}"#,
        );
        assert!(matches!(
            evaluator.evaluate(&f, &user("user-1")),
            Err(DomainError::StrategyConfig(_))
        ));
    }

    #[test]
    fn test_role_based() {
        let evaluator = StrategyEvaluator::new();
        let f = flag(true, StrategyType::RoleBased, r#"{"roles":["admin"]}"#);

        let both = EvaluationContext::new().with_roles(["admin", "user"]);
        let user_only = EvaluationContext::new().with_role("user");

        let matched = evaluator.explain(&f, &both).unwrap();
        assert!(matched.enabled);
        assert_eq!(matched.reason, EvaluationReason::RoleMatch);

        let missed = evaluator.explain(&f, &user_only).unwrap();
        assert!(!missed.enabled);
        assert_eq!(missed.reason, EvaluationReason::RoleMismatch);
    }

    #[test]
    fn test_role_based_empty_roles_activates_nobody() {
        let evaluator = StrategyEvaluator::new();
        let f = flag(true, StrategyType::RoleBased, r#"{"roles":[]}"#);
        let ctx = EvaluationContext::new().with_roles(["admin", "user"]);
        assert!(!evaluator.evaluate(&f, &ctx).unwrap());
    }

    #[test]
    fn test_role_based_missing_roles_is_config_error() {
        let evaluator = StrategyEvaluator::new();
        let f = flag(true, StrategyType::RoleBased, "{}");
        assert!(matches!(
            evaluator.evaluate(&f, &EvaluationContext::new()),
            Err(DomainError::StrategyConfig(_))
        ));
    }

    #[test]
    fn test_buckets_are_independent_between_flags() {
        let evaluator = StrategyEvaluator::new();
        let a = flag(true, StrategyType::Percentage, r#"{"percentage":50}"#);
        let b = flag(true, StrategyType::Percentage, r#"{"percentage":50}"#);

        let differing = (0..500)
            .filter(|i| {
                let ctx = user(format!("user-{}", i));
                evaluator.explain(&a, &ctx).unwrap().bucket
                    != evaluator.explain(&b, &ctx).unwrap().bucket
            })
            .count();
        assert!(differing > 400);
    }
}
