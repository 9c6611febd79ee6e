//! 获取条件评估器
//!
//! 给定一个徽章等级和活动快照，计算是否获得以及完成比例。

use std::sync::Arc;

use badge_shared::observability::metrics;
use tracing::debug;

use crate::catalog::CatalogStore;
use crate::error::{EngineError, Result};
use crate::models::{ActivitySnapshot, BadgeTier, EvaluatedTier, Requirement};

/// 未获得时比例的上界，保证 `earned == (progress_ratio == 1.0)`
const MAX_UNEARNED_RATIO: f64 = 1.0 - f64::EPSILON;

/// 条件评估器
pub struct RequirementEvaluator;

impl RequirementEvaluator {
    /// 评估单个等级
    ///
    /// 阈值非正数属于目录缺陷，返回 `Configuration` 错误；
    /// 快照中的负数按 0 处理，不会向外传播。
    pub fn evaluate(tier: &Arc<BadgeTier>, snapshot: &ActivitySnapshot) -> Result<EvaluatedTier> {
        let count = tier.requirement.count();
        if count <= 0 {
            return Err(EngineError::configuration(format!(
                "徽章 {} 的阈值无效: {count}",
                tier.id
            )));
        }

        let (earned, progress_ratio, current, target) = match &tier.requirement {
            Requirement::Special { .. } => {
                let earned = snapshot.special_grants.contains(&tier.id);
                let ratio = if earned { 1.0 } else { 0.0 };
                (earned, ratio, i64::from(earned), 1)
            }
            requirement => {
                let current = Self::current_value(tier, requirement, snapshot);
                let (earned, ratio) = Self::threshold(current, count);
                (earned, ratio, current, count)
            }
        };

        let earned_at = if earned {
            snapshot.earned_at.get(&tier.id).copied()
        } else {
            None
        };

        metrics::record_tier_evaluation(tier.requirement.kind(), earned);

        Ok(EvaluatedTier {
            tier: Arc::clone(tier),
            earned,
            earned_at,
            progress_ratio,
            current,
            target,
        })
    }

    /// 按目录顺序评估全部等级
    pub fn evaluate_catalog(
        catalog: &CatalogStore,
        snapshot: &ActivitySnapshot,
    ) -> Result<Vec<EvaluatedTier>> {
        catalog
            .all_tiers()
            .iter()
            .map(|tier| Self::evaluate(tier, snapshot))
            .collect()
    }

    /// 读取条件对应的快照计数，负数截断为 0
    fn current_value(tier: &BadgeTier, requirement: &Requirement, snapshot: &ActivitySnapshot) -> i64 {
        let (field, raw) = match requirement {
            Requirement::TaskCount { .. } => ("total_tasks", snapshot.total_tasks),
            Requirement::CategoryCount { category, .. } => {
                ("category_counts", snapshot.category_count(category))
            }
            Requirement::StreakDays { .. } => ("streak_days", snapshot.streak_days),
            Requirement::EmergencyCount { .. } => ("emergency_count", snapshot.emergency_count),
            Requirement::Special { .. } => ("special_grants", 0),
        };

        if raw < 0 {
            debug!(tier_id = %tier.id, field, value = raw, "快照计数为负数，按 0 处理");
            0
        } else {
            raw
        }
    }

    /// 阈值判断：current >= count 即获得，比例封顶为 1
    fn threshold(current: i64, count: i64) -> (bool, f64) {
        if current >= count {
            (true, 1.0)
        } else {
            let ratio = (current as f64 / count as f64).clamp(0.0, MAX_UNEARNED_RATIO);
            (false, ratio)
        }
    }
}
