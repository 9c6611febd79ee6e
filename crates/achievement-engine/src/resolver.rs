//! 系列进度归并
//!
//! 把一个系列的所有等级归并为单个代表徽章：有已获得等级时取最高的那一个，
//! 否则取最低等级作为「下一个目标」。获得黄金的用户只看到一枚黄金徽章，
//! 而不是青铜、白银、黄金三枚。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use badge_shared::observability::metrics;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::catalog::{BadgeFamily, CatalogStore};
use crate::error::Result;
use crate::evaluator::RequirementEvaluator;
use crate::models::{
    ActivitySnapshot, BadgeTier, EarnedBadgeRecord, EvaluatedTier, NextGoal, ResolvedBadge,
};

/// 系列归并器
pub struct ProgressionResolver;

impl ProgressionResolver {
    /// 基于活动快照重新评估并归并
    ///
    /// 输出按系列在目录中的首次出现顺序排列，每个系列恰好一项。
    #[instrument(skip_all, fields(families = catalog.family_count()))]
    pub fn resolve(catalog: &CatalogStore, snapshot: &ActivitySnapshot) -> Result<Vec<ResolvedBadge>> {
        let started = Instant::now();
        let mut resolved = Vec::with_capacity(catalog.family_count());

        for family in catalog.families() {
            let evaluated = family
                .tiers()
                .iter()
                .map(|tier| RequirementEvaluator::evaluate(tier, snapshot))
                .collect::<Result<Vec<_>>>()?;
            resolved.extend(Self::pick(family, evaluated));
        }

        metrics::record_resolution(
            "evaluation",
            resolved.len(),
            started.elapsed().as_secs_f64(),
        );
        debug!(
            earned = resolved.iter().filter(|b| b.earned()).count(),
            total = resolved.len(),
            "系列归并完成"
        );

        Ok(resolved)
    }

    /// 基于已持久化的获得记录归并
    ///
    /// 与 `resolve` 使用同一套「保留最高等级」规则，因此对同一批已获得等级
    /// 得到相同的代表徽章。没有计数信息，未获得等级的进度记为 0。
    /// 未知的徽章 ID 记录警告后忽略。
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn collapse_records(catalog: &CatalogStore, records: &[EarnedBadgeRecord]) -> Vec<ResolvedBadge> {
        let started = Instant::now();
        let mut earned: HashMap<&str, Option<DateTime<Utc>>> = HashMap::new();

        for record in records {
            if !catalog.contains(&record.badge_id) {
                warn!(badge_id = %record.badge_id, "忽略未知的徽章获得记录");
                continue;
            }
            // 重复记录保留最早的获得时间
            let slot = earned.entry(record.badge_id.as_str()).or_insert(None);
            *slot = match (*slot, record.earned_at) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }

        let resolved: Vec<ResolvedBadge> = catalog
            .families()
            .iter()
            .filter_map(|family| {
                let evaluated = family
                    .tiers()
                    .iter()
                    .map(|tier| Self::from_record(tier, earned.get(tier.id.as_str())))
                    .collect();
                Self::pick(family, evaluated)
            })
            .collect();

        metrics::record_resolution("records", resolved.len(), started.elapsed().as_secs_f64());

        resolved
    }

    /// 对已经评估好的等级列表按系列归并
    ///
    /// 输入可以是 `evaluate_all` 的结果，顺序任意；同一系列中缺失的等级不参与归并。
    pub fn collapse_evaluated(catalog: &CatalogStore, evaluated: &[EvaluatedTier]) -> Vec<ResolvedBadge> {
        let mut by_id: HashMap<&str, &EvaluatedTier> = HashMap::with_capacity(evaluated.len());
        for tier in evaluated {
            by_id.insert(tier.id(), tier);
        }

        catalog
            .families()
            .iter()
            .filter_map(|family| {
                let tiers: Vec<EvaluatedTier> = family
                    .tiers()
                    .iter()
                    .filter_map(|t| by_id.get(t.id.as_str()).map(|&e| e.clone()))
                    .collect();
                Self::pick(family, tiers)
            })
            .collect()
    }

    /// 在按等级升序的评估结果中选出代表徽章
    fn pick(family: &BadgeFamily, evaluated: Vec<EvaluatedTier>) -> Option<ResolvedBadge> {
        let total_tiers = evaluated.len();
        let earned_tiers = evaluated.iter().filter(|e| e.earned).count();

        let (index, next_goal) = match evaluated.iter().rposition(|e| e.earned) {
            Some(highest) => (highest, evaluated.get(highest + 1).map(NextGoal::from)),
            None => (0, None),
        };

        let representative = evaluated.into_iter().nth(index)?;
        debug_assert_eq!(representative.family_id(), family.id());

        Some(ResolvedBadge {
            representative,
            earned_tiers,
            total_tiers,
            next_goal,
        })
    }

    fn from_record(tier: &Arc<BadgeTier>, record: Option<&Option<DateTime<Utc>>>) -> EvaluatedTier {
        let target = tier.requirement.threshold();
        match record {
            Some(earned_at) => EvaluatedTier {
                tier: Arc::clone(tier),
                earned: true,
                earned_at: *earned_at,
                progress_ratio: 1.0,
                current: target,
                target,
            },
            None => EvaluatedTier {
                tier: Arc::clone(tier),
                earned: false,
                earned_at: None,
                progress_ratio: 0.0,
                current: 0,
                target,
            },
        }
    }
}

/// 已获得等级的 ID 集合，便于与记录列表互相对照
pub fn earned_ids(evaluated: &[EvaluatedTier]) -> HashSet<&str> {
    evaluated
        .iter()
        .filter(|e| e.earned)
        .map(|e| e.id())
        .collect()
}
