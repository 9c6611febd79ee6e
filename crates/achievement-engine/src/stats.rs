//! 徽章统计
//!
//! 从归并结果派生汇总计数。

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::models::{BadgeCategory, EvaluatedTier, ResolvedBadge};

/// 汇总统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BadgeSummary {
    pub earned: usize,
    pub total: usize,
    /// 四舍五入的百分比，总数为 0 时为 0
    pub percentage: u32,
}

impl BadgeSummary {
    pub fn from_counts(earned: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            let ratio = earned.min(total) as f64 / total as f64;
            (ratio * 100.0).round() as u32
        };

        Self {
            earned,
            total,
            percentage,
        }
    }
}

/// 统计聚合器
pub struct StatisticsAggregator;

impl StatisticsAggregator {
    /// 汇总已获得系列数、系列总数和完成百分比
    ///
    /// 系列按 family_id 去重，重复传入同一系列不会放大计数。
    pub fn summarize(resolved: &[ResolvedBadge]) -> BadgeSummary {
        let families: HashSet<&str> = resolved.iter().map(|b| b.family_id()).collect();
        let earned: HashSet<&str> = resolved
            .iter()
            .filter(|b| b.earned())
            .map(|b| b.family_id())
            .collect();

        BadgeSummary::from_counts(earned.len(), families.len())
    }

    /// 以给定的系列总数汇总（通常为目录中的系列数）
    pub fn summarize_against(resolved: &[ResolvedBadge], total_families: usize) -> BadgeSummary {
        let earned: HashSet<&str> = resolved
            .iter()
            .filter(|b| b.earned())
            .map(|b| b.family_id())
            .collect();

        BadgeSummary::from_counts(earned.len().min(total_families), total_families)
    }

    /// 按分类汇总，包含没有徽章的分类
    pub fn summarize_by_category(resolved: &[ResolvedBadge]) -> BTreeMap<BadgeCategory, BadgeSummary> {
        BadgeCategory::ALL
            .into_iter()
            .map(|category| {
                let scoped: Vec<ResolvedBadge> = resolved
                    .iter()
                    .filter(|b| b.category() == category)
                    .cloned()
                    .collect();
                (category, Self::summarize(&scoped))
            })
            .collect()
    }

    /// 全部已获得等级的经验值总和
    pub fn earned_xp(evaluated: &[EvaluatedTier]) -> u64 {
        evaluated
            .iter()
            .filter(|e| e.earned)
            .map(|e| u64::from(e.tier.xp_reward))
            .sum()
    }
}
