//! 徽章查询
//!
//! 对归并结果（或全部等级视图）做无状态的筛选、排序和计数。
//! 所有排序都是稳定排序，相同键值保持输入顺序（引擎输出即目录顺序）。

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{BadgeCategory, BadgeLevel, EvaluatedTier, ResolvedBadge};

/// 可参与查询的条目
pub trait Rankable {
    fn category(&self) -> BadgeCategory;
    fn level(&self) -> BadgeLevel;
    fn earned(&self) -> bool;
    fn earned_at(&self) -> Option<DateTime<Utc>>;
    fn progress_ratio(&self) -> f64;
}

impl Rankable for EvaluatedTier {
    fn category(&self) -> BadgeCategory {
        self.tier.category
    }

    fn level(&self) -> BadgeLevel {
        self.tier.level
    }

    fn earned(&self) -> bool {
        self.earned
    }

    fn earned_at(&self) -> Option<DateTime<Utc>> {
        self.earned_at
    }

    fn progress_ratio(&self) -> f64 {
        self.progress_ratio
    }
}

impl Rankable for ResolvedBadge {
    fn category(&self) -> BadgeCategory {
        self.representative.category()
    }

    fn level(&self) -> BadgeLevel {
        self.representative.level()
    }

    fn earned(&self) -> bool {
        self.representative.earned
    }

    fn earned_at(&self) -> Option<DateTime<Utc>> {
        self.representative.earned_at
    }

    fn progress_ratio(&self) -> f64 {
        self.representative.progress_ratio
    }
}

/// 分类筛选
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFilter {
    #[default]
    All,
    Only(BadgeCategory),
}

impl CategoryFilter {
    pub fn matches(self, category: BadgeCategory) -> bool {
        match self {
            Self::All => true,
            Self::Only(c) => c == category,
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

/// 等级筛选
///
/// 数值和符号表示解析为同一个等级，如 "3" 与 "GOLD"。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelFilter {
    #[default]
    All,
    Only(BadgeLevel),
}

impl LevelFilter {
    pub fn matches(self, level: BadgeLevel) -> bool {
        match self {
            Self::All => true,
            Self::Only(l) => l == level,
        }
    }
}

impl FromStr for LevelFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

/// 获得状态筛选
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Earned,
    Unearned,
}

impl StatusFilter {
    pub fn matches(self, earned: bool) -> bool {
        match self {
            Self::All => true,
            Self::Earned => earned,
            Self::Unearned => !earned,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "earned" => Ok(Self::Earned),
            "unearned" | "locked" => Ok(Self::Unearned),
            other => Err(format!("无效的状态筛选: {other}")),
        }
    }
}

/// 排序方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// 保持输入顺序
    #[default]
    Catalog,
    /// 按获得时间倒序，无时间的排最后
    Recent,
    /// 按完成比例倒序
    Progress,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "catalog" | "default" => Ok(Self::Catalog),
            "recent" => Ok(Self::Recent),
            "progress" => Ok(Self::Progress),
            other => Err(format!("无效的排序方式: {other}")),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Catalog => "catalog",
            Self::Recent => "recent",
            Self::Progress => "progress",
        };
        f.write_str(s)
    }
}

/// 查询条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeQuery {
    pub category: CategoryFilter,
    pub level: LevelFilter,
    pub status: StatusFilter,
    pub sort: SortMode,
}

impl BadgeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: BadgeCategory) -> Self {
        self.category = CategoryFilter::Only(category);
        self
    }

    pub fn level(mut self, level: BadgeLevel) -> Self {
        self.level = LevelFilter::Only(level);
        self
    }

    pub fn status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }
}

/// 分类计数
///
/// `all` 与每个分类的计数都在「除分类外的其他筛选条件」下计算，
/// 因此 `get(f)` 总是等于以分类 `f` 查询得到的条目数。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub all: usize,
    pub by_category: BTreeMap<BadgeCategory, usize>,
}

impl CategoryCounts {
    pub fn get(&self, filter: CategoryFilter) -> usize {
        match filter {
            CategoryFilter::All => self.all,
            CategoryFilter::Only(c) => self.by_category.get(&c).copied().unwrap_or(0),
        }
    }
}

/// 等级计数，语义同 `CategoryCounts`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub all: usize,
    pub by_level: BTreeMap<BadgeLevel, usize>,
}

impl LevelCounts {
    pub fn get(&self, filter: LevelFilter) -> usize {
        match filter {
            LevelFilter::All => self.all,
            LevelFilter::Only(l) => self.by_level.get(&l).copied().unwrap_or(0),
        }
    }
}

/// 查询结果
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult<T> {
    pub badges: Vec<T>,
    pub counts: CategoryCounts,
    pub level_counts: LevelCounts,
}

/// 查询引擎
pub struct QueryEngine;

impl QueryEngine {
    /// 筛选、排序并计数
    pub fn query<T: Rankable + Clone>(items: &[T], query: &BadgeQuery) -> QueryResult<T> {
        let mut badges: Vec<T> = items
            .iter()
            .filter(|item| Self::matches(*item, query))
            .cloned()
            .collect();
        Self::sort(&mut badges, query.sort);

        QueryResult {
            badges,
            counts: Self::category_counts(items, query),
            level_counts: Self::level_counts(items, query),
        }
    }

    /// 条目是否满足全部筛选条件
    pub fn matches<T: Rankable>(item: &T, query: &BadgeQuery) -> bool {
        query.category.matches(item.category())
            && query.level.matches(item.level())
            && query.status.matches(item.earned())
    }

    /// 稳定排序
    pub fn sort<T: Rankable>(items: &mut [T], mode: SortMode) {
        match mode {
            SortMode::Catalog => {}
            SortMode::Recent => items.sort_by(|a, b| Self::recent_order(a.earned_at(), b.earned_at())),
            SortMode::Progress => {
                items.sort_by(|a, b| b.progress_ratio().total_cmp(&a.progress_ratio()))
            }
        }
    }

    /// 分类计数（忽略查询中的分类条件）
    pub fn category_counts<T: Rankable>(items: &[T], query: &BadgeQuery) -> CategoryCounts {
        let mut counts = CategoryCounts {
            all: 0,
            by_category: BadgeCategory::ALL.into_iter().map(|c| (c, 0)).collect(),
        };

        for item in items
            .iter()
            .filter(|i| query.level.matches(i.level()) && query.status.matches(i.earned()))
        {
            counts.all += 1;
            *counts.by_category.entry(item.category()).or_insert(0) += 1;
        }

        counts
    }

    /// 等级计数（忽略查询中的等级条件）
    pub fn level_counts<T: Rankable>(items: &[T], query: &BadgeQuery) -> LevelCounts {
        let mut counts = LevelCounts {
            all: 0,
            by_level: BadgeLevel::ALL.into_iter().map(|l| (l, 0)).collect(),
        };

        for item in items
            .iter()
            .filter(|i| query.category.matches(i.category()) && query.status.matches(i.earned()))
        {
            counts.all += 1;
            *counts.by_level.entry(item.level()).or_insert(0) += 1;
        }

        counts
    }

    fn recent_order(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BadgeTier, Requirement};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn item(
        id: &str,
        category: BadgeCategory,
        level: BadgeLevel,
        ratio: f64,
        earned_at: Option<DateTime<Utc>>,
    ) -> EvaluatedTier {
        EvaluatedTier {
            tier: Arc::new(BadgeTier::new(
                id,
                "",
                id,
                level,
                category,
                Requirement::TaskCount { count: 10 },
            )),
            earned: ratio >= 1.0,
            earned_at,
            progress_ratio: ratio,
            current: (ratio * 10.0) as i64,
            target: 10,
        }
    }

    fn ids(items: &[EvaluatedTier]) -> Vec<&str> {
        items.iter().map(|i| i.id()).collect()
    }

    fn sample() -> Vec<EvaluatedTier> {
        let t = |d| Some(Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap());
        vec![
            item("a_1", BadgeCategory::Streak, BadgeLevel::Bronze, 0.5, None),
            item("b_1", BadgeCategory::Streak, BadgeLevel::Gold, 1.0, t(3)),
            item("c_1", BadgeCategory::Emergency, BadgeLevel::Gold, 0.5, None),
            item("d_1", BadgeCategory::General, BadgeLevel::Silver, 1.0, None),
            item("e_1", BadgeCategory::General, BadgeLevel::Gold, 1.0, t(9)),
        ]
    }

    #[test]
    fn test_filter_by_category() {
        let items = sample();
        let result = QueryEngine::query(&items, &BadgeQuery::new().category(BadgeCategory::Streak));
        assert_eq!(ids(&result.badges), vec!["a_1", "b_1"]);

        let all = QueryEngine::query(&items, &BadgeQuery::new());
        assert_eq!(all.badges.len(), items.len());
    }

    #[test]
    fn test_filter_by_level_symbolic_or_numeric() {
        let items = sample();
        let symbolic = BadgeQuery {
            level: "GOLD".parse().unwrap(),
            ..Default::default()
        };
        let numeric = BadgeQuery {
            level: "3".parse().unwrap(),
            ..Default::default()
        };

        assert_eq!(symbolic, numeric);
        let result = QueryEngine::query(&items, &numeric);
        assert_eq!(ids(&result.badges), vec!["b_1", "c_1", "e_1"]);
    }

    #[test]
    fn test_filter_by_status() {
        let items = sample();
        let earned = QueryEngine::query(&items, &BadgeQuery::new().status(StatusFilter::Earned));
        assert_eq!(ids(&earned.badges), vec!["b_1", "d_1", "e_1"]);

        let unearned =
            QueryEngine::query(&items, &BadgeQuery::new().status(StatusFilter::Unearned));
        assert_eq!(ids(&unearned.badges), vec!["a_1", "c_1"]);
    }

    #[test]
    fn test_sort_recent_missing_last_and_stable() {
        let items = sample();
        let result = QueryEngine::query(&items, &BadgeQuery::new().sort(SortMode::Recent));
        assert_eq!(ids(&result.badges), vec!["e_1", "b_1", "a_1", "c_1", "d_1"]);
    }

    #[test]
    fn test_sort_progress_stable_ties() {
        let items = sample();
        let result = QueryEngine::query(&items, &BadgeQuery::new().sort(SortMode::Progress));
        assert_eq!(ids(&result.badges), vec!["b_1", "d_1", "e_1", "a_1", "c_1"]);
    }

    #[test]
    fn test_counts_match_filtered_results() {
        let items = sample();
        for status in [StatusFilter::All, StatusFilter::Earned, StatusFilter::Unearned] {
            for level in std::iter::once(LevelFilter::All)
                .chain(BadgeLevel::ALL.into_iter().map(LevelFilter::Only))
            {
                let base = BadgeQuery {
                    level,
                    status,
                    ..Default::default()
                };
                let counts = QueryEngine::query(&items, &base).counts;

                for category in std::iter::once(CategoryFilter::All)
                    .chain(BadgeCategory::ALL.into_iter().map(CategoryFilter::Only))
                {
                    let scoped = BadgeQuery { category, ..base };
                    let result = QueryEngine::query(&items, &scoped);
                    assert_eq!(counts.get(category), result.badges.len());
                    assert_eq!(result.counts, counts);
                }
            }
        }
    }

    #[test]
    fn test_level_counts() {
        let items = sample();
        let result = QueryEngine::query(&items, &BadgeQuery::new().category(BadgeCategory::General));
        assert_eq!(result.level_counts.all, 2);
        assert_eq!(result.level_counts.get(LevelFilter::Only(BadgeLevel::Gold)), 1);
        assert_eq!(result.level_counts.get(LevelFilter::Only(BadgeLevel::Silver)), 1);
        assert_eq!(result.level_counts.get(LevelFilter::Only(BadgeLevel::Diamond)), 0);
    }

    #[test]
    fn test_empty_input() {
        let items: Vec<EvaluatedTier> = Vec::new();
        let result = QueryEngine::query(&items, &BadgeQuery::new().sort(SortMode::Progress));
        assert!(result.badges.is_empty());
        assert_eq!(result.counts.all, 0);
        assert_eq!(result.counts.by_category.len(), BadgeCategory::ALL.len());
    }

    #[test]
    fn test_parse_filters() {
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "STREAK".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(BadgeCategory::Streak)
        );
        assert!("nope".parse::<CategoryFilter>().is_err());
        assert_eq!("ALL".parse::<LevelFilter>().unwrap(), LevelFilter::All);
        assert_eq!("locked".parse::<StatusFilter>().unwrap(), StatusFilter::Unearned);
        assert_eq!("Progress".parse::<SortMode>().unwrap(), SortMode::Progress);
        assert!("newest".parse::<SortMode>().is_err());
        assert_eq!(SortMode::Recent.to_string(), "recent");
    }
}
