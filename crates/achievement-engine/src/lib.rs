//! 成就徽章进度引擎
//!
//! 把用户活动快照转换为可展示的徽章列表：
//! - 只读的多等级徽章目录（按系列分组）
//! - 需求评估与进度计算
//! - 系列归并，每个系列只展示一个代表徽章
//! - 分类、等级、状态筛选与排序
//! - 汇总统计

pub mod catalog;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod query;
pub mod resolver;
pub mod snapshot;
pub mod stats;

pub use catalog::{BadgeFamily, CatalogDocument, CatalogStore};
pub use engine::AchievementEngine;
pub use error::{EngineError, ProviderError, Result};
pub use evaluator::RequirementEvaluator;
pub use models::{
    ActivitySnapshot, BadgeCategory, BadgeLevel, BadgeTier, EarnedBadgeRecord, EvaluatedTier,
    NextGoal, Requirement, ResolvedBadge,
};
pub use query::{
    BadgeQuery, CategoryCounts, CategoryFilter, LevelCounts, LevelFilter, QueryEngine,
    QueryResult, Rankable, SortMode, StatusFilter,
};
pub use resolver::ProgressionResolver;
pub use snapshot::{FileSnapshotProvider, InMemorySnapshotProvider, SnapshotProvider};
pub use stats::{BadgeSummary, StatisticsAggregator};
