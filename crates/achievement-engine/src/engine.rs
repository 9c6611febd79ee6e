//! 徽章进度引擎
//!
//! 组合目录、评估器、归并器、查询和统计，对展示层暴露统一入口。
//! 引擎不持有跨调用状态，克隆后可在任意线程并发使用。

use std::sync::Arc;

use badge_shared::observability::metrics;
use tracing::{info, instrument, warn};

use crate::catalog::CatalogStore;
use crate::error::{EngineError, Result};
use crate::evaluator::RequirementEvaluator;
use crate::models::{ActivitySnapshot, EarnedBadgeRecord, EvaluatedTier, ResolvedBadge};
use crate::query::{BadgeQuery, QueryEngine, QueryResult};
use crate::resolver::ProgressionResolver;
use crate::snapshot::SnapshotProvider;
use crate::stats::{BadgeSummary, StatisticsAggregator};

/// 徽章进度引擎
#[derive(Debug, Clone)]
pub struct AchievementEngine {
    catalog: Arc<CatalogStore>,
}

impl AchievementEngine {
    pub fn new(catalog: Arc<CatalogStore>) -> Self {
        Self { catalog }
    }

    /// 使用进程级内置目录
    pub fn with_builtin_catalog() -> Result<Self> {
        CatalogStore::builtin().map(Self::new)
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    /// 按目录顺序评估全部等级
    pub fn evaluate_all(&self, snapshot: &ActivitySnapshot) -> Result<Vec<EvaluatedTier>> {
        RequirementEvaluator::evaluate_catalog(&self.catalog, snapshot)
    }

    /// 每个系列一个代表徽章
    pub fn resolve(&self, snapshot: &ActivitySnapshot) -> Result<Vec<ResolvedBadge>> {
        ProgressionResolver::resolve(&self.catalog, snapshot)
    }

    /// 从已持久化的获得记录归并
    pub fn resolve_from_records(&self, records: &[EarnedBadgeRecord]) -> Vec<ResolvedBadge> {
        ProgressionResolver::collapse_records(&self.catalog, records)
    }

    /// 筛选、排序并返回分类计数
    pub fn query(&self, resolved: &[ResolvedBadge], query: &BadgeQuery) -> QueryResult<ResolvedBadge> {
        QueryEngine::query(resolved, query)
    }

    /// 汇总统计，总数取目录中的系列数
    pub fn summarize(&self, resolved: &[ResolvedBadge]) -> BadgeSummary {
        StatisticsAggregator::summarize_against(resolved, self.catalog.family_count())
    }

    /// 获取用户快照
    ///
    /// 提供方报错或没有数据时返回 `SnapshotUnavailable`，不做重试。
    #[instrument(skip(self, provider))]
    pub async fn fetch_snapshot<P>(&self, provider: &P, user_id: &str) -> Result<ActivitySnapshot>
    where
        P: SnapshotProvider + ?Sized,
    {
        match provider.fetch_snapshot(user_id).await {
            Ok(Some(snapshot)) => {
                metrics::record_snapshot_fetch("ok");
                Ok(snapshot)
            }
            Ok(None) => {
                metrics::record_snapshot_fetch("missing");
                info!(user_id, "用户没有活动快照");
                Err(EngineError::SnapshotUnavailable {
                    user_id: user_id.to_string(),
                    reason: "没有可用的活动快照".to_string(),
                })
            }
            Err(e) => {
                metrics::record_snapshot_fetch("error");
                warn!(user_id, error = %e, "活动快照获取失败");
                Err(EngineError::SnapshotUnavailable {
                    user_id: user_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// 获取快照并归并
    pub async fn resolve_for_user<P>(&self, provider: &P, user_id: &str) -> Result<Vec<ResolvedBadge>>
    where
        P: SnapshotProvider + ?Sized,
    {
        let snapshot = self.fetch_snapshot(provider, user_id).await?;
        self.resolve(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::BadgeCategory;
    use crate::query::{CategoryFilter, SortMode};
    use crate::snapshot::MockSnapshotProvider;
    use mockall::predicate::eq;

    fn engine() -> AchievementEngine {
        AchievementEngine::with_builtin_catalog().unwrap()
    }

    #[test]
    fn test_resolve_one_per_family() {
        let engine = engine();
        let snapshot = ActivitySnapshot::new()
            .with_total_tasks(120)
            .with_streak_days(9);

        let resolved = engine.resolve(&snapshot).unwrap();

        assert_eq!(resolved.len(), engine.catalog().family_count());
        let tasks = resolved.iter().find(|b| b.family_id() == "tasks").unwrap();
        assert_eq!(tasks.id(), "tasks_100");
        let streak = resolved.iter().find(|b| b.family_id() == "streak").unwrap();
        assert_eq!(streak.id(), "streak_7");
    }

    #[test]
    fn test_query_and_summarize() {
        let engine = engine();
        let snapshot = ActivitySnapshot::new()
            .with_category_count("FEEDING", 7)
            .with_category_count("WALKING", 10);
        let resolved = engine.resolve(&snapshot).unwrap();

        let result = engine.query(
            &resolved,
            &BadgeQuery::new()
                .category(BadgeCategory::CategorySpecific)
                .sort(SortMode::Progress),
        );

        let ids: Vec<&str> = result.badges.iter().map(|b| b.id()).collect();
        assert_eq!(ids, vec!["walking_10", "feeding_10", "grooming_10"]);
        assert_eq!(result.counts.get(CategoryFilter::All), resolved.len());
        assert_eq!(
            result
                .counts
                .get(CategoryFilter::Only(BadgeCategory::CategorySpecific)),
            result.badges.len()
        );

        let summary = engine.summarize(&resolved);
        assert_eq!(summary.earned, 1);
        assert_eq!(summary.total, engine.catalog().family_count());
    }

    #[tokio::test]
    async fn test_resolve_for_user() {
        let mut provider = MockSnapshotProvider::new();
        provider
            .expect_fetch_snapshot()
            .with(eq("user-001"))
            .times(1)
            .returning(|_| Ok(Some(ActivitySnapshot::new().with_total_tasks(10))));

        let resolved = engine().resolve_for_user(&provider, "user-001").await.unwrap();

        assert!(resolved.iter().any(|b| b.id() == "tasks_10" && b.earned()));
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_unavailable() {
        let mut provider = MockSnapshotProvider::new();
        provider.expect_fetch_snapshot().returning(|_| Ok(None));

        let err = engine()
            .resolve_for_user(&provider, "user-404")
            .await
            .unwrap_err();

        assert_eq!(err.code(), "SNAPSHOT_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_provider_failure_is_unavailable_without_retry() {
        let mut provider = MockSnapshotProvider::new();
        provider
            .expect_fetch_snapshot()
            .times(1)
            .returning(|_| Err(ProviderError::Network("connection reset".to_string())));

        let err = engine()
            .resolve_for_user(&provider, "user-001")
            .await
            .unwrap_err();

        match err {
            EngineError::SnapshotUnavailable { user_id, reason } => {
                assert_eq!(user_id, "user-001");
                assert!(reason.contains("connection reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dyn_provider() {
        let provider = crate::snapshot::InMemorySnapshotProvider::new();
        provider.insert("user-001", ActivitySnapshot::new().with_streak_days(3));
        let provider: Arc<dyn SnapshotProvider> = Arc::new(provider);

        let resolved = engine()
            .resolve_for_user(provider.as_ref(), "user-001")
            .await
            .unwrap();

        assert!(resolved.iter().any(|b| b.id() == "streak_3" && b.earned()));
    }
}
