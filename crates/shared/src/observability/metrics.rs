//! 指标定义模块
//!
//! 基于 metrics crate 记录引擎指标。这里只负责指标命名和描述，
//! recorder（如 Prometheus 导出器）由宿主程序安装，未安装时记录为空操作。

/// 指标名称
pub mod names {
    pub const TIER_EVALUATIONS_TOTAL: &str = "achievement_tier_evaluations_total";
    pub const RESOLUTIONS_TOTAL: &str = "achievement_resolutions_total";
    pub const RESOLUTION_DURATION_SECONDS: &str = "achievement_resolution_duration_seconds";
    pub const SNAPSHOT_FETCHES_TOTAL: &str = "achievement_snapshot_fetches_total";
    pub const CATALOG_TIERS: &str = "achievement_catalog_tiers";
}

/// 注册指标描述
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::TIER_EVALUATIONS_TOTAL,
        "Total number of badge tier evaluations"
    );
    metrics::describe_counter!(
        names::RESOLUTIONS_TOTAL,
        "Total number of family resolutions"
    );
    metrics::describe_histogram!(
        names::RESOLUTION_DURATION_SECONDS,
        "Family resolution duration in seconds"
    );
    metrics::describe_counter!(
        names::SNAPSHOT_FETCHES_TOTAL,
        "Total number of activity snapshot fetches"
    );
    metrics::describe_gauge!(names::CATALOG_TIERS, "Number of tiers in the loaded catalog");
}

/// 记录单个徽章等级评估
#[inline]
pub fn record_tier_evaluation(requirement: &'static str, earned: bool) {
    metrics::counter!(
        names::TIER_EVALUATIONS_TOTAL,
        "requirement" => requirement,
        "earned" => if earned { "true" } else { "false" }
    )
    .increment(1);
}

/// 记录一次系列归并
#[inline]
pub fn record_resolution(source: &'static str, families: usize, duration_secs: f64) {
    metrics::counter!(names::RESOLUTIONS_TOTAL, "source" => source).increment(1);
    metrics::histogram!(
        names::RESOLUTION_DURATION_SECONDS,
        "source" => source,
        "families" => families.to_string()
    )
    .record(duration_secs);
}

/// 记录活动快照获取结果
#[inline]
pub fn record_snapshot_fetch(status: &'static str) {
    metrics::counter!(names::SNAPSHOT_FETCHES_TOTAL, "status" => status).increment(1);
}

/// 记录目录规模
#[inline]
pub fn set_catalog_tiers(count: usize) {
    metrics::gauge!(names::CATALOG_TIERS).set(count as f64);
}
