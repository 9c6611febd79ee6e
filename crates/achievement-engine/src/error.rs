//! 徽章进度引擎错误类型

use thiserror::Error;

/// 引擎错误
///
/// 「未获得」是正常的评估结果而不是错误，这里只包含部署缺陷和外部数据缺失两类。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// 徽章目录数据非法（重复 ID、等级不递增、阈值非正数等），加载时即失败
    #[error("徽章目录配置错误: {0}")]
    Configuration(String),

    #[error("活动快照不可用: user_id={user_id}, {reason}")]
    SnapshotUnavailable { user_id: String, reason: String },
}

impl EngineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::SnapshotUnavailable { .. } => "SNAPSHOT_UNAVAILABLE",
        }
    }

    /// 是否为不可恢复的部署缺陷
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// 活动快照提供方错误
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("存储访问失败: {0}")]
    Storage(String),

    #[error("网络请求失败: {0}")]
    Network(String),

    #[error("快照数据无效: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
