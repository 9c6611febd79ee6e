//! 活动快照提供方
//!
//! 引擎只消费快照，不负责存储或拉取。获取失败或没有数据时由调用方决定
//! 重试还是展示加载状态，引擎本身不做重试。

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::error::ProviderError;
use crate::models::ActivitySnapshot;

/// 活动快照提供方接口
///
/// 返回 `Ok(None)` 表示该用户没有可用快照。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn fetch_snapshot(&self, user_id: &str) -> Result<Option<ActivitySnapshot>, ProviderError>;
}

/// 内存快照提供方
#[derive(Clone, Default)]
pub struct InMemorySnapshotProvider {
    snapshots: Arc<DashMap<String, ActivitySnapshot>>,
}

impl InMemorySnapshotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入或替换用户快照
    pub fn insert(&self, user_id: impl Into<String>, snapshot: ActivitySnapshot) {
        self.snapshots.insert(user_id.into(), snapshot);
    }

    pub fn remove(&self, user_id: &str) -> Option<ActivitySnapshot> {
        self.snapshots.remove(user_id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[async_trait]
impl SnapshotProvider for InMemorySnapshotProvider {
    async fn fetch_snapshot(&self, user_id: &str) -> Result<Option<ActivitySnapshot>, ProviderError> {
        Ok(self.snapshots.get(user_id).map(|s| s.value().clone()))
    }
}

/// 文件快照提供方
///
/// 从目录中读取 `{user_id}.json`，文件不存在视为没有快照。
#[derive(Debug, Clone)]
pub struct FileSnapshotProvider {
    dir: PathBuf,
}

impl FileSnapshotProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf, ProviderError> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ProviderError::InvalidData(format!("无效的用户 ID: {user_id}")));
        }
        Ok(self.dir.join(format!("{user_id}.json")))
    }
}

#[async_trait]
impl SnapshotProvider for FileSnapshotProvider {
    async fn fetch_snapshot(&self, user_id: &str) -> Result<Option<ActivitySnapshot>, ProviderError> {
        let path = self.path_for(user_id)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(user_id, path = %path.display(), "快照文件不存在");
                return Ok(None);
            }
            Err(e) => {
                return Err(ProviderError::Storage(format!(
                    "读取 {} 失败: {e}",
                    path.display()
                )));
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ProviderError::InvalidData(format!("{}: {e}", path.display())))
    }
}
