//! 徽章目录存储
//!
//! 目录在进程启动时加载一次，加载时完成全部校验，之后只读。
//! 任何校验失败都是部署缺陷，直接返回 `EngineError::Configuration`，不做降级。

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use badge_shared::observability::metrics;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{EngineError, Result};
use crate::models::BadgeTier;

/// 内置目录（随二进制分发）
const BUILTIN_CATALOG_JSON: &str = include_str!("../catalog/default_catalog.json");

static BUILTIN_CATALOG: LazyLock<Result<Arc<CatalogStore>>> =
    LazyLock::new(|| CatalogStore::from_json(BUILTIN_CATALOG_JSON).map(Arc::new));

/// 目录文件格式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub version: String,
    pub tiers: Vec<BadgeTier>,
}

/// 徽章系列
///
/// 同一成就主题的所有等级，按等级升序排列。
#[derive(Debug, Clone)]
pub struct BadgeFamily {
    id: String,
    tiers: Vec<Arc<BadgeTier>>,
}

impl BadgeFamily {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 按等级升序的等级列表，至少一项
    pub fn tiers(&self) -> &[Arc<BadgeTier>] {
        &self.tiers
    }

    pub fn lowest(&self) -> Option<&Arc<BadgeTier>> {
        self.tiers.first()
    }

    pub fn highest(&self) -> Option<&Arc<BadgeTier>> {
        self.tiers.last()
    }
}

/// 徽章目录
///
/// 构造后没有任何修改接口，可在线程间自由共享。
#[derive(Debug)]
pub struct CatalogStore {
    version: String,
    /// 目录原始顺序
    tiers: Vec<Arc<BadgeTier>>,
    by_id: HashMap<String, Arc<BadgeTier>>,
    /// 按首次出现顺序排列的系列
    families: Vec<BadgeFamily>,
    family_index: HashMap<String, usize>,
}

impl CatalogStore {
    /// 从等级定义构造目录并校验
    #[instrument(skip_all, fields(tier_count = tiers.len()))]
    pub fn new(version: impl Into<String>, tiers: Vec<BadgeTier>) -> Result<Self> {
        let version = version.into();
        let mut ordered = Vec::with_capacity(tiers.len());
        let mut by_id = HashMap::with_capacity(tiers.len());
        let mut families: Vec<BadgeFamily> = Vec::new();
        let mut family_index: HashMap<String, usize> = HashMap::new();

        for mut tier in tiers {
            validate_fields(&tier)?;
            tier.family_id = resolve_family_id(&tier)?;

            let tier = Arc::new(tier);
            match by_id.entry(tier.id.clone()) {
                Entry::Occupied(_) => {
                    return Err(EngineError::configuration(format!(
                        "重复的徽章 ID: {}",
                        tier.id
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(tier.clone());
                }
            }

            let index = *family_index
                .entry(tier.family_id.clone())
                .or_insert_with(|| {
                    families.push(BadgeFamily {
                        id: tier.family_id.clone(),
                        tiers: Vec::new(),
                    });
                    families.len() - 1
                });
            families[index].tiers.push(tier.clone());
            ordered.push(tier);
        }

        for family in &mut families {
            family.tiers.sort_by_key(|t| t.level);
            if let Some(pair) = family.tiers.windows(2).find(|w| w[0].level >= w[1].level) {
                return Err(EngineError::configuration(format!(
                    "系列 {} 的等级不严格递增: {} 与 {} 同为 {}",
                    family.id, pair[0].id, pair[1].id, pair[1].level
                )));
            }
        }

        metrics::set_catalog_tiers(ordered.len());
        info!(
            version = %version,
            tiers = ordered.len(),
            families = families.len(),
            "徽章目录已加载"
        );

        Ok(Self {
            version,
            tiers: ordered,
            by_id,
            families,
            family_index,
        })
    }

    /// 从 JSON 字符串加载
    pub fn from_json(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)
            .map_err(|e| EngineError::configuration(format!("目录解析失败: {e}")))?;
        Self::new(document.version, document.tiers)
    }

    /// 从文件加载
    #[instrument]
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::configuration(format!("无法读取目录文件 {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// 进程级内置目录
    ///
    /// 首次访问时加载并校验，之后所有调用共享同一份只读数据。
    pub fn builtin() -> Result<Arc<CatalogStore>> {
        BUILTIN_CATALOG.clone()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// 全部等级，保持目录原始顺序
    pub fn all_tiers(&self) -> &[Arc<BadgeTier>] {
        &self.tiers
    }

    /// 系列 ID -> 按等级升序的等级列表
    pub fn tiers_by_family(&self) -> HashMap<&str, &[Arc<BadgeTier>]> {
        self.families
            .iter()
            .map(|f| (f.id.as_str(), f.tiers.as_slice()))
            .collect()
    }

    /// 全部系列，按首次出现的目录顺序
    pub fn families(&self) -> &[BadgeFamily] {
        &self.families
    }

    pub fn family(&self, family_id: &str) -> Option<&BadgeFamily> {
        self.family_index
            .get(family_id)
            .and_then(|&i| self.families.get(i))
    }

    pub fn family_ids(&self) -> impl Iterator<Item = &str> {
        self.families.iter().map(|f| f.id.as_str())
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    pub fn get(&self, tier_id: &str) -> Option<&Arc<BadgeTier>> {
        self.by_id.get(tier_id)
    }

    pub fn contains(&self, tier_id: &str) -> bool {
        self.by_id.contains_key(tier_id)
    }
}

fn validate_fields(tier: &BadgeTier) -> Result<()> {
    if tier.id.trim().is_empty() {
        return Err(EngineError::configuration("徽章 ID 不能为空"));
    }
    if tier.name.trim().is_empty() {
        return Err(EngineError::configuration(format!(
            "徽章名称不能为空: {}",
            tier.id
        )));
    }
    let count = tier.requirement.count();
    if count <= 0 {
        return Err(EngineError::configuration(format!(
            "徽章 {} 的 {} 阈值必须为正数，实际 {count}",
            tier.id,
            tier.requirement.kind()
        )));
    }
    Ok(())
}

/// 确定等级所属系列
///
/// 显式给出的 family_id 必须是 id 的前缀（`{family_id}_{suffix}`）；
/// 未给出时取 id 最后一个下划线之前的部分。
fn resolve_family_id(tier: &BadgeTier) -> Result<String> {
    if tier.family_id.is_empty() {
        return match tier.id.rsplit_once('_') {
            Some((family, suffix)) if !family.is_empty() && !suffix.is_empty() => {
                Ok(family.to_string())
            }
            _ => Err(EngineError::configuration(format!(
                "无法从徽章 ID 推导系列: {}（缺少等级后缀分隔符）",
                tier.id
            ))),
        };
    }

    let suffix = tier
        .id
        .strip_prefix(tier.family_id.as_str())
        .and_then(|rest| rest.strip_prefix('_'));
    match suffix {
        Some(s) if !s.is_empty() => Ok(tier.family_id.clone()),
        _ => Err(EngineError::configuration(format!(
            "徽章 ID {} 与系列 {} 不匹配",
            tier.id, tier.family_id
        ))),
    }
}
