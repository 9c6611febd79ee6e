//! 徽章进度引擎领域模型
//!
//! 目录侧的定义（BadgeTier、Requirement）由目录加载时一次性构造，之后只读；
//! 评估侧的结果（EvaluatedTier、ResolvedBadge）每次评估重新计算，引擎不做持久化。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// 徽章等级
///
/// 单一的全序序数：BRONZE < SILVER < GOLD < PLATINUM < DIAMOND。
/// 反序列化同时接受符号名（"GOLD"，不区分大小写）和序数（3），两者得到同一个值。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "LevelRepr")]
pub enum BadgeLevel {
    Bronze = 1,
    Silver = 2,
    Gold = 3,
    Platinum = 4,
    Diamond = 5,
}

impl BadgeLevel {
    pub const ALL: [BadgeLevel; 5] = [
        Self::Bronze,
        Self::Silver,
        Self::Gold,
        Self::Platinum,
        Self::Diamond,
    ];

    /// 数值序数，1 起
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bronze => "BRONZE",
            Self::Silver => "SILVER",
            Self::Gold => "GOLD",
            Self::Platinum => "PLATINUM",
            Self::Diamond => "DIAMOND",
        }
    }

    /// 展示名称
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Bronze => "青铜",
            Self::Silver => "白银",
            Self::Gold => "黄金",
            Self::Platinum => "铂金",
            Self::Diamond => "钻石",
        }
    }

    /// 展示颜色（十六进制）
    pub fn color(self) -> &'static str {
        match self {
            Self::Bronze => "#CD7F32",
            Self::Silver => "#C0C0C0",
            Self::Gold => "#FFD700",
            Self::Platinum => "#E5E4E2",
            Self::Diamond => "#B9F2FF",
        }
    }
}

impl fmt::Display for BadgeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for BadgeLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|level| level.ordinal() == value)
            .ok_or_else(|| format!("无效的徽章等级序数: {value}"))
    }
}

impl FromStr for BadgeLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(ordinal) = s.parse::<u8>() {
            return Self::try_from(ordinal);
        }
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("无效的徽章等级: {s}"))
    }
}

/// 等级的外部表示：序数或符号名
#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Ordinal(u8),
    Name(String),
}

impl TryFrom<LevelRepr> for BadgeLevel {
    type Error = String;

    fn try_from(repr: LevelRepr) -> Result<Self, Self::Error> {
        match repr {
            LevelRepr::Ordinal(n) => Self::try_from(n),
            LevelRepr::Name(name) => name.parse(),
        }
    }
}

/// 徽章分类（封闭集合）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeCategory {
    General,
    TaskCompletion,
    CategorySpecific,
    Streak,
    Emergency,
    Special,
}

impl BadgeCategory {
    pub const ALL: [BadgeCategory; 6] = [
        Self::General,
        Self::TaskCompletion,
        Self::CategorySpecific,
        Self::Streak,
        Self::Emergency,
        Self::Special,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "GENERAL",
            Self::TaskCompletion => "TASK_COMPLETION",
            Self::CategorySpecific => "CATEGORY_SPECIFIC",
            Self::Streak => "STREAK",
            Self::Emergency => "EMERGENCY",
            Self::Special => "SPECIAL",
        }
    }
}

impl fmt::Display for BadgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BadgeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("无效的徽章分类: {s}"))
    }
}

/// 获取条件
///
/// `count` 在目录文件中是有符号整数，非正数在目录加载时被拒绝。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Requirement {
    /// 累计完成任务数
    TaskCount { count: i64 },
    /// 指定任务类别的完成数
    CategoryCount { count: i64, category: String },
    /// 当前连续天数
    StreakDays { count: i64 },
    /// 紧急任务完成数
    EmergencyCount { count: i64 },
    /// 人工授予，没有部分进度
    Special {
        #[serde(default = "default_special_count")]
        count: i64,
    },
}

fn default_special_count() -> i64 {
    1
}

impl Requirement {
    /// 目录中声明的阈值
    pub fn count(&self) -> i64 {
        match self {
            Self::TaskCount { count }
            | Self::CategoryCount { count, .. }
            | Self::StreakDays { count }
            | Self::EmergencyCount { count }
            | Self::Special { count } => *count,
        }
    }

    /// 评估时使用的阈值，人工授予的徽章固定为 1
    pub fn threshold(&self) -> i64 {
        match self {
            Self::Special { .. } => 1,
            other => other.count(),
        }
    }

    /// 条件类型标识
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TaskCount { .. } => "TASK_COUNT",
            Self::CategoryCount { .. } => "CATEGORY_COUNT",
            Self::StreakDays { .. } => "STREAK_DAYS",
            Self::EmergencyCount { .. } => "EMERGENCY_COUNT",
            Self::Special { .. } => "SPECIAL",
        }
    }
}

/// 徽章等级定义
///
/// 一个系列（family）中的一级，目录加载后不再修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeTier {
    /// 唯一标识，形如 `{family_id}_{suffix}`
    pub id: String,
    /// 所属系列，目录文件中可省略，加载时由 id 推导
    #[serde(default)]
    pub family_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub level: BadgeLevel,
    pub category: BadgeCategory,
    pub requirement: Requirement,
    #[serde(default)]
    pub xp_reward: u32,
}

impl BadgeTier {
    pub fn new(
        id: impl Into<String>,
        family_id: impl Into<String>,
        name: impl Into<String>,
        level: BadgeLevel,
        category: BadgeCategory,
        requirement: Requirement,
    ) -> Self {
        Self {
            id: id.into(),
            family_id: family_id.into(),
            name: name.into(),
            description: String::new(),
            level,
            category,
            requirement,
            xp_reward: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_xp_reward(mut self, xp_reward: u32) -> Self {
        self.xp_reward = xp_reward;
        self
    }
}

/// 用户活动快照
///
/// 由外部提供的当前计数，单次评估内不可变。负数在评估时按 0 处理。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivitySnapshot {
    pub total_tasks: i64,
    /// 按任务类别统计的完成数
    pub category_counts: HashMap<String, i64>,
    /// 当前连续天数，可能归零
    pub streak_days: i64,
    pub emergency_count: i64,
    /// 人工授予的 SPECIAL 徽章 ID
    pub special_grants: HashSet<String>,
    /// 调用方提供的获得时间（按徽章 ID），引擎不会自行生成时间戳
    pub earned_at: HashMap<String, DateTime<Utc>>,
}

impl ActivitySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_total_tasks(mut self, total: i64) -> Self {
        self.total_tasks = total;
        self
    }

    pub fn with_category_count(mut self, category: impl Into<String>, count: i64) -> Self {
        self.category_counts.insert(category.into(), count);
        self
    }

    pub fn with_streak_days(mut self, days: i64) -> Self {
        self.streak_days = days;
        self
    }

    pub fn with_emergency_count(mut self, count: i64) -> Self {
        self.emergency_count = count;
        self
    }

    pub fn with_special_grant(mut self, badge_id: impl Into<String>) -> Self {
        self.special_grants.insert(badge_id.into());
        self
    }

    pub fn with_earned_at(mut self, badge_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.earned_at.insert(badge_id.into(), at);
        self
    }

    /// 指定类别的原始计数，缺失视为 0
    pub fn category_count(&self, category: &str) -> i64 {
        self.category_counts.get(category).copied().unwrap_or(0)
    }
}

/// 单个等级的评估结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedTier {
    pub tier: Arc<BadgeTier>,
    pub earned: bool,
    pub earned_at: Option<DateTime<Utc>>,
    /// 完成比例，取值 [0, 1]
    pub progress_ratio: f64,
    /// 当前计数（已截断为非负）
    pub current: i64,
    /// 评估阈值
    pub target: i64,
}

impl EvaluatedTier {
    pub fn id(&self) -> &str {
        &self.tier.id
    }

    pub fn family_id(&self) -> &str {
        &self.tier.family_id
    }

    pub fn level(&self) -> BadgeLevel {
        self.tier.level
    }

    pub fn category(&self) -> BadgeCategory {
        self.tier.category
    }
}

/// 下一个目标等级
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextGoal {
    pub tier_id: String,
    pub level: BadgeLevel,
    pub progress_ratio: f64,
    pub current: i64,
    pub target: i64,
}

impl From<&EvaluatedTier> for NextGoal {
    fn from(evaluated: &EvaluatedTier) -> Self {
        Self {
            tier_id: evaluated.tier.id.clone(),
            level: evaluated.tier.level,
            progress_ratio: evaluated.progress_ratio,
            current: evaluated.current,
            target: evaluated.target,
        }
    }
}

/// 系列代表徽章
///
/// 每个系列恰好一个：已获得的最高等级，或者全部未获得时的最低等级。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBadge {
    #[serde(flatten)]
    pub representative: EvaluatedTier,
    /// 系列中已获得的等级数
    pub earned_tiers: usize,
    /// 系列等级总数
    pub total_tiers: usize,
    /// 代表徽章已获得时，紧邻的下一个未获得等级
    pub next_goal: Option<NextGoal>,
}

impl ResolvedBadge {
    pub fn id(&self) -> &str {
        self.representative.id()
    }

    pub fn family_id(&self) -> &str {
        self.representative.family_id()
    }

    pub fn level(&self) -> BadgeLevel {
        self.representative.level()
    }

    pub fn category(&self) -> BadgeCategory {
        self.representative.category()
    }

    pub fn earned(&self) -> bool {
        self.representative.earned
    }

    pub fn progress_ratio(&self) -> f64 {
        self.representative.progress_ratio
    }
}

/// 已持久化的获得记录
///
/// 调用方绕过评估器直接提供的已获得徽章列表。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnedBadgeRecord {
    pub badge_id: String,
    #[serde(default)]
    pub earned_at: Option<DateTime<Utc>>,
}

impl EarnedBadgeRecord {
    pub fn new(badge_id: impl Into<String>) -> Self {
        Self {
            badge_id: badge_id.into(),
            earned_at: None,
        }
    }

    pub fn earned_at(mut self, at: DateTime<Utc>) -> Self {
        self.earned_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_order() {
        assert!(BadgeLevel::Bronze < BadgeLevel::Silver);
        assert!(BadgeLevel::Silver < BadgeLevel::Gold);
        assert!(BadgeLevel::Gold < BadgeLevel::Platinum);
        assert!(BadgeLevel::Platinum < BadgeLevel::Diamond);
        assert_eq!(BadgeLevel::Gold.ordinal(), 3);
    }

    #[test]
    fn test_level_numeric_and_symbolic_are_equal() {
        let from_name: BadgeLevel = serde_json::from_value(json!("GOLD")).unwrap();
        let from_lower: BadgeLevel = serde_json::from_value(json!("gold")).unwrap();
        let from_number: BadgeLevel = serde_json::from_value(json!(3)).unwrap();

        assert_eq!(from_name, from_number);
        assert_eq!(from_lower, from_number);
        assert_eq!("3".parse::<BadgeLevel>().unwrap(), BadgeLevel::Gold);
        assert_eq!(BadgeLevel::try_from(5u8).unwrap(), BadgeLevel::Diamond);
    }

    #[test]
    fn test_level_invalid() {
        assert!(serde_json::from_value::<BadgeLevel>(json!(0)).is_err());
        assert!(serde_json::from_value::<BadgeLevel>(json!(6)).is_err());
        assert!(serde_json::from_value::<BadgeLevel>(json!("MYTHIC")).is_err());
    }

    #[test]
    fn test_level_serializes_symbolic() {
        assert_eq!(serde_json::to_value(BadgeLevel::Platinum).unwrap(), json!("PLATINUM"));
        assert_eq!(BadgeLevel::Diamond.to_string(), "DIAMOND");
        assert_eq!(BadgeLevel::Bronze.display_name(), "青铜");
        assert_eq!(BadgeLevel::Gold.color(), "#FFD700");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(
            "task_completion".parse::<BadgeCategory>().unwrap(),
            BadgeCategory::TaskCompletion
        );
        assert!("UNKNOWN".parse::<BadgeCategory>().is_err());
        assert_eq!(
            serde_json::to_value(BadgeCategory::CategorySpecific).unwrap(),
            json!("CATEGORY_SPECIFIC")
        );
    }

    #[test]
    fn test_requirement_deserialization() {
        let req: Requirement = serde_json::from_value(json!({
            "type": "CATEGORY_COUNT",
            "count": 10,
            "category": "FEEDING"
        }))
        .unwrap();
        assert_eq!(
            req,
            Requirement::CategoryCount {
                count: 10,
                category: "FEEDING".to_string()
            }
        );
        assert_eq!(req.kind(), "CATEGORY_COUNT");

        let special: Requirement = serde_json::from_value(json!({"type": "SPECIAL"})).unwrap();
        assert_eq!(special.count(), 1);
        assert_eq!(special.threshold(), 1);

        let special: Requirement =
            serde_json::from_value(json!({"type": "SPECIAL", "count": 3})).unwrap();
        assert_eq!(special.count(), 3);
        assert_eq!(special.threshold(), 1);
    }

    #[test]
    fn test_tier_deserialization() {
        let tier: BadgeTier = serde_json::from_value(json!({
            "id": "streak_3",
            "name": "三日坚持",
            "level": 1,
            "category": "STREAK",
            "requirement": {"type": "STREAK_DAYS", "count": 3},
            "xpReward": 30
        }))
        .unwrap();

        assert_eq!(tier.id, "streak_3");
        assert!(tier.family_id.is_empty());
        assert_eq!(tier.level, BadgeLevel::Bronze);
        assert_eq!(tier.xp_reward, 30);
    }

    #[test]
    fn test_snapshot_deserialization_with_defaults() {
        let snapshot: ActivitySnapshot = serde_json::from_value(json!({
            "totalTasks": 12,
            "categoryCounts": {"FEEDING": 7},
            "specialGrants": ["founder_member"]
        }))
        .unwrap();

        assert_eq!(snapshot.total_tasks, 12);
        assert_eq!(snapshot.category_count("FEEDING"), 7);
        assert_eq!(snapshot.category_count("WALKING"), 0);
        assert_eq!(snapshot.streak_days, 0);
        assert!(snapshot.special_grants.contains("founder_member"));
        assert!(snapshot.earned_at.is_empty());
    }
}
