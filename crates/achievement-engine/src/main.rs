//! 徽章进度命令行工具
//!
//! 读取目录和用户快照（或获得记录），输出归并后的徽章列表与汇总统计。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use achievement_engine::{
    AchievementEngine, BadgeQuery, CatalogStore, CategoryFilter, EarnedBadgeRecord,
    FileSnapshotProvider, LevelFilter, ResolvedBadge, SortMode, StatisticsAggregator,
    StatusFilter,
};
use anyhow::{Context, Result};
use badge_shared::config::AppConfig;
use badge_shared::observability;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

const SERVICE_NAME: &str = "achievement-engine";

#[derive(Parser, Debug)]
#[command(name = "achievement-engine")]
#[command(version, about = "徽章进度计算工具")]
struct Cli {
    /// 目录文件路径，优先于配置中的 catalog.path
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 按用户快照归并徽章
    Resolve {
        /// 用户 ID，对应快照目录下的 {user_id}.json
        #[arg(short, long)]
        user_id: String,

        /// 快照目录
        #[arg(long, default_value = "snapshots")]
        snapshot_dir: PathBuf,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// 按已持久化的获得记录归并徽章
    Records {
        /// 获得记录文件（JSON 数组）
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// 列出用户每个等级的评估结果
    Evaluate {
        #[arg(short, long)]
        user_id: String,

        #[arg(long, default_value = "snapshots")]
        snapshot_dir: PathBuf,
    },

    /// 列出目录中的系列
    Catalog,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// 分类筛选（all 或分类名）
    #[arg(long, default_value = "all")]
    category: CategoryFilter,

    /// 等级筛选（all、等级名或 1-5）
    #[arg(long, default_value = "all")]
    level: LevelFilter,

    /// 状态筛选（all、earned、unearned）
    #[arg(long, default_value = "all")]
    status: StatusFilter,

    /// 排序方式（catalog、recent、progress）
    #[arg(long, default_value = "catalog")]
    sort: SortMode,
}

impl From<QueryArgs> for BadgeQuery {
    fn from(args: QueryArgs) -> Self {
        BadgeQuery {
            category: args.category,
            level: args.level,
            status: args.status,
            sort: args.sort,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BadgeReport<'a> {
    catalog_version: &'a str,
    summary: achievement_engine::BadgeSummary,
    #[serde(flatten)]
    result: achievement_engine::QueryResult<ResolvedBadge>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FamilyEntry<'a> {
    id: &'a str,
    tiers: Vec<&'a str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig {
            service_name: SERVICE_NAME.to_string(),
            ..AppConfig::default()
        }
    });

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    observability::init(&obs_config)?;

    let catalog_path = cli.catalog.clone().or_else(|| config.catalog.resolved_path());
    let engine = AchievementEngine::new(load_catalog(catalog_path.as_deref())?);

    match cli.command {
        Commands::Resolve {
            user_id,
            snapshot_dir,
            query,
        } => {
            let provider = FileSnapshotProvider::new(snapshot_dir);
            let resolved = engine.resolve_for_user(&provider, &user_id).await?;
            print_report(&engine, &resolved, query.into())?;
        }
        Commands::Records { file, query } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("读取获得记录失败: {}", file.display()))?;
            let records: Vec<EarnedBadgeRecord> =
                serde_json::from_str(&content).context("获得记录格式错误")?;
            let resolved = engine.resolve_from_records(&records);
            print_report(&engine, &resolved, query.into())?;
        }
        Commands::Evaluate {
            user_id,
            snapshot_dir,
        } => {
            let provider = FileSnapshotProvider::new(snapshot_dir);
            let snapshot = engine.fetch_snapshot(&provider, &user_id).await?;
            let evaluated = engine.evaluate_all(&snapshot)?;
            info!(
                user_id = %user_id,
                earned_xp = StatisticsAggregator::earned_xp(&evaluated),
                "评估完成"
            );
            println!("{}", serde_json::to_string_pretty(&evaluated)?);
        }
        Commands::Catalog => {
            let families: Vec<FamilyEntry<'_>> = engine
                .catalog()
                .families()
                .iter()
                .map(|f| FamilyEntry {
                    id: f.id(),
                    tiers: f.tiers().iter().map(|t| t.id.as_str()).collect(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&families)?);
        }
    }

    Ok(())
}

fn load_catalog(path: Option<&Path>) -> Result<Arc<CatalogStore>> {
    match path {
        Some(path) => {
            let store = CatalogStore::from_path(path)
                .with_context(|| format!("加载目录失败: {}", path.display()))?;
            info!(path = %path.display(), version = store.version(), "使用外部目录");
            Ok(Arc::new(store))
        }
        None => Ok(CatalogStore::builtin()?),
    }
}

fn print_report(engine: &AchievementEngine, resolved: &[ResolvedBadge], query: BadgeQuery) -> Result<()> {
    let report = BadgeReport {
        catalog_version: engine.catalog().version(),
        summary: engine.summarize(resolved),
        result: engine.query(resolved, &query),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
