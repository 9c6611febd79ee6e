//! 共享库
//!
//! 包含徽章进度引擎与其宿主程序共用的配置加载和可观测性初始化代码。

pub mod config;
pub mod observability;
