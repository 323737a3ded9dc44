//! # scrollharvest
//!
//! 从无限滚动的信息流页面中增量采集记录的工具库。
//!
//! ## 模块组织
//!
//! - `core` - 记录类型和通用辅助函数
//! - `parsers` - HTML 解析与选择器
//! - `extract` - 提取策略和内置站点规则集
//! - `store` - 去重、有界 FIFO 存储和持久化后端
//! - `driver` - 滚动驱动器状态机与页面宿主
//! - `export` - CSV/TSV 导出
//! - `network` - 记录下载
//! - `config` / `env` - 配置文件与环境变量

pub mod config;
pub mod core;
pub mod driver;
pub mod env;
pub mod error;
pub mod export;
pub mod extract;
pub mod network;
pub mod parsers;
pub mod store;

// Re-export commonly used items for convenience
pub use config::{CollectorConfig, ConfigManager};
pub use core::{format_output_path, Record};
pub use driver::{
    Clock, DriverConfig, DriverState, PageHost, PageMetrics, ReplayHost, RunSummary,
    ScrollDriver, StopReason, ThreadClock,
};
pub use error::{HarvestError, HarvestResult};
pub use extract::{extract_page, Extractor, PageContext, Profile, RuleExtractor};
pub use store::{Deduplicator, InsertReport, MemoryBackend, RecordStore, RedbBackend, StorageBackend};
