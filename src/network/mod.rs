//! # 网络模块
//!
//! - `download` - 按存储顺序下载记录链接（图片）到本地目录
//!
//! HTTP 客户端仅在启用 `download` 特性时编译。

pub mod download;

pub use download::{download_records, DownloadOptions, DownloadReport, Fetch};

#[cfg(feature = "download")]
pub use download::HttpFetcher;
