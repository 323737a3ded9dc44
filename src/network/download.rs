//! 记录下载
//!
//! 文件名为 `<前缀><起始序号 + i>.<扩展名>`，每个文件之间暂停 `delay`。
//! 单个文件失败只记录日志，不中断整批下载。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info};

use crate::core::Record;
use crate::driver::Clock;
#[cfg(feature = "download")]
use crate::error::HarvestError;
use crate::error::HarvestResult;

/// 获取远程资源
pub trait Fetch {
    fn fetch(&self, url: &str) -> HarvestResult<Vec<u8>>;
}

/// 下载参数
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub dir: PathBuf,
    pub prefix: String,
    pub start: usize,
    pub delay: Duration,
    /// 固定扩展名；为空时从链接推断
    pub extension: Option<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        DownloadOptions {
            dir: PathBuf::from("."),
            prefix: String::new(),
            start: 1,
            delay: Duration::from_millis(1000),
            extension: None,
        }
    }
}

/// 下载结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<String>,
}

const DEFAULT_EXTENSION: &str = "webp";
const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "avif", "mp4"];

/// 从链接路径推断扩展名
pub fn extension_for(url: &str) -> &'static str {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let last = path.rsplit('/').next().unwrap_or_default();

    // 即梦链接形如 `xxx~tplv-...-aigc_resize:2400:2400.webp`
    KNOWN_EXTENSIONS
        .iter()
        .find(|ext| last.ends_with(&format!(".{}", ext)))
        .copied()
        .unwrap_or(DEFAULT_EXTENSION)
}

fn write_file(path: &Path, data: &[u8]) -> HarvestResult<()> {
    fs::write(path, data)?;
    Ok(())
}

/// 依次下载记录链接
pub fn download_records<'a, F, C, I>(
    fetcher: &F,
    clock: &mut C,
    records: I,
    options: &DownloadOptions,
) -> HarvestResult<DownloadReport>
where
    F: Fetch + ?Sized,
    C: Clock,
    I: IntoIterator<Item = &'a Record>,
{
    fs::create_dir_all(&options.dir)?;
    let records: Vec<&Record> = records.into_iter().collect();
    let total = records.len();
    let mut report = DownloadReport::default();

    for (index, record) in records.into_iter().enumerate() {
        if index > 0 {
            clock.pause(options.delay);
        }

        let ext = options
            .extension
            .as_deref()
            .unwrap_or_else(|| extension_for(&record.url));
        let path = options
            .dir
            .join(format!("{}{}.{}", options.prefix, options.start + index, ext));

        match fetcher
            .fetch(&record.url)
            .and_then(|data| write_file(&path, &data))
        {
            Ok(()) => {
                info!("已下载 {}/{}: {}", index + 1, total, path.display());
                report.saved.push(path);
            }
            Err(e) => {
                error!("下载失败 {}: {}", record.url, e);
                report.failed.push(record.url.clone());
            }
        }
    }

    Ok(report)
}

/// 基于 reqwest 阻塞客户端的下载器
#[cfg(feature = "download")]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "download")]
impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> HarvestResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::Network(e.to_string()))?;
        Ok(HttpFetcher { client })
    }
}

#[cfg(feature = "download")]
impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> HarvestResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| HarvestError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Network(format!("{} 返回 {}", url, status)));
        }

        let bytes = response
            .bytes()
            .map_err(|e| HarvestError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
