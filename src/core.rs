use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// 一条采集到的记录
///
/// 由提取器在节点首次满足收录条件时创建，之后不再修改；
/// 只会因 FIFO 淘汰或显式清空而被删除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 唯一标识（在同一个存储中不重复）
    pub id: String,
    /// 来源链接
    pub url: String,
    /// 自由元数据：标题、作者、计数等
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// 采集时间
    pub collected_at: DateTime<Utc>,
}

impl Record {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Record {
        Record {
            id: id.into(),
            url: url.into(),
            fields: BTreeMap::new(),
            collected_at: Utc::now(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Record {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// 按列名取值，`id`、`url`、`collected_at` 为内建列
    pub fn column(&self, name: &str) -> String {
        match name {
            "id" => self.id.clone(),
            "url" => self.url.clone(),
            "collected_at" => self.collected_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            other => self.field(other).unwrap_or_default().to_string(),
        }
    }
}

const ANSI_COLOR_RED: &str = "\x1b[31m";
const ANSI_COLOR_RESET: &str = "\x1b[0m";

/// 展开导出文件名模板
///
/// 支持 `%profile%`、`%date%`、`%timestamp%` 和 `%ext%`。
pub fn format_output_path(path: &str, profile: Option<&str>, extension: &str) -> String {
    let now = Utc::now();
    let datetime: &str = &now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let profile = profile.unwrap_or("");

    path.replace("%timestamp%", &datetime.replace(':', "_"))
        .replace("%date%", &now.format("%Y-%m-%d").to_string())
        .replace(
            "%profile%",
            profile
                .replace(['/', '\\'], "_")
                .replace('<', "[")
                .replace('>', "]")
                .replace(':', " - ")
                .replace('\"', "")
                .replace('|', "-")
                .replace('?', "")
                .trim_start_matches('.'),
        )
        .replace("%ext%", extension)
}

/// Prints an error message to stderr
pub fn print_error_message(msg: &str) {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
    if !no_color && atty::is(atty::Stream::Stderr) {
        eprintln!("{ANSI_COLOR_RED}{msg}{ANSI_COLOR_RESET}");
    } else {
        eprintln!("{msg}");
    }
}

/// Prints an info message to stdout
pub fn print_info_message(msg: &str) {
    println!("{msg}");
}
