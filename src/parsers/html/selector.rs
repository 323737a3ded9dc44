//! 选择器模块
//!
//! 包装 `scraper::Selector`，保留原始文本以便写回配置文件。

use std::fmt;

use scraper::ElementRef;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{HarvestError, HarvestResult};

/// 已编译的选择器
#[derive(Clone)]
pub struct Selector {
    source: String,
    inner: scraper::Selector,
}

impl Selector {
    /// 解析选择器文本
    pub fn parse(source: &str) -> HarvestResult<Selector> {
        let inner = scraper::Selector::parse(source)
            .map_err(|e| HarvestError::Selector(format!("{}: {}", source, e)))?;
        Ok(Selector {
            source: source.to_string(),
            inner,
        })
    }

    /// 原始选择器文本
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// 判断元素是否匹配
    pub fn matches(&self, element: &ElementRef<'_>) -> bool {
        self.inner.matches(element)
    }

    /// 按文档顺序返回 `scope` 的全部匹配后代（不含 `scope` 本身）
    pub fn select<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        scope
            .select(&self.inner)
            .filter(|element| *element != scope)
            .collect()
    }

    /// 返回第一个匹配的后代
    pub fn select_first<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        scope.select(&self.inner).find(|element| *element != scope)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({:?})", self.source)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Selector::parse(&source).map_err(serde::de::Error::custom)
    }
}
