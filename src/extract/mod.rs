//! # 提取模块
//!
//! 把单个 DOM 节点映射为零或一条记录：
//!
//! - `Extractor` - 可替换的提取策略接口
//! - `rules` - 以选择器、收录条件和字段规则描述的通用策略
//! - `profiles` - 内置站点规则集
//!
//! 站点标记变化时只需修改规则，不影响滚动驱动器。

pub mod profiles;
pub mod rules;

use tracing::trace;
use url::Url;

use crate::core::Record;
use crate::error::HarvestResult;
use crate::parsers::html::{ElementRef, Html, Selector};

pub use profiles::{builtin, Profile};
pub use rules::{
    parse_count, ExportColumn, ExtractionRules, FieldRule, FieldTransform, IdRule, Inclusion,
    RuleExtractor, Scope, SinceRule, UrlRule,
};

/// 提取时可用的页面上下文
#[derive(Debug, Clone)]
pub struct PageContext<'a> {
    /// 页面文档（用于页面级条件，例如徽标）
    pub document: &'a Html,
    /// 解析相对链接使用的基准地址
    pub base_url: Option<Url>,
}

impl<'a> PageContext<'a> {
    pub fn new(document: &'a Html, base_url: Option<Url>) -> Self {
        PageContext { document, base_url }
    }

    /// 文档根元素
    pub fn root(&self) -> ElementRef<'a> {
        self.document.root_element()
    }
}

/// 提取策略
pub trait Extractor {
    /// 策略名称
    fn name(&self) -> &str;

    /// 匹配列表项的选择器
    fn item_selector(&self) -> &Selector;

    /// 从单个列表项提取记录，不满足条件时返回 `ExtractionSkipped`
    fn extract(&self, node: ElementRef<'_>, page: &PageContext<'_>) -> HarvestResult<Record>;

    /// 记录是否早于截止条件，之后的列表项不再需要
    fn reached_cutoff(&self, _record: &Record) -> bool {
        false
    }
}

/// 单页提取结果
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub records: Vec<Record>,
    pub skipped: usize,
    pub reached_cutoff: bool,
}

/// 对页面内全部列表项运行提取器
pub fn extract_page<E>(extractor: &E, page: &PageContext<'_>) -> HarvestResult<PageExtraction>
where
    E: Extractor + ?Sized,
{
    let mut result = PageExtraction::default();

    for node in extractor.item_selector().select(page.root()) {
        match extractor.extract(node, page) {
            Ok(record) => {
                if extractor.reached_cutoff(&record) {
                    result.reached_cutoff = true;
                    break;
                }
                result.records.push(record);
            }
            Err(e) if e.is_skip() => {
                trace!("{}: {}", extractor.name(), e);
                result.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(result)
}

/// 统计页面中的列表项数量
pub fn count_items<E>(extractor: &E, document: &Html) -> usize
where
    E: Extractor + ?Sized,
{
    extractor
        .item_selector()
        .select(document.root_element())
        .len()
}
