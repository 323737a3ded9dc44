//! 基于规则的提取策略
//!
//! 规则是可序列化的能力集合：列表项选择器、收录条件、标识规则、
//! 链接规则和有序字段规则。规则可以来自内置配置，也可以来自配置文件。

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::Record;
use crate::error::{HarvestError, HarvestResult};
use crate::parsers::html::{get_node_attr, node_classes, text_content, ElementRef, Selector};

use super::{Extractor, PageContext};

/// 选择器作用范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// 在列表项内部查找
    #[default]
    Item,
    /// 在整个页面查找
    Page,
}

/// 收录条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inclusion {
    /// 属性值包含指定片段
    UrlFragment {
        #[serde(default)]
        selector: Option<Selector>,
        attribute: String,
        fragment: String,
    },
    /// 存在文本等于指定值的徽标
    Badge {
        selector: Selector,
        text: String,
        #[serde(default)]
        scope: Scope,
        /// 若设置，徽标元素还必须带有以此为前缀的 class（灰化按钮）
        #[serde(default)]
        disabled_class_prefix: Option<String>,
    },
    /// 任一子条件成立即可
    AnyOf { criteria: Vec<Inclusion> },
    /// 无条件收录
    Any,
}

/// 标识规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdRule {
    /// 取属性值，可选正则的第一个捕获组
    Attribute {
        #[serde(default)]
        selector: Option<Selector>,
        attribute: String,
        #[serde(default)]
        pattern: Option<String>,
    },
    /// 以最终链接的 blake3 摘要作为标识
    Hash,
}

/// 链接规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRule {
    /// 为空时使用列表项本身
    #[serde(default)]
    pub selector: Option<Selector>,
    pub attribute: String,
    /// 可引用 `{id}`、`{query}`、`{link}`
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub strip_query: bool,
}

/// 字段取值后的变换
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTransform {
    #[default]
    None,
    /// 解析“1.2万”之类的计数
    Count,
    /// 按页面基准地址补全链接
    Url,
}

/// 字段规则：第一个命中的选择器生效，否则使用字面回退值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub name: String,
    /// 导出时的列标题
    #[serde(default)]
    pub label: Option<String>,
    /// 为空时使用列表项本身
    #[serde(default)]
    pub selectors: Vec<Selector>,
    /// 为空时取文本
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub fallback: String,
    #[serde(default)]
    pub transform: FieldTransform,
    #[serde(default)]
    pub scope: Scope,
}

impl FieldRule {
    pub fn text(name: &str, selectors: &[&str], fallback: &str) -> HarvestResult<FieldRule> {
        Ok(FieldRule {
            name: name.to_string(),
            label: None,
            selectors: selectors
                .iter()
                .map(|s| Selector::parse(s))
                .collect::<HarvestResult<Vec<_>>>()?,
            attribute: None,
            pattern: None,
            fallback: fallback.to_string(),
            transform: FieldTransform::None,
            scope: Scope::Item,
        })
    }

    pub fn attribute(
        name: &str,
        selectors: &[&str],
        attribute: &str,
        fallback: &str,
    ) -> HarvestResult<FieldRule> {
        let mut rule = FieldRule::text(name, selectors, fallback)?;
        rule.attribute = Some(attribute.to_string());
        Ok(rule)
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    pub fn transform(mut self, transform: FieldTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}

/// 日期截止条件：日期早于 `date` 的记录不再收录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinceRule {
    pub field: String,
    pub date: NaiveDate,
}

/// 导出列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportColumn {
    /// 记录列名：`id`、`url`、`collected_at` 或字段名
    pub key: String,
    pub label: String,
}

impl ExportColumn {
    pub fn new(key: &str, label: &str) -> Self {
        ExportColumn {
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

/// 提取规则集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRules {
    pub item_selector: Selector,
    #[serde(default)]
    pub inclusion: Vec<Inclusion>,
    pub id: IdRule,
    pub url: UrlRule,
    #[serde(default)]
    pub fields: Vec<FieldRule>,
    #[serde(default)]
    pub since: Option<SinceRule>,
}

impl ExtractionRules {
    /// 默认导出列：标识、链接、各字段、采集时间
    pub fn default_columns(&self) -> Vec<ExportColumn> {
        let mut columns = vec![ExportColumn::new("id", "id"), ExportColumn::new("url", "url")];
        for field in &self.fields {
            columns.push(ExportColumn::new(
                &field.name,
                field.label.as_deref().unwrap_or(&field.name),
            ));
        }
        columns.push(ExportColumn::new("collected_at", "collected_at"));
        columns
    }
}

struct CompiledField {
    rule: FieldRule,
    pattern: Option<Regex>,
}

/// 由规则驱动的提取器，选择器和正则在构造时一次性编译
pub struct RuleExtractor {
    name: String,
    rules: ExtractionRules,
    id_pattern: Option<Regex>,
    fields: Vec<CompiledField>,
}

fn compile(pattern: &str) -> HarvestResult<Regex> {
    Regex::new(pattern).map_err(|e| HarvestError::Config(format!("正则无效 {}: {}", pattern, e)))
}

impl RuleExtractor {
    pub fn new(name: &str, rules: ExtractionRules) -> HarvestResult<Self> {
        let id_pattern = match &rules.id {
            IdRule::Attribute {
                pattern: Some(pattern),
                ..
            } => Some(compile(pattern)?),
            _ => None,
        };

        if rules.id == IdRule::Hash
            && rules
                .url
                .template
                .as_deref()
                .is_some_and(|t| t.contains("{id}"))
        {
            return Err(HarvestError::Config(
                "链接模板不能引用由链接计算的 {id}".to_string(),
            ));
        }

        let fields = rules
            .fields
            .iter()
            .map(|rule| {
                Ok(CompiledField {
                    rule: rule.clone(),
                    pattern: rule.pattern.as_deref().map(compile).transpose()?,
                })
            })
            .collect::<HarvestResult<Vec<_>>>()?;

        Ok(RuleExtractor {
            name: name.to_string(),
            rules,
            id_pattern,
            fields,
        })
    }

    /// 设置日期截止条件
    pub fn with_since(mut self, field: &str, date: NaiveDate) -> Self {
        self.rules.since = Some(SinceRule {
            field: field.to_string(),
            date,
        });
        self
    }

    pub fn rules(&self) -> &ExtractionRules {
        &self.rules
    }

    fn included(&self, node: ElementRef<'_>, page: &PageContext<'_>) -> bool {
        self.rules
            .inclusion
            .iter()
            .all(|criterion| criterion_matches(criterion, node, page))
    }

    fn resolve_id(&self, node: ElementRef<'_>) -> HarvestResult<Option<String>> {
        match &self.rules.id {
            IdRule::Hash => Ok(None),
            IdRule::Attribute {
                selector, attribute, ..
            } => {
                let value = lookup_attr(node, selector.as_ref(), attribute)
                    .ok_or_else(|| HarvestError::skipped(format!("缺少标识属性 {}", attribute)))?;
                let id = match &self.id_pattern {
                    Some(pattern) => first_capture(pattern, &value),
                    None => Some(value.clone()),
                };
                match id {
                    Some(id) if !id.is_empty() => Ok(Some(id)),
                    _ => Err(HarvestError::skipped(format!("标识不匹配: {}", value))),
                }
            }
        }
    }

    fn field_value(
        &self,
        field: &CompiledField,
        node: ElementRef<'_>,
        page: &PageContext<'_>,
    ) -> String {
        let rule = &field.rule;
        let root = match rule.scope {
            Scope::Item => node,
            Scope::Page => page.root(),
        };

        let candidates: Vec<ElementRef<'_>> = if rule.selectors.is_empty() {
            vec![root]
        } else {
            rule.selectors
                .iter()
                .filter_map(|selector| selector.select_first(root))
                .collect()
        };

        for candidate in candidates {
            let raw = match &rule.attribute {
                Some(attribute) => get_node_attr(candidate, attribute).unwrap_or_default(),
                None => text_content(candidate),
            };
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let value = match &field.pattern {
                Some(pattern) => match first_capture(pattern, raw) {
                    Some(value) if !value.is_empty() => value,
                    _ => continue,
                },
                None => raw.to_string(),
            };
            return apply_transform(rule.transform, &value, page.base_url.as_ref());
        }

        match rule.transform {
            FieldTransform::Count if rule.fallback.is_empty() => "0".to_string(),
            _ => rule.fallback.clone(),
        }
    }
}

impl Extractor for RuleExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn item_selector(&self) -> &Selector {
        &self.rules.item_selector
    }

    fn extract(&self, node: ElementRef<'_>, page: &PageContext<'_>) -> HarvestResult<Record> {
        if !self.included(node, page) {
            return Err(HarvestError::skipped("不满足收录条件"));
        }

        let url_rule = &self.rules.url;
        let link = lookup_attr(node, url_rule.selector.as_ref(), &url_rule.attribute)
            .filter(|link| !link.trim().is_empty())
            .ok_or_else(|| HarvestError::skipped(format!("缺少链接属性 {}", url_rule.attribute)))?;
        let resolved = resolve_link(link.trim(), page.base_url.as_ref());

        let natural_id = self.resolve_id(node)?;

        let mut url = match &url_rule.template {
            Some(template) => {
                let query = Url::parse(&resolved)
                    .ok()
                    .and_then(|u| u.query().map(|q| format!("?{}", q)))
                    .unwrap_or_default();
                template
                    .replace("{id}", natural_id.as_deref().unwrap_or_default())
                    .replace("{query}", &query)
                    .replace("{link}", &resolved)
            }
            None => resolved,
        };
        if url_rule.strip_query {
            url = strip_query(&url);
        }

        let id = natural_id.unwrap_or_else(|| hash_id(&url));

        let mut record = Record::new(id, url);
        for field in &self.fields {
            let value = self.field_value(field, node, page);
            record.fields.insert(field.rule.name.clone(), value);
        }

        Ok(record)
    }

    fn reached_cutoff(&self, record: &Record) -> bool {
        let Some(since) = &self.rules.since else {
            return false;
        };
        record
            .field(&since.field)
            .and_then(parse_date)
            .is_some_and(|date| date < since.date)
    }
}

fn criterion_matches(criterion: &Inclusion, node: ElementRef<'_>, page: &PageContext<'_>) -> bool {
    match criterion {
        Inclusion::Any => true,
        Inclusion::AnyOf { criteria } => criteria
            .iter()
            .any(|inner| criterion_matches(inner, node, page)),
        Inclusion::UrlFragment {
            selector,
            attribute,
            fragment,
        } => lookup_attr(node, selector.as_ref(), attribute)
            .is_some_and(|value| value.contains(fragment.as_str())),
        Inclusion::Badge {
            selector,
            text,
            scope,
            disabled_class_prefix,
        } => {
            let root = match scope {
                Scope::Item => node,
                Scope::Page => page.root(),
            };
            selector.select(root).into_iter().any(|badge| {
                text_content(badge) == *text
                    && disabled_class_prefix.as_deref().map_or(true, |prefix| {
                        node_classes(&badge).iter().any(|c| c.starts_with(prefix))
                    })
            })
        }
    }
}

fn lookup_attr(
    node: ElementRef<'_>,
    selector: Option<&Selector>,
    attribute: &str,
) -> Option<String> {
    match selector {
        Some(selector) => selector
            .select(node)
            .into_iter()
            .find_map(|candidate| get_node_attr(candidate, attribute)),
        None => get_node_attr(node, attribute),
    }
}

fn first_capture(pattern: &Regex, value: &str) -> Option<String> {
    let captures = pattern.captures(value)?;
    captures
        .get(1)
        .or_else(|| captures.get(0))
        .map(|m| m.as_str().to_string())
}

fn apply_transform(transform: FieldTransform, value: &str, base_url: Option<&Url>) -> String {
    match transform {
        FieldTransform::None => value.to_string(),
        FieldTransform::Count => parse_count(value).to_string(),
        FieldTransform::Url => resolve_link(value, base_url),
    }
}

/// 补全相对链接；无法补全时原样返回
pub(crate) fn resolve_link(link: &str, base_url: Option<&Url>) -> String {
    if let Ok(url) = Url::parse(link) {
        return url.to_string();
    }
    match base_url.and_then(|base| base.join(link).ok()) {
        Some(url) => url.to_string(),
        None => link.to_string(),
    }
}

fn strip_query(url: &str) -> String {
    match url.find(['?', '#']) {
        Some(index) => url[..index].to_string(),
        None => url.to_string(),
    }
}

fn hash_id(url: &str) -> String {
    let digest = blake3::hash(url.as_bytes()).to_hex();
    digest.as_str()[..16].to_string()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let head: String = value.trim().chars().take(10).collect();
    NaiveDate::parse_from_str(&head, "%Y-%m-%d").ok()
}

/// 解析点赞数之类的计数文本
///
/// 去掉非数字字符后按 `千`（×1000）与 `万`（×10000）放大；`k`/`w` 只在结尾时生效。
/// 空文本为 0。
pub fn parse_count(text: &str) -> u64 {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let Ok(number) = digits.parse::<f64>() else {
        return 0;
    };

    let suffix = text
        .trim()
        .trim_end_matches('+')
        .chars()
        .last()
        .map(|c| c.to_ascii_lowercase());
    let factor = if text.contains('万') || suffix == Some('w') {
        10_000.0
    } else if text.contains('千') || suffix == Some('k') {
        1_000.0
    } else {
        1.0
    };

    (number * factor).round() as u64
}
