//! 内置站点规则集
//!
//! 每个规则集对应一个信息流页面：列表项、滚动容器、加载指示器、
//! 存储键和导出列。类名来自目标站点当前版本的标记。

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, HarvestResult};
use crate::parsers::html::Selector;

use super::rules::{
    ExportColumn, ExtractionRules, FieldRule, FieldTransform, IdRule, Inclusion, RuleExtractor,
    Scope, UrlRule,
};

/// 站点规则集
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// 存储键
    pub storage_key: String,
    /// 页面未提供基准地址时使用
    #[serde(default)]
    pub base_url: Option<String>,
    /// 滚动容器
    #[serde(default)]
    pub container: Option<Selector>,
    /// 加载指示器
    #[serde(default)]
    pub loading: Option<Selector>,
    /// 导出列，为空时由规则生成
    #[serde(default)]
    pub columns: Vec<ExportColumn>,
    /// 导出文件名模板
    #[serde(default)]
    pub export_name: Option<String>,
    pub rules: ExtractionRules,
}

impl Profile {
    pub fn extractor(&self, name: &str) -> HarvestResult<RuleExtractor> {
        RuleExtractor::new(name, self.rules.clone())
    }

    pub fn base_url(&self) -> Option<Url> {
        self.base_url.as_deref().and_then(|u| Url::parse(u).ok())
    }

    pub fn export_columns(&self) -> Vec<ExportColumn> {
        if self.columns.is_empty() {
            self.rules.default_columns()
        } else {
            self.columns.clone()
        }
    }
}

const BUILTIN: &[&str] = &["xhs", "wechat-mp", "jimeng", "douyin"];

/// 内置规则集名称
pub fn names() -> &'static [&'static str] {
    BUILTIN
}

/// 按名称获取内置规则集
pub fn builtin(name: &str) -> HarvestResult<Option<Profile>> {
    let profile = match name {
        "xhs" => xhs()?,
        "wechat-mp" => wechat_mp()?,
        "jimeng" => jimeng()?,
        "douyin" => douyin()?,
        _ => return Ok(None),
    };
    Ok(Some(profile))
}

fn sel(source: &str) -> HarvestResult<Selector> {
    Selector::parse(source)
}

fn columns(pairs: &[(&str, &str)]) -> Vec<ExportColumn> {
    pairs
        .iter()
        .map(|(key, label)| ExportColumn::new(key, label))
        .collect()
}

/// 小红书个人主页笔记
fn xhs() -> HarvestResult<Profile> {
    let link = sel(r#"a[href*="/user/profile/"]"#)?;
    Ok(Profile {
        storage_key: "XHS_FULL_NOTE_DATA_V8".to_string(),
        base_url: Some("https://www.xiaohongshu.com".to_string()),
        container: Some(sel("#userPostedFeeds")?),
        loading: Some(sel(".feeds-loading")?),
        columns: columns(&[
            ("title", "标题"),
            ("id", "笔记ID"),
            ("url", "链接"),
            ("author", "作者"),
            ("author_id", "作者ID"),
            ("likes", "点赞数"),
            ("cover", "图片URL"),
            ("collected_at", "采集时间"),
        ]),
        export_name: Some("小红书笔记_%date%.csv".to_string()),
        rules: ExtractionRules {
            item_selector: sel(".note-item")?,
            inclusion: vec![Inclusion::UrlFragment {
                selector: Some(link.clone()),
                attribute: "href".to_string(),
                fragment: "/user/profile/".to_string(),
            }],
            id: IdRule::Attribute {
                selector: Some(link.clone()),
                attribute: "href".to_string(),
                pattern: Some(r"/user/profile/[^/]+/([a-f0-9]{24})".to_string()),
            },
            url: UrlRule {
                selector: Some(link),
                attribute: "href".to_string(),
                template: Some("https://www.xiaohongshu.com/explore/{id}{query}".to_string()),
                strip_query: false,
            },
            fields: vec![
                FieldRule::text("title", &[".title", ".note-title"], "无标题")?,
                FieldRule::text("author", &[".author .name"], "未知作者")?,
                FieldRule::attribute("author_id", &[".author"], "href", "未知ID")?
                    .pattern(r"/user/profile/([^/?]+)"),
                FieldRule::text("likes", &[".like-wrapper .count"], "0")?
                    .transform(FieldTransform::Count),
                FieldRule::attribute("cover", &["a.cover img"], "src", "")?
                    .transform(FieldTransform::Url),
            ],
            since: None,
        },
    })
}

/// 公众号后台“插入链接”文章列表
fn wechat_mp() -> HarvestResult<Profile> {
    Ok(Profile {
        storage_key: "collectedArticles".to_string(),
        base_url: Some("https://mp.weixin.qq.com".to_string()),
        container: Some(sel(".inner_link_article_list, .weui-desktop-dialog__bd")?),
        loading: Some(sel(".weui-desktop-loading")?),
        columns: columns(&[
            ("account", "公众号"),
            ("title", "标题"),
            ("url", "链接"),
            ("date", "日期"),
        ]),
        export_name: Some("%profile%_%date%.csv".to_string()),
        rules: ExtractionRules {
            item_selector: sel(".inner_link_article_item")?,
            inclusion: Vec::new(),
            id: IdRule::Hash,
            url: UrlRule {
                selector: Some(sel(".inner_link_article_date a")?),
                attribute: "href".to_string(),
                template: None,
                strip_query: false,
            },
            fields: vec![
                FieldRule::text(
                    "account",
                    &[
                        ".inner_link_account_msg",
                        ".weui-desktop-account__nickname",
                        ".account_setting_nick_name",
                    ],
                    "未知公众号",
                )?
                .pattern(r"^(.*?)\s*(?:选择其他账号)?$")
                .scope(Scope::Page),
                FieldRule::text("title", &[".inner_link_article_title span:last-child"], "无标题")?,
                FieldRule::text("date", &[".inner_link_article_date span:first-child"], "")?,
            ],
            since: None,
        },
    })
}

/// 即梦生成图片，仅收录高清结果
fn jimeng() -> HarvestResult<Profile> {
    let image = sel("img")?;
    Ok(Profile {
        storage_key: "JIMENG_HD_IMAGES".to_string(),
        base_url: Some("https://jimeng.jianying.com".to_string()),
        container: Some(sel(r#"[class*="content-"], body"#)?),
        loading: Some(sel(r#"[class*="loading-"]"#)?),
        columns: columns(&[("id", "ID"), ("url", "图片URL"), ("collected_at", "采集时间")]),
        export_name: Some("jimeng_%date%.csv".to_string()),
        rules: ExtractionRules {
            item_selector: sel(r#"[class*="container-"]"#)?,
            inclusion: vec![Inclusion::AnyOf {
                criteria: vec![
                    Inclusion::UrlFragment {
                        selector: Some(image.clone()),
                        attribute: "src".to_string(),
                        fragment: "aigc_resize:2400:2400".to_string(),
                    },
                    Inclusion::Badge {
                        selector: sel(r#"[class*="metaRight-"], [class*="metaRight_"]"#)?,
                        text: "超清".to_string(),
                        scope: Scope::Page,
                        disabled_class_prefix: None,
                    },
                    Inclusion::Badge {
                        selector: sel(
                            r#"[class^="group-"] [class^="optItem-"], [class^="group-"] [class^="mweb-button-"], [class^="topActionBar-"] [class^="optItem-"], [class^="topActionBar-"] [class^="mweb-button-"]"#,
                        )?,
                        text: "超清".to_string(),
                        scope: Scope::Page,
                        disabled_class_prefix: Some("disabled-".to_string()),
                    },
                ],
            }],
            id: IdRule::Hash,
            url: UrlRule {
                selector: Some(image),
                attribute: "src".to_string(),
                template: None,
                strip_query: true,
            },
            fields: Vec::new(),
            since: None,
        },
    })
}

/// 抖音主页作品列表
fn douyin() -> HarvestResult<Profile> {
    Ok(Profile {
        storage_key: "DOUYIN_VIDEO_DATA".to_string(),
        base_url: Some("https://www.douyin.com".to_string()),
        container: Some(sel(r#"[data-e2e="scroll-list"], ul"#)?),
        loading: Some(sel(r#"[data-e2e="user-post-list-loading"]"#)?),
        columns: columns(&[("title", "标题"), ("url", "网址"), ("likes", "点赞数")]),
        export_name: Some("douyin_%date%.csv".to_string()),
        rules: ExtractionRules {
            item_selector: sel(r#"a[href^="/video/"]"#)?,
            inclusion: Vec::new(),
            id: IdRule::Attribute {
                selector: None,
                attribute: "href".to_string(),
                pattern: Some(r"/video/(\d+)".to_string()),
            },
            url: UrlRule {
                selector: None,
                attribute: "href".to_string(),
                template: None,
                strip_query: true,
            },
            fields: vec![
                FieldRule::text("title", &["p.Ja95nb2Z", "p"], "")?,
                FieldRule::text("likes", &["span.b3Dh2ia8"], "0")?,
            ],
            since: None,
        },
    })
}

/// 在内置规则集与自定义规则集中查找
pub fn resolve<'a, I>(name: &str, custom: I) -> HarvestResult<Profile>
where
    I: IntoIterator<Item = (&'a String, &'a Profile)>,
{
    if let Some((_, profile)) = custom.into_iter().find(|(key, _)| key.as_str() == name) {
        return Ok(profile.clone());
    }
    builtin(name)?.ok_or_else(|| {
        HarvestError::Config(format!(
            "未知的规则集 '{}'，可用: {}",
            name,
            BUILTIN.join(", ")
        ))
    })
}
