//! # 解析器模块
//!
//! 这个模块包含读取已保存页面所需的全部功能：
//!
//! - HTML解析和DOM查询
//! - 基于 scraper 的 CSS 选择器
//!
//! # 模块组织
//!
//! - `html` - HTML文档解析、DOM操作、选择器匹配

pub mod html;

// Re-export commonly used items for convenience
pub use html::{
    get_node_attr, html_to_dom, node_classes, text_content, ElementRef, Html, Selector,
};
