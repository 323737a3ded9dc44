//! HTML解析和处理模块
//!
//! - `utils`: 基础工具函数和常量
//! - `dom`: 基础DOM操作
//! - `selector`: 选择器解析与匹配

pub mod dom;
pub mod selector;
pub mod utils;

pub use dom::{get_node_attr, html_to_dom, node_classes, text_content};
pub use scraper::{ElementRef, Html};
pub use selector::Selector;
pub use utils::collapse_whitespace;
