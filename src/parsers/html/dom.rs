use encoding_rs::Encoding;
use scraper::{ElementRef, Html, Node};

use super::utils::collapse_whitespace;

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> Html {
    let s: String = if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
        let (string, _, _) = encoding.decode(data);
        string.into_owned()
    } else {
        String::from_utf8_lossy(data).into_owned()
    };

    Html::parse_document(&s)
}

/// 获取节点属性值
pub fn get_node_attr(node: ElementRef<'_>, attr_name: &str) -> Option<String> {
    node.value().attr(attr_name).map(str::to_string)
}

/// 获取节点的 class 列表
pub fn node_classes<'a>(node: &ElementRef<'a>) -> Vec<&'a str> {
    node.value().classes().collect()
}

/// 获取节点的全部后代文本，空白被折叠，脚本和样式被跳过
pub fn text_content(node: ElementRef<'_>) -> String {
    let mut buf = String::new();
    for descendant in node.descendants() {
        let Node::Text(text) = descendant.value() else {
            continue;
        };
        let hidden = descendant
            .ancestors()
            .take_while(|ancestor| *ancestor != *node)
            .any(|ancestor| {
                matches!(ancestor.value(), Node::Element(e) if matches!(e.name(), "script" | "style"))
            });
        if !hidden {
            buf.push_str(text);
        }
    }
    collapse_whitespace(&buf)
}
