/// ASCII 空白字符
pub const WHITESPACES: &[char] = &[' ', '\t', '\n', '\x0c', '\r'];

/// 将连续空白折叠为单个空格
pub fn collapse_whitespace(text: &str) -> String {
    text.split(WHITESPACES)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs() {
        assert_eq!(collapse_whitespace("  a \n\t b  c"), "a b c");
        assert_eq!(collapse_whitespace(" \r\n "), "");
    }
}
