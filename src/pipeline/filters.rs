//! 文本过滤器模块
//!
//! 判断文本片段是否值得翻译，过滤掉ID、价格、装饰符号等无意义内容

use std::sync::OnceLock;

use regex::Regex;

use crate::config::constants;

/// 归一化文本：压缩连续空白并去除首尾空白
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 文本过滤器
pub struct TextFilter {
    regex_cache: RegexCache,
}

/// 正则表达式缓存
struct RegexCache {
    url_regex: OnceLock<Regex>,
    email_regex: OnceLock<Regex>,
}

impl Default for RegexCache {
    fn default() -> Self {
        Self {
            url_regex: OnceLock::new(),
            email_regex: OnceLock::new(),
        }
    }
}

impl TextFilter {
    pub fn new() -> Self {
        Self {
            regex_cache: RegexCache::default(),
        }
    }

    /// 判断文本是否需要翻译
    pub fn should_translate(&self, text: &str) -> bool {
        let normalized = normalize_text(text);

        if normalized.is_empty() {
            return false;
        }

        // 有意义字符（字母或数字）不足
        let meaningful = normalized.chars().filter(|c| c.is_alphanumeric()).count();
        if meaningful < constants::MIN_MEANINGFUL_CHARS {
            return false;
        }

        // 非字母字符占比过高：ID、价格、电话号码、装饰符号
        if self.non_alphabetic_dominated(&normalized) {
            return false;
        }

        if self.is_url(&normalized) || self.is_email(&normalized) {
            return false;
        }

        if self.is_code_like(&normalized) {
            return false;
        }

        true
    }

    /// 非字母字符是否占主导
    fn non_alphabetic_dominated(&self, text: &str) -> bool {
        let total = text.chars().filter(|c| !c.is_whitespace()).count();
        if total == 0 {
            return true;
        }

        let non_alphabetic = text
            .chars()
            .filter(|c| !c.is_whitespace() && !c.is_alphabetic())
            .count();

        non_alphabetic as f32 / total as f32 > constants::NON_ALPHABETIC_RATIO
    }

    /// 检查是否为URL
    fn is_url(&self, text: &str) -> bool {
        if text.starts_with("http://") || text.starts_with("https://") || text.starts_with("ftp://")
        {
            return true;
        }

        let url_regex = self.regex_cache.url_regex.get_or_init(|| {
            Regex::new(r"^(https?|ftp)://\S+$").unwrap_or_else(|_| Regex::new(r"^$").unwrap())
        });
        url_regex.is_match(text)
    }

    /// 检查是否为邮箱
    fn is_email(&self, text: &str) -> bool {
        if text.len() > 100 || !text.contains('@') || !text.contains('.') {
            return false;
        }

        let email_regex = self.regex_cache.email_regex.get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
                .unwrap_or_else(|_| Regex::new(r"^$").unwrap())
        });
        email_regex.is_match(text)
    }

    /// 检查是否为代码模式
    fn is_code_like(&self, text: &str) -> bool {
        let special_chars = text
            .chars()
            .filter(|&c| {
                matches!(
                    c,
                    '{' | '}' | '[' | ']' | '(' | ')' | ';' | '=' | '<' | '>' | '/' | '\\'
                )
            })
            .count();

        special_chars as f32 > text.chars().count() as f32 * 0.33
    }

    /// 批量过滤文本
    pub fn filter_texts(&self, texts: Vec<String>) -> Vec<String> {
        texts
            .into_iter()
            .filter(|text| self.should_translate(text))
            .collect()
    }
}

impl Default for TextFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  Hello\n\t world  "), "Hello world");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_should_translate_basic_cases() {
        let filter = TextFilter::new();

        assert!(filter.should_translate("Hello world"));
        assert!(filter.should_translate("This is a test sentence"));

        assert!(!filter.should_translate(""));
        assert!(!filter.should_translate("   "));
        assert!(!filter.should_translate("x"), "single char lacks meaning");
    }

    #[test]
    fn test_rejects_non_alphabetic_dominated() {
        let filter = TextFilter::new();

        assert!(!filter.should_translate("12345"));
        assert!(!filter.should_translate("$19.99"));
        assert!(!filter.should_translate("123-456-7890"));
        assert!(!filter.should_translate("!@#$%^&*()"));
        // 字母为主的混合内容要保留
        assert!(filter.should_translate("Chapter 12"));
    }

    #[test]
    fn test_rejects_urls_and_emails() {
        let filter = TextFilter::new();

        assert!(!filter.should_translate("https://example.com"));
        assert!(!filter.should_translate("ftp://files.example.com"));
        assert!(!filter.should_translate("user@example.com"));
    }

    #[test]
    fn test_rejects_code_like_text() {
        let filter = TextFilter::new();

        assert!(!filter.should_translate("(a) => { b[i] = c; }"));
        assert!(!filter.should_translate("<b><i>x</i></b>"));
        // 普通散文里的少量括号不会触发代码判定
        assert!(filter.should_translate("The result (surprisingly) held up"));
    }

    #[test]
    fn test_filter_texts_batch() {
        let filter = TextFilter::new();
        let texts = vec![
            "Hello world".to_string(),
            "https://example.com".to_string(),
            "42".to_string(),
            "Another sentence".to_string(),
        ];

        let filtered = filter.filter_texts(texts);
        assert_eq!(filtered, vec!["Hello world", "Another sentence"]);
    }
}
