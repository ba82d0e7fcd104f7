//! 核心类型：错误分类与实体种类

pub mod error;

pub use error::{DockError, DockResult, EntityKind};

/// 按字符截断，超出部分以 ... 结尾（日志预览、上下文摘要用）
pub fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::preview;

    #[test]
    fn test_preview_counts_chars() {
        assert_eq!(preview("hello", 10), "hello");
        assert_eq!(preview("hello world", 5), "hello...");
        assert_eq!(preview("问题描述很长", 2), "问题...");
    }
}
