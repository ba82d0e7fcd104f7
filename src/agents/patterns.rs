//! 直达模式表：有序的 (正则, 构造意图) 列表，先匹配者胜
//!
//! 声明顺序即优先级；模式之间的重叠由编写者负责，运行时不做消歧。

use regex::{Captures, Regex, RegexBuilder};

use crate::core::{DockError, DockResult};

type Build<I> = fn(&Captures) -> I;

pub struct PatternTable<I> {
    entries: Vec<(Regex, Build<I>)>,
}

impl<I> PatternTable<I> {
    /// 按声明顺序编译（大小写不敏感）
    pub fn compile(rules: &[(&str, Build<I>)]) -> DockResult<Self> {
        let entries = rules
            .iter()
            .map(|(pattern, build)| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (re, *build))
                    .map_err(|e| DockError::ConfigError(format!("invalid intent pattern {pattern}: {e}")))
            })
            .collect::<DockResult<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// 第一个匹配的模式构造意图；都不匹配返回 None
    pub fn recognize(&self, query: &str) -> Option<I> {
        self.entries.iter().enumerate().find_map(|(i, (re, build))| {
            re.captures(query).map(|caps| {
                tracing::debug!(pattern = i, "direct pattern matched");
                build(&caps)
            })
        })
    }
}

/// 取第 i 个捕获组（未参与匹配时为空串）
pub fn group(caps: &Captures, i: usize) -> String {
    caps.get(i).map_or("", |m| m.as_str()).to_string()
}
