//! 版本字符串清理

use super::types::Package;
use regex::Regex;
use std::sync::OnceLock;

/// winget 在无法确定版本时填入的占位值
const VERSION_PLACEHOLDERS: [&str; 2] = ["Unknown", "winget"];

fn source_tags() -> &'static [Regex; 2] {
    static TAGS: OnceLock<[Regex; 2]> = OnceLock::new();
    TAGS.get_or_init(|| {
        [
            Regex::new(r"(?i)\s*winget\b").expect("valid winget tag regex"),
            Regex::new(r"(?i)\s*msstore\b").expect("valid msstore tag regex"),
        ]
    })
}

/// 清理版本占位值和可用版本列尾部的来源标签
pub fn normalize(pkg: Package) -> Package {
    let version = if VERSION_PLACEHOLDERS.contains(&pkg.version.as_str()) {
        String::new()
    } else {
        pkg.version
    };

    let available_version = pkg
        .available_version
        .map(|available| strip_source_tags(&available))
        .unwrap_or_default();

    Package {
        version,
        available_version: Some(available_version),
        ..pkg
    }
}

/// 反复去除直到不再变化：去掉一个标签后可能拼出新的标签（如 `wingetmsstore`）
fn strip_source_tags(value: &str) -> String {
    let mut cleaned = value.trim().to_string();
    loop {
        let mut next = cleaned.clone();
        for tag in source_tags() {
            next = tag.replace_all(&next, "").into_owned();
        }
        let next = next.trim().to_string();
        if next == cleaned {
            return cleaned;
        }
        cleaned = next;
    }
}
