//! Object key processing utility functions / 对象键处理工具函数

/// Object key path separator / 对象键路径分隔符
pub const SEPARATOR: char = '/';

/// Normalize a directory path into a listing prefix / 规范化目录前缀
///
/// Trailing separators collapse into exactly one. Leading separators are part
/// of the key and are kept. / 结尾只保留一个分隔符，开头的分隔符属于对象键，保持不变
///
/// Returns None for an empty directory, which would address the whole bucket.
pub fn normalize_dir_prefix(dir: &str) -> Option<String> {
    let trimmed = dir.trim().trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("{}{}", trimmed, SEPARATOR))
    }
}

/// Whether normalized prefix `target` equals `source` or sits below it
/// 目标目录是否为源目录本身或其子目录
pub fn is_within_prefix(target: &str, source: &str) -> bool {
    target.starts_with(source)
}

/// Map a key under `source_prefix` to the same relative key under `target_prefix`
/// 将源前缀下的键映射到目标前缀下
/// Input: "a/b/x/y.txt", "a/b/", "c/d/" / 输入
/// Output: "c/d/x/y.txt" / 输出
pub fn rebase_key(key: &str, source_prefix: &str, target_prefix: &str) -> String {
    let relative = key.strip_prefix(source_prefix).unwrap_or(key);
    format!("{}{}", target_prefix, relative)
}

/// Strip the trailing separator of a common prefix / 去掉公共前缀末尾的分隔符
pub fn dir_display_name(prefix: &str) -> &str {
    prefix.strip_suffix(SEPARATOR).unwrap_or(prefix)
}

/// Mask a secret for logs, keeping the last 4 chars / 日志中隐藏密钥
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
