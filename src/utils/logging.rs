/// 日志工具模块
///
/// 提供日志初始化和格式化的辅助函数
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// 过滤级别取 `RUST_LOG` 环境变量，默认 `info`；
/// 重复调用是无害的空操作（测试里会多次触发）。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

/// 截断长文本用于日志显示
///
/// 按字符而不是字节截断，避免把多字节汉字切成半个。
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdefgh", 5), "abcde...");
        // 中文按字符数截断
        assert_eq!(truncate_text("这是一道很长的题目", 4), "这是一道...");
    }
}
