/// 程序运行配置
///
/// 坐标配置（题目区域/选项/下一题按钮）保存在 JSON 配置文件中，
/// 由 `ConfigManager` 管理；这里只放运行参数。
#[derive(Clone, Debug)]
pub struct Config {
    /// DoubaoFreeApi 服务地址
    pub api_base_url: String,
    /// 单次请求超时（秒），图片识别需要更长时间
    pub request_timeout_secs: u64,
    /// AI 请求失败后的最大重试次数（总尝试次数 = 重试次数 + 1）
    pub max_retries: u32,
    /// 指数退避的基础等待时间（毫秒）
    pub retry_base_ms: u64,
    /// 坐标配置文件路径
    pub config_file: String,
    /// 是否使用图片模式（true=发图片，false=OCR文字）
    pub use_image_mode: bool,
    /// 鼠标平滑移动持续时间（毫秒）
    pub move_duration_ms: u64,
    /// 点击选项后的等待时间（毫秒），给目标界面留出响应时间
    pub option_click_delay_ms: u64,
    /// 点击下一题后的等待时间（毫秒），避免触发服务端频率限制
    pub next_question_delay_ms: u64,
    /// 跳题兜底后的恢复等待时间（毫秒）
    pub skip_recovery_delay_ms: u64,
    /// 检测到频率限制后的冷却时间（毫秒）
    pub rate_limit_cooldown_ms: u64,
    /// 频率限制的错误特征子串，命中任意一个即判定为频率限制
    pub rate_limit_markers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_base_ms: 1000,
            config_file: "auto_answer_config.json".to_string(),
            use_image_mode: true,
            move_duration_ms: 300,
            option_click_delay_ms: 500,
            next_question_delay_ms: 5000,
            skip_recovery_delay_ms: 1000,
            rate_limit_cooldown_ms: 10_000,
            rate_limit_markers: vec!["rate limited".to_string(), "710022004".to_string()],
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_base_url: std::env::var("AI_API_BASE_URL").unwrap_or(default.api_base_url),
            request_timeout_secs: std::env::var("AI_REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            max_retries: std::env::var("AI_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_retries),
            retry_base_ms: std::env::var("AI_RETRY_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_base_ms),
            config_file: std::env::var("ANSWER_CONFIG_FILE").unwrap_or(default.config_file),
            use_image_mode: std::env::var("USE_IMAGE_MODE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.use_image_mode),
            move_duration_ms: std::env::var("MOVE_DURATION_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.move_duration_ms),
            option_click_delay_ms: std::env::var("OPTION_CLICK_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.option_click_delay_ms),
            next_question_delay_ms: std::env::var("NEXT_QUESTION_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.next_question_delay_ms),
            skip_recovery_delay_ms: std::env::var("SKIP_RECOVERY_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.skip_recovery_delay_ms),
            rate_limit_cooldown_ms: std::env::var("RATE_LIMIT_COOLDOWN_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.rate_limit_cooldown_ms),
            rate_limit_markers: std::env::var("RATE_LIMIT_MARKERS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(default.rate_limit_markers),
        }
    }

    /// 判断一条错误信息是否命中频率限制特征
    ///
    /// 特征子串来自配置而非硬编码，便于适配不同服务端的错误格式。
    pub fn is_rate_limited(&self, message: &str) -> bool {
        self.rate_limit_markers.iter().any(|m| message.contains(m))
    }
}
