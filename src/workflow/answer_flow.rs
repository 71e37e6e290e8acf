//! 单题答题流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整处理流程
//!
//! 流程顺序：
//! 1. 取配置快照并校验 → 截图
//! 2. 图片模式直接问 AI；文字模式先 OCR 再问 AI
//! 3. 点击答案选项 → 短暂等待 → 点击下一题 → 长等待
//!
//! 单题内的任何失败都在这里消化：记录日志、兜底点击
//! "下一题"跳过卡住的题目，绝不向上传播。检测到频率限制
//! 时额外重置对话并延长冷却。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError};
use crate::infrastructure::{AutoClick, ScreenCapture, TextRecognizer};
use crate::observer::AnswerObserver;
use crate::services::{AiAnswerService, AnswerMode, ConfigManager};
use crate::utils::logging::truncate_text;

/// 单题答题流程
///
/// - 编排一道题的完整生命周期
/// - 持有所有平台协作者和 AI 服务
/// - 不认识 RunState，不决定答多少题
pub struct AnswerFlow {
    config: Config,
    config_manager: ConfigManager,
    ai_service: AiAnswerService,
    screen_capture: Box<dyn ScreenCapture>,
    text_recognizer: Option<Box<dyn TextRecognizer>>,
    auto_click: Box<dyn AutoClick>,
    observer: Arc<dyn AnswerObserver>,
}

impl AnswerFlow {
    /// 创建新的答题流程
    ///
    /// 文字模式必须提供文字识别协作者，否则在这里直接失败
    /// （致命错误，发生在任何答题开始之前）。
    pub fn new(
        config: Config,
        config_manager: ConfigManager,
        ai_service: AiAnswerService,
        screen_capture: Box<dyn ScreenCapture>,
        text_recognizer: Option<Box<dyn TextRecognizer>>,
        auto_click: Box<dyn AutoClick>,
        observer: Arc<dyn AnswerObserver>,
    ) -> AppResult<Self> {
        if ai_service.mode() == AnswerMode::Text && text_recognizer.is_none() {
            return Err(ConfigError::TextModeRequiresOcr.into());
        }

        Ok(Self {
            config,
            config_manager,
            ai_service,
            screen_capture,
            text_recognizer,
            auto_click,
            observer,
        })
    }

    /// 回答一道题目，返回是否成功
    ///
    /// 失败不会向上传播；除配置不完整外的失败都会触发
    /// 跳题兜底，让整轮答题继续。
    pub async fn answer_one_question(&mut self, question_num: usize, use_deep_think: bool) -> bool {
        match self.try_answer(question_num, use_deep_think).await {
            Ok(()) => {
                self.observer.on_log(&format!("题目 {}: 完成", question_num));
                true
            }
            // 配置不可用：不做跳题点击，等调用方修好配置
            Err(AppError::Config(ref e)) if !matches!(e, ConfigError::UnknownOption { .. }) => {
                self.observer.on_log(&format!("错误: {}", e));
                warn!("配置不可用，题目 {} 中止: {}", question_num, e);
                false
            }
            Err(e) => {
                let cause = failure_label(&e);
                self.observer
                    .on_log(&format!("题目 {}: {} - {}", question_num, cause, e));
                warn!("{}，跳过题目 {}: {}", cause, question_num, e);

                if self.config.is_rate_limited(&e.to_string()) {
                    self.observer.on_log(&format!(
                        "检测到频率限制，重置对话并等待{}秒后继续...",
                        self.config.rate_limit_cooldown_ms / 1000
                    ));
                    warn!("检测到频率限制，重置对话");
                    self.ai_service.reset_conversation();
                    sleep(Duration::from_millis(self.config.rate_limit_cooldown_ms)).await;
                }

                self.skip_to_next().await;
                false
            }
        }
    }

    /// 一道题的完整处理，任何一步失败都立即返回
    async fn try_answer(&mut self, question_num: usize, use_deep_think: bool) -> AppResult<()> {
        let config = self.config_manager.get_config()?;
        if !config.is_valid() {
            return Err(ConfigError::Incomplete.into());
        }
        let question_area = config.question_area.ok_or(ConfigError::Incomplete)?;
        let next_button = config.next_button.ok_or(ConfigError::Incomplete)?;
        let labels = config.option_labels();

        // 1. 截图
        self.observer.on_status("正在截图...");
        self.observer
            .on_log(&format!("题目 {}: 开始截图", question_num));

        let image = self
            .screen_capture
            .capture_region(&question_area)
            .map_err(AppError::capture_failed)?;

        // 2. 取得答案
        let deep_hint = if use_deep_think { "（深度思考）" } else { "" };
        let answer = match self.ai_service.mode() {
            AnswerMode::Image => {
                self.observer.on_status(&with_deep_suffix(
                    "正在发送图片给AI...",
                    use_deep_think,
                ));
                self.observer.on_log(&format!(
                    "题目 {}: 正在发送图片给AI识别{}",
                    question_num, deep_hint
                ));

                self.ai_service
                    .get_answer(None, Some(&image), &labels, use_deep_think)
                    .await?
            }
            AnswerMode::Text => {
                self.observer.on_status("正在识别题目...");
                self.observer
                    .on_log(&format!("题目 {}: 正在识别文字", question_num));

                let recognizer = self
                    .text_recognizer
                    .as_ref()
                    .ok_or(ConfigError::TextModeRequiresOcr)?;
                let question_text = recognizer
                    .extract_text(&image)
                    .map_err(AppError::extraction_failed)?;
                let question_text = question_text.trim().to_string();
                if question_text.is_empty() {
                    return Err(AppError::NoTextRecognized);
                }
                self.observer.on_log(&format!(
                    "题目 {}: 识别结果 - {}...",
                    question_num,
                    truncate_text(&question_text, 50)
                ));

                self.observer.on_status(&with_deep_suffix(
                    "正在请求AI答题...",
                    use_deep_think,
                ));
                self.observer
                    .on_log(&format!("题目 {}: 正在请求AI{}", question_num, deep_hint));

                self.ai_service
                    .get_answer(Some(&question_text), None, &labels, use_deep_think)
                    .await?
            }
        };
        self.observer
            .on_log(&format!("题目 {}: AI答案 - {}", question_num, answer));

        // 3. 点击答案选项
        self.observer.on_status(&format!("正在点击答案 {}...", answer));
        self.observer
            .on_log(&format!("题目 {}: 正在点击答案 {}", question_num, answer));

        let option_coordinate = config.get_option_coordinate(&answer)?;
        self.auto_click
            .move_and_click(option_coordinate, self.move_duration())
            .map_err(AppError::click_failed)?;

        // 4. 给目标界面留出响应选中的时间
        sleep(Duration::from_millis(self.config.option_click_delay_ms)).await;

        // 5. 点击下一题
        self.observer.on_status("正在点击下一题...");
        self.observer
            .on_log(&format!("题目 {}: 正在点击下一题", question_num));

        self.auto_click
            .move_and_click(next_button, self.move_duration())
            .map_err(AppError::click_failed)?;

        // 6. 等待下一题加载，避免触发服务端频率限制
        self.observer.on_log(&format!(
            "题目 {}: 等待{}秒避免频率限制...",
            question_num,
            self.config.next_question_delay_ms / 1000
        ));
        sleep(Duration::from_millis(self.config.next_question_delay_ms)).await;

        Ok(())
    }

    /// 跳题兜底：尽力点一下"下一题"
    ///
    /// 兜底点击自身的失败被静默丢弃，不改变已经决定的跳过结果。
    async fn skip_to_next(&mut self) {
        let next_button = match self.config_manager.get_config() {
            Ok(config) => config.next_button,
            Err(_) => None,
        };

        if let Some(next_button) = next_button {
            let _ = self.auto_click.move_and_click(next_button, self.move_duration());
        }

        sleep(Duration::from_millis(self.config.skip_recovery_delay_ms)).await;
    }

    fn move_duration(&self) -> Duration {
        Duration::from_millis(self.config.move_duration_ms)
    }
}

/// 失败原因的日志前缀，与各错误领域一一对应
fn failure_label(error: &AppError) -> &'static str {
    match error {
        AppError::ExtractionFailed { .. } | AppError::NoTextRecognized => "OCR识别失败",
        AppError::Ai(_) => "AI请求失败",
        AppError::Config(ConfigError::UnknownOption { .. }) => "答案映射失败",
        AppError::CaptureFailed { .. } => "截图失败",
        AppError::ClickFailed { .. } => "点击失败",
        AppError::Config(_) => "配置错误",
    }
}

/// 深度思考模式的状态栏后缀
fn with_deep_suffix(status: &str, use_deep_think: bool) -> String {
    if use_deep_think {
        format!("{}（深度思考模式）", status)
    } else {
        status.to_string()
    }
}
