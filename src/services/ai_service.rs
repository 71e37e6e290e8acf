//! AI 答题服务 - 业务能力层
//!
//! 只负责"把一道题变成一个选项字母"的能力，不关心流程：
//! 上传截图（图片模式）、构造对话请求、携带对话 token、
//! 指数退避重试，最后从自由文本响应里解析出选项字母。
//!
//! ## 技术栈
//! - `reqwest` 直连 DoubaoFreeApi 的 HTTP 接口
//! - 远端传输抽象为 `DoubaoApi` trait，测试时可注入 mock

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AiError, AppResult};

/// 答题模式，构造时选定，整轮答题不变
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// 直接发送题目截图
    Image,
    /// 发送 OCR 识别出的题目文字
    Text,
}

/// 对话状态
///
/// 服务端可能在每次响应中轮换 token；状态只前进，不回退。
/// 生命周期为一轮答题（或到显式重置为止），不做持久化。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub conversation_id: Option<String>,
    pub section_id: Option<String>,
}

impl ConversationState {
    /// 应用服务端返回的新 token，空值不覆盖已有 token
    fn advance(&mut self, conversation_id: Option<String>, section_id: Option<String>) {
        if let Some(id) = conversation_id.filter(|id| !id.is_empty()) {
            self.conversation_id = Some(id);
        }
        if let Some(id) = section_id.filter(|id| !id.is_empty()) {
            self.section_id = Some(id);
        }
    }

    /// 清空 token，下次请求会创建新对话
    fn reset(&mut self) {
        self.conversation_id = None;
        self.section_id = None;
    }
}

/// 对话请求体
///
/// 字段与 `/api/chat/completions` 的 JSON 协议一一对应；
/// `attachments` 只在图片模式下出现。
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub prompt: String,
    /// 始终使用登录模式
    pub guest: bool,
    pub conversation_id: Option<String>,
    pub section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<JsonValue>>,
    pub use_deep_think: bool,
}

/// 对话响应体
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub section_id: Option<String>,
}

/// DoubaoFreeApi 传输接口
///
/// 生产实现是 `HttpDoubaoClient`；测试用 mock 驱动重试和
/// 对话延续逻辑。
#[async_trait]
pub trait DoubaoApi: Send + Sync {
    /// 上传图片，返回服务端的附件引用（不透明 JSON）
    async fn upload_image(
        &self,
        png_bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<JsonValue, AiError>;

    /// 发送对话请求
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AiError>;
}

/// DoubaoFreeApi 的 HTTP 客户端
pub struct HttpDoubaoClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDoubaoClient {
    /// 创建新的 HTTP 客户端，所有请求共用一个超时上限
    pub fn new(config: &Config) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl DoubaoApi for HttpDoubaoClient {
    async fn upload_image(
        &self,
        png_bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<JsonValue, AiError> {
        let url = format!("{}/api/file/upload", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[("file_type", "1"), ("file_name", file_name)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(png_bytes)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json::<JsonValue>().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AiError::UploadFailed {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AiError> {
        let url = format!("{}/api/chat/completions", self.base_url);

        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json::<ChatResponse>().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AiError::RequestFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// AI 答题服务
///
/// 职责：
/// - 把截图或题目文字发给远端服务，拿回一个选项字母
/// - 维护对话 token（复用同一个对话）
/// - 传输层失败时指数退避重试
/// - 不认识坐标，不点击，不关心流程顺序
pub struct AiAnswerService {
    api: Box<dyn DoubaoApi>,
    mode: AnswerMode,
    max_retries: u32,
    retry_base: Duration,
    conversation: ConversationState,
}

impl AiAnswerService {
    /// 用指定传输创建服务（测试入口）
    pub fn new(
        api: Box<dyn DoubaoApi>,
        mode: AnswerMode,
        max_retries: u32,
        retry_base: Duration,
    ) -> Self {
        Self {
            api,
            mode,
            max_retries,
            retry_base,
            conversation: ConversationState::default(),
        }
    }

    /// 按运行配置创建使用 HTTP 传输的服务
    pub fn with_http(config: &Config) -> AppResult<Self> {
        let mode = if config.use_image_mode {
            AnswerMode::Image
        } else {
            AnswerMode::Text
        };
        let api = HttpDoubaoClient::new(config)?;

        info!(
            "AI答题服务初始化完成，服务地址: {}, 图片模式: {}",
            config.api_base_url, config.use_image_mode
        );

        Ok(Self::new(
            Box::new(api),
            mode,
            config.max_retries,
            Duration::from_millis(config.retry_base_ms),
        ))
    }

    pub fn mode(&self) -> AnswerMode {
        self.mode
    }

    /// 当前对话状态（测试与诊断用）
    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    /// 重置对话，下次请求会创建新对话
    ///
    /// 由编排方在检测到频率限制后调用，不会自动触发。
    pub fn reset_conversation(&mut self) {
        self.conversation.reset();
        info!("已重置对话ID，将创建新对话");
    }

    /// 获取题目答案
    ///
    /// # 参数
    /// - `question`: 题目文字（文字模式使用）
    /// - `image`: 题目截图（图片模式使用）
    /// - `labels`: 已配置的选项标签集合（如 "ABCD"）
    /// - `use_deep_think`: 是否使用深度思考
    ///
    /// # 返回
    /// 选项字母（大写单字符），如 "A"、"B"
    pub async fn get_answer(
        &mut self,
        question: Option<&str>,
        image: Option<&DynamicImage>,
        labels: &str,
        use_deep_think: bool,
    ) -> AppResult<String> {
        let request = self.build_request(question, image, labels, use_deep_think).await?;

        let response = self.chat_with_retry(&request).await?;

        // 保存服务端返回的 token，用于下次请求
        self.conversation
            .advance(response.conversation_id, response.section_id);

        if response.text.trim().is_empty() {
            return Err(AiError::EmptyResponse.into());
        }

        let answer = parse_answer(&response.text, labels)?;
        info!("AI答题成功，答案: {}", answer);
        Ok(answer)
    }

    /// 根据模式构造请求体（图片模式先上传截图）
    async fn build_request(
        &self,
        question: Option<&str>,
        image: Option<&DynamicImage>,
        labels: &str,
        use_deep_think: bool,
    ) -> Result<ChatRequest, AiError> {
        let label_hint = join_labels(labels);

        let (prompt, attachments) = match self.mode {
            AnswerMode::Image => {
                let image = image.ok_or(AiError::MissingImage)?;
                let png_bytes = encode_png(image)?;
                debug!("正在上传题目截图，{} 字节", png_bytes.len());

                let attachment = self.api.upload_image(png_bytes, "question.png").await?;
                info!("图片上传成功");

                let prompt = format!(
                    "请识别图片中的选择题，并直接回答选项字母（{}），只需要回答字母，不要解释。",
                    label_hint
                );
                (prompt, Some(vec![attachment]))
            }
            AnswerMode::Text => {
                let question = question
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .ok_or(AiError::EmptyQuestion)?;

                let prompt = format!(
                    "请回答以下选择题，只需要回答选项字母（{}）：\n{}",
                    label_hint, question
                );
                (prompt, None)
            }
        };

        Ok(ChatRequest {
            prompt,
            guest: false,
            conversation_id: self.conversation.conversation_id.clone(),
            section_id: self.conversation.section_id.clone(),
            attachments,
            use_deep_think,
        })
    }

    /// 带指数退避的对话调用
    ///
    /// 退避间隔从 `retry_base` 开始逐次翻倍（1秒、2秒、4秒）。
    async fn chat_with_retry(&self, request: &ChatRequest) -> Result<ChatResponse, AiError> {
        let mut attempt = 0u32;

        loop {
            match self.api.chat(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let wait = self.retry_base * 2u32.saturating_pow(attempt);
                    warn!(
                        "AI请求失败 (尝试 {}/{}): {}，{:?} 后重试",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    error!("AI请求失败，已达最大重试次数: {}", e);
                    return Err(AiError::RetryExhausted {
                        attempts: attempt + 1,
                        source: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 从 AI 响应文本中解析答案选项
///
/// 优先匹配作为独立单词出现的选项字母；找不到再退回
/// 文本中第一个出现的选项字母。不区分大小写，统一转大写。
pub fn parse_answer(response_text: &str, labels: &str) -> AppResult<String> {
    let parse_failed = || AiError::AnswerParseFailed {
        response: response_text.to_string(),
    };

    if labels.is_empty() {
        return Err(parse_failed().into());
    }

    let class: String = labels
        .chars()
        .map(|c| regex::escape(&c.to_string()))
        .collect();

    if let Ok(word_re) = RegexBuilder::new(&format!(r"\b[{}]\b", class))
        .case_insensitive(true)
        .build()
    {
        if let Some(matched) = word_re.find(response_text) {
            return Ok(matched.as_str().to_ascii_uppercase());
        }
    }

    // 兜底：文本中第一个出现的选项字母
    let labels_upper: Vec<char> = labels.chars().map(|c| c.to_ascii_uppercase()).collect();
    for ch in response_text.chars() {
        let upper = ch.to_ascii_uppercase();
        if labels_upper.contains(&upper) {
            return Ok(upper.to_string());
        }
    }

    warn!("无法从响应中解析答案: {}", response_text);
    Err(parse_failed().into())
}

/// 把标签集合拼成提示词里的提示（"A/B/C/D"）
fn join_labels(labels: &str) -> String {
    labels
        .chars()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// 把截图编码为 PNG 字节
fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, AiError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// 脚本化的 mock 传输：按序吐出预设响应并记录收到的请求
    struct MockApi {
        responses: Mutex<VecDeque<Result<ChatResponse, AiError>>>,
        requests: Mutex<Vec<ChatRequest>>,
        uploads: Mutex<usize>,
    }

    impl MockApi {
        fn new(responses: Vec<Result<ChatResponse, AiError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
                uploads: Mutex::new(0),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn upload_count(&self) -> usize {
            *self.uploads.lock().unwrap()
        }
    }

    #[async_trait]
    impl DoubaoApi for Arc<MockApi> {
        async fn upload_image(
            &self,
            _png_bytes: Vec<u8>,
            _file_name: &str,
        ) -> Result<JsonValue, AiError> {
            *self.uploads.lock().unwrap() += 1;
            Ok(serde_json::json!({"key": "attachment-1"}))
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AiError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("mock 响应已耗尽")
        }
    }

    fn text_response(text: &str) -> Result<ChatResponse, AiError> {
        Ok(ChatResponse {
            text: text.to_string(),
            ..ChatResponse::default()
        })
    }

    fn server_error() -> Result<ChatResponse, AiError> {
        Err(AiError::RequestFailed {
            status: 500,
            body: "internal error".to_string(),
        })
    }

    fn text_service(api: Arc<MockApi>) -> AiAnswerService {
        AiAnswerService::new(
            Box::new(api),
            AnswerMode::Text,
            3,
            Duration::from_millis(1),
        )
    }

    // ========== 答案解析 ==========

    #[test]
    fn test_parse_answer_standalone_word() {
        assert_eq!(parse_answer("The answer is B.", "ABCD").unwrap(), "B");
    }

    #[test]
    fn test_parse_answer_lowercase() {
        assert_eq!(parse_answer("b", "ABCD").unwrap(), "B");
    }

    #[test]
    fn test_parse_answer_first_standalone_wins() {
        assert_eq!(parse_answer("A or C", "ABCD").unwrap(), "A");
    }

    #[test]
    fn test_parse_answer_fallback_to_any_occurrence() {
        // 没有独立单词时退回首个出现的选项字母
        assert_eq!(parse_answer("答案是C选项", "ABCD").unwrap(), "C");
    }

    #[test]
    fn test_parse_answer_no_label() {
        let err = parse_answer("no valid option here", "ABCD").unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Ai(AiError::AnswerParseFailed { .. })
        ));
    }

    #[test]
    fn test_parse_answer_custom_labels() {
        assert_eq!(parse_answer("我选 F", "EF").unwrap(), "F");
        assert!(parse_answer("我选 A", "EF").is_err());
    }

    // ========== 对话状态 ==========

    #[test]
    fn test_conversation_advance_forward_only() {
        let mut state = ConversationState::default();

        state.advance(Some("conv-1".to_string()), Some("sect-1".to_string()));
        assert_eq!(state.conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(state.section_id.as_deref(), Some("sect-1"));

        // 响应里没有 token 时不清空已有值
        state.advance(None, None);
        assert_eq!(state.conversation_id.as_deref(), Some("conv-1"));

        // 空字符串同样不覆盖
        state.advance(Some(String::new()), None);
        assert_eq!(state.conversation_id.as_deref(), Some("conv-1"));

        state.advance(Some("conv-2".to_string()), None);
        assert_eq!(state.conversation_id.as_deref(), Some("conv-2"));
        assert_eq!(state.section_id.as_deref(), Some("sect-1"));

        state.reset();
        assert_eq!(state, ConversationState::default());
    }

    // ========== 重试 ==========

    #[tokio::test]
    async fn test_retry_succeeds_on_third_attempt() {
        // 前两次瞬时失败，第三次成功
        let api = MockApi::new(vec![server_error(), server_error(), text_response("B")]);
        let mut service = text_service(api.clone());

        let answer = service
            .get_answer(Some("1+1=?"), None, "ABCD", false)
            .await
            .unwrap();

        assert_eq!(answer, "B");
        assert_eq!(api.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        // 预算 3 次重试 = 4 次尝试，全部失败
        let api = MockApi::new(vec![
            server_error(),
            server_error(),
            server_error(),
            server_error(),
        ]);
        let mut service = text_service(api.clone());

        let err = service
            .get_answer(Some("1+1=?"), None, "ABCD", false)
            .await
            .unwrap_err();

        assert_eq!(api.requests().len(), 4);
        match err {
            crate::error::AppError::Ai(AiError::RetryExhausted { attempts, source }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*source, AiError::RequestFailed { status: 500, .. }));
            }
            other => panic!("意外的错误类型: {}", other),
        }
    }

    #[tokio::test]
    async fn test_unparsable_answer_not_retried() {
        let api = MockApi::new(vec![text_response("这道题我不会")]);
        let mut service = text_service(api.clone());

        let err = service
            .get_answer(Some("1+1=?"), None, "ABCD", false)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::AppError::Ai(AiError::AnswerParseFailed { .. })
        ));
        assert_eq!(api.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_not_retried() {
        let api = MockApi::new(vec![text_response("   ")]);
        let mut service = text_service(api.clone());

        let err = service
            .get_answer(Some("1+1=?"), None, "ABCD", false)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::AppError::Ai(AiError::EmptyResponse)
        ));
        assert_eq!(api.requests().len(), 1);
    }

    // ========== 输入校验 ==========

    #[test]
    fn test_invalid_inputs() {
        // 图片模式缺图片
        let api = MockApi::new(vec![]);
        let mut service = AiAnswerService::new(
            Box::new(api),
            AnswerMode::Image,
            3,
            Duration::from_millis(1),
        );
        let err = tokio_test::block_on(service.get_answer(None, None, "ABCD", false)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Ai(AiError::MissingImage)
        ));

        // 文字模式空白题干
        let api = MockApi::new(vec![]);
        let mut service = text_service(api);
        let err =
            tokio_test::block_on(service.get_answer(Some("  \n"), None, "ABCD", false)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Ai(AiError::EmptyQuestion)
        ));
    }

    // ========== 对话延续 ==========

    #[tokio::test]
    async fn test_conversation_tokens_carried_forward() {
        let api = MockApi::new(vec![
            Ok(ChatResponse {
                text: "A".to_string(),
                conversation_id: Some("conv-9".to_string()),
                section_id: Some("sect-9".to_string()),
            }),
            text_response("B"),
            text_response("C"),
        ]);
        let mut service = text_service(api.clone());

        // 第一次请求：还没有 token
        service.get_answer(Some("q1"), None, "ABCD", false).await.unwrap();
        assert_eq!(
            service.conversation().conversation_id.as_deref(),
            Some("conv-9")
        );
        // 第二次请求：携带服务端轮换出的 token
        service.get_answer(Some("q2"), None, "ABCD", false).await.unwrap();

        let requests = api.requests();
        assert_eq!(requests[0].conversation_id, None);
        assert_eq!(requests[1].conversation_id.as_deref(), Some("conv-9"));
        assert_eq!(requests[1].section_id.as_deref(), Some("sect-9"));

        // 重置后重新开始新对话
        service.reset_conversation();
        service.get_answer(Some("q3"), None, "ABCD", false).await.unwrap();
        assert_eq!(api.requests()[2].conversation_id, None);
        assert_eq!(api.requests()[2].section_id, None);
    }

    // ========== 请求体形状 ==========

    #[tokio::test]
    async fn test_image_mode_uploads_and_attaches() {
        let api = MockApi::new(vec![text_response("D")]);
        let mut service = AiAnswerService::new(
            Box::new(api.clone()),
            AnswerMode::Image,
            3,
            Duration::from_millis(1),
        );

        let image = DynamicImage::new_rgba8(4, 4);
        let answer = service
            .get_answer(None, Some(&image), "ABCD", true)
            .await
            .unwrap();

        assert_eq!(answer, "D");
        assert_eq!(api.upload_count(), 1);

        let request = &api.requests()[0];
        assert!(request.use_deep_think);
        assert!(!request.guest);
        assert_eq!(request.attachments.as_ref().map(Vec::len), Some(1));
        assert!(request.prompt.contains("A/B/C/D"));
    }

    #[tokio::test]
    async fn test_text_mode_payload_omits_attachments() {
        let api = MockApi::new(vec![text_response("A")]);
        let mut service = text_service(api.clone());

        service
            .get_answer(Some("中国的首都是哪里？"), None, "ABCD", false)
            .await
            .unwrap();

        let request = &api.requests()[0];
        assert!(request.prompt.contains("中国的首都是哪里？"));

        // 文字模式的 JSON 里不应出现 attachments 键
        let value = serde_json::to_value(request).unwrap();
        assert!(value.get("attachments").is_none());
        assert!(value["conversation_id"].is_null());
        assert_eq!(value["guest"], serde_json::json!(false));
    }

    // ========== 真实服务连通性 ==========

    /// 需要本地启动 DoubaoFreeApi 服务后手动运行：
    /// cargo test test_live_text_answer -- --ignored --nocapture
    #[tokio::test]
    #[ignore]
    async fn test_live_text_answer() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config {
            use_image_mode: false,
            ..Config::from_env()
        };
        let mut service = AiAnswerService::with_http(&config).unwrap();

        let answer = service
            .get_answer(
                Some("中国的首都是哪里？\nA. 上海\nB. 北京\nC. 广州\nD. 深圳"),
                None,
                "ABCD",
                false,
            )
            .await
            .expect("AI 调用失败");

        println!("AI答案: {}", answer);
        assert_eq!(answer.len(), 1);
    }
}
