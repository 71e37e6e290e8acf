//! 错误类型定义
//!
//! 按领域划分错误枚举：配置、AI 服务、以及三个平台协作者
//! （截图 / 文字识别 / 自动点击）。
//!
//! 传播策略：单题范围内的所有错误都在流程层被捕获并转为
//! "跳过本题"，绝不中断整轮答题；只有构造期错误是致命的。

use thiserror::Error;

/// 外部协作者返回的底层错误
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// AI 服务错误
    #[error("AI服务错误: {0}")]
    Ai(#[from] AiError),

    /// 屏幕截图失败
    #[error("屏幕截图失败: {source}")]
    CaptureFailed { source: BoxedSource },

    /// OCR 文字识别失败
    #[error("文字识别失败: {source}")]
    ExtractionFailed { source: BoxedSource },

    /// OCR 识别结果为空
    #[error("未识别到题目文字")]
    NoTextRecognized,

    /// 自动点击失败
    #[error("自动点击失败: {source}")]
    ClickFailed { source: BoxedSource },
}

impl AppError {
    /// 包装截图协作者返回的错误
    pub fn capture_failed(source: anyhow::Error) -> Self {
        AppError::CaptureFailed {
            source: source.into(),
        }
    }

    /// 包装文字识别协作者返回的错误
    pub fn extraction_failed(source: anyhow::Error) -> Self {
        AppError::ExtractionFailed {
            source: source.into(),
        }
    }

    /// 包装点击协作者返回的错误
    pub fn click_failed(source: anyhow::Error) -> Self {
        AppError::ClickFailed {
            source: source.into(),
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 答题配置不完整（缺少题目区域 / 选项不足 / 缺少下一题按钮）
    #[error("配置不完整，请先完成配置")]
    Incomplete,

    /// 文字模式下未提供 OCR 识别能力
    #[error("文字模式需要提供文字识别服务")]
    TextModeRequiresOcr,

    /// 选项未配置
    #[error("未配置选项 {option}")]
    UnknownOption { option: String },

    /// 读取配置文件失败
    #[error("加载配置文件失败 ({path}): {source}")]
    LoadFailed { path: String, source: BoxedSource },

    /// 写入配置文件失败
    #[error("保存配置文件失败 ({path}): {source}")]
    SaveFailed { path: String, source: BoxedSource },
}

/// AI 服务错误
#[derive(Debug, Error)]
pub enum AiError {
    /// 图片模式下未提供图片
    #[error("图片模式下必须提供图片")]
    MissingImage,

    /// 文字模式下题目文字为空
    #[error("文字模式下题目文字为空")]
    EmptyQuestion,

    /// 图片编码失败
    #[error("图片编码失败: {source}")]
    ImageEncodeFailed {
        #[from]
        source: image::ImageError,
    },

    /// 图片上传被服务端拒绝
    #[error("图片上传失败，状态码: {status}, 错误: {body}")]
    UploadFailed { status: u16, body: String },

    /// 对话请求被服务端拒绝（可重试）
    #[error("API请求失败，状态码: {status}, 错误: {body}")]
    RequestFailed { status: u16, body: String },

    /// 网络传输失败（可重试）
    #[error("网络请求失败: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    /// AI 返回空响应
    #[error("AI返回空响应")]
    EmptyResponse,

    /// 无法从响应文本中解析出选项字母
    #[error("无法解析AI返回的答案: {response}")]
    AnswerParseFailed { response: String },

    /// 重试次数耗尽，携带最后一次的底层错误
    #[error("AI请求失败，已尝试 {attempts} 次: {source}")]
    RetryExhausted { attempts: u32, source: Box<AiError> },
}

impl AiError {
    /// 传输层与服务端失败可以重试，其余错误直接上抛
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::Transport { .. } | AiError::RequestFailed { .. }
        )
    }
}

/// 应用程序结果类型
pub type AppResult<T> = std::result::Result<T, AppError>;
