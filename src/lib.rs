//! # Auto Answer
//!
//! 自动答题核心库：截取屏幕上固定区域的选择题，交给远端
//! AI 服务判断答案，再合成鼠标点击选中选项并进入下一题，
//! 按指定题数循环。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 平台协作者接口，只定义能力
//! - `ScreenCapture` / `TextRecognizer` / `AutoClick` - 由宿主提供实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个题目
//! - `AiAnswerService` - AI 答题能力（上传/对话/重试/解析）
//! - `ConfigManager` - 坐标配置的读写能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的完整处理流程
//! - `AnswerFlow` - 截图 → 识别/问答 → 点击 → 翻页，含失败兜底
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/` - 整轮答题循环、运行状态和停止语义
//! - `AnswerController` - 按题数驱动流程，汇报进度和完成
//!
//! 界面层不在本 crate 内：宿主通过 `AnswerObserver` 接收
//! 状态/进度/日志/完成通知。
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod observer;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AiError, AppError, AppResult, ConfigError};
pub use infrastructure::{AutoClick, ScreenCapture, TextRecognizer};
pub use models::{AnswerConfig, Coordinate, Region};
pub use observer::{AnswerObserver, TracingObserver};
pub use orchestrator::{AnswerController, RunState, StopHandle};
pub use services::{AiAnswerService, AnswerMode, ConfigManager, ConversationState, DoubaoApi};
pub use workflow::AnswerFlow;
