//! 编排层（Orchestration Layer）
//!
//! 驱动整轮答题：题目边界上的停止检查、进度汇报、
//! 完成通知。单题细节全部委托给 `workflow::AnswerFlow`。
//!
//! ```text
//! orchestrator::AnswerController (1..=N 题循环)
//!     ↓
//! workflow::AnswerFlow (单题流程)
//!     ↓
//! services (能力层：AI 答题 / 坐标配置)
//!     ↓
//! infrastructure (平台协作者接口：截图 / OCR / 点击)
//! ```

pub mod answer_controller;

pub use answer_controller::{AnswerController, RunState, StopHandle};
