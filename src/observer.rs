//! 答题过程观察者接口
//!
//! 核心层不依赖任何展示层；GUI 或其他宿主通过实现本接口
//! 接收状态、进度和日志通知。所有回调都是即发即忘，没有
//! 返回值，也不允许阻塞答题流程。

use tracing::info;

/// 答题过程观察者
///
/// 四个回调都提供空默认实现，宿主只需覆盖自己关心的部分。
pub trait AnswerObserver: Send + Sync {
    /// 当前状态变化（如"正在截图..."、"答题中..."、"完成"）
    fn on_status(&self, _status: &str) {}

    /// 进度更新（当前题号 / 总题数）
    fn on_progress(&self, _current: usize, _total: usize) {}

    /// 过程日志
    fn on_log(&self, _message: &str) {}

    /// 整轮答题结束（自然完成或被停止都会触发，且只触发一次）
    fn on_complete(&self) {}
}

/// 把所有通知转发到 tracing 日志的观察者
///
/// 无界面运行时的默认选择。
#[derive(Debug, Default)]
pub struct TracingObserver;

impl AnswerObserver for TracingObserver {
    fn on_status(&self, status: &str) {
        info!("状态: {}", status);
    }

    fn on_progress(&self, current: usize, total: usize) {
        info!("进度: {}/{}", current, total);
    }

    fn on_log(&self, message: &str) {
        info!("{}", message);
    }

    fn on_complete(&self) {
        info!("答题流程结束");
    }
}
