//! 答题控制器 - 编排层
//!
//! ## 职责
//!
//! 1. **整轮驱动**：按题号 1..=N 顺序调用单题流程，一题
//!    完整结束（或失败消化完）后才开始下一题
//! 2. **运行状态**：维护 `RunState`（运行标志 / 当前题号 /
//!    总题数），运行标志是唯一的取消信号
//! 3. **协作式停止**：停止请求只写一个标志位，在每道题
//!    开始前检查；进行中的截图/请求/点击不会被打断
//! 4. **通知**：状态、进度、完成回调都从这里发出，完成
//!    回调无论自然结束还是被停止都恰好触发一次
//!
//! 整个编排在一条逻辑执行流上顺序推进，共享状态只有
//! `RunState` 的原子字段，不需要额外加锁。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::observer::AnswerObserver;
use crate::workflow::AnswerFlow;

/// 一轮答题的运行状态
#[derive(Debug, Default)]
pub struct RunState {
    running: AtomicBool,
    current_question: AtomicUsize,
    total: AtomicUsize,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 当前已完成到第几题（0 表示还没答完任何题）
    pub fn current_question(&self) -> usize {
        self.current_question.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// 请求停止答题
    ///
    /// 在下一道题开始前生效；正在进行中的题目会完整跑完
    /// 自己的点击序列。
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn begin(&self, total: usize) {
        self.running.store(true, Ordering::SeqCst);
        self.current_question.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    fn advance(&self, current: usize) {
        self.current_question.store(current, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// 停止答题的外部句柄
///
/// 答题循环占用着控制器本身，外部（如界面的停止按钮）
/// 通过这个句柄发出停止请求。
#[derive(Clone)]
pub struct StopHandle {
    state: Arc<RunState>,
    observer: Arc<dyn AnswerObserver>,
}

impl StopHandle {
    /// 停止答题流程
    pub fn stop(&self) {
        self.state.request_stop();
        self.observer.on_status("已停止");
        self.observer.on_log("用户停止答题");
        info!("答题流程已停止");
    }
}

/// 答题控制器
pub struct AnswerController {
    flow: AnswerFlow,
    state: Arc<RunState>,
    observer: Arc<dyn AnswerObserver>,
}

impl AnswerController {
    /// 创建新的答题控制器
    pub fn new(flow: AnswerFlow, observer: Arc<dyn AnswerObserver>) -> Self {
        Self {
            flow,
            state: Arc::new(RunState::default()),
            observer,
        }
    }

    /// 运行状态句柄
    pub fn run_state(&self) -> Arc<RunState> {
        Arc::clone(&self.state)
    }

    /// 停止句柄
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: Arc::clone(&self.state),
            observer: Arc::clone(&self.observer),
        }
    }

    /// 开始答题流程
    ///
    /// # 参数
    /// - `total_questions`: 题目总数
    /// - `use_deep_think`: 是否使用深度思考
    pub async fn start_answering(&mut self, total_questions: usize, use_deep_think: bool) {
        self.state.begin(total_questions);

        let mode_hint = if use_deep_think {
            "（深度思考模式）"
        } else {
            ""
        };
        self.observer
            .on_log(&format!("开始答题，共 {} 题{}", total_questions, mode_hint));
        self.observer.on_status("答题中...");

        let mut answered = 0usize;

        for question_num in 1..=total_questions {
            // 停止检查只发生在题目边界
            if !self.state.is_running() {
                self.observer.on_log("答题已停止");
                break;
            }

            if self.flow.answer_one_question(question_num, use_deep_think).await {
                answered += 1;
            }

            self.state.advance(question_num);
            self.observer.on_progress(question_num, total_questions);

            if question_num == total_questions {
                self.observer.on_log("所有题目已完成！");
                self.observer.on_status("完成");
            }
        }

        info!("本轮答题结束: 成功 {}/{}", answered, total_questions);

        self.state.finish();
        self.observer.on_complete();
    }
}
