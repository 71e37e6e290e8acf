//! 平台协作者接口 - 基础设施层
//!
//! 截图、文字识别、自动点击都是平台相关的稀缺能力，
//! 本 crate 只定义接口，不提供实现；实现方在进程启动时
//! 完成自身的初始化（初始化失败属于致命错误，发生在任何
//! 答题流程开始之前）。
//!
//! 三个接口都是同步调用：协作者内部不涉及网络，单次调用
//! 耗时可控，流程层在逻辑单线程上顺序使用它们。

use std::time::Duration;

use anyhow::Result;
use image::DynamicImage;

use crate::models::{Coordinate, Region};

/// 屏幕截图能力
pub trait ScreenCapture: Send + Sync {
    /// 截取指定区域的屏幕，平台返回不了图像时报错
    fn capture_region(&self, region: &Region) -> Result<DynamicImage>;
}

/// OCR 文字识别能力
pub trait TextRecognizer: Send + Sync {
    /// 从图像中提取文字，清理后为空视为识别失败
    fn extract_text(&self, image: &DynamicImage) -> Result<String>;
}

/// 自动点击能力
pub trait AutoClick: Send + Sync {
    /// 在目标坐标直接点击
    fn click(&self, target: Coordinate) -> Result<()>;

    /// 平滑移动鼠标到目标坐标并点击
    ///
    /// `duration` 是移动过程的时长提示，目标界面对瞬移点击
    /// 可能不响应。
    fn move_and_click(&self, target: Coordinate, duration: Duration) -> Result<()>;
}
