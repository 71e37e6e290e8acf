//! 答题坐标配置数据模型
//!
//! 纯数据 + 校验，不做任何 IO；序列化形状与磁盘上的 JSON 配置文件一致。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ConfigError};

/// 屏幕区域（左上角坐标 + 尺寸）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// 坐标点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// 答题配置
///
/// 字段名即磁盘 JSON 的字段名，缺失的区域/按钮序列化为 null。
/// 选项用 BTreeMap 保证标签顺序稳定（A、B、C、D...）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    /// 题目截图区域
    pub question_area: Option<Region>,
    /// 选项标签 -> 点击坐标
    pub options: BTreeMap<String, Coordinate>,
    /// "下一题"按钮坐标
    pub next_button: Option<Coordinate>,
}

impl AnswerConfig {
    /// 检查配置是否完整可用
    ///
    /// 可用条件：题目区域存在且尺寸非零、至少 2 个选项、下一题按钮存在。
    pub fn is_valid(&self) -> bool {
        self.question_area
            .map_or(false, |area| area.width > 0 && area.height > 0)
            && self.options.len() >= 2
            && self.next_button.is_some()
    }

    /// 获取选项坐标
    pub fn get_option_coordinate(&self, option: &str) -> AppResult<Coordinate> {
        self.options.get(option).copied().ok_or_else(|| {
            ConfigError::UnknownOption {
                option: option.to_string(),
            }
            .into()
        })
    }

    /// 已配置的选项标签集合，统一为大写单字符
    ///
    /// 同时用于构造提示词（A/B/C/D）和解析 AI 响应。
    pub fn option_labels(&self) -> String {
        self.options
            .keys()
            .filter_map(|k| k.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }
}
