//! 坐标配置管理 - 业务能力层
//!
//! 负责答题坐标配置的加载、保存和修改；所有修改立即落盘。
//! 配置文件是一个小 JSON 文档，单线程访问，直接用同步 IO。

use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::{AppResult, ConfigError};
use crate::models::{AnswerConfig, Coordinate, Region};

/// 配置管理器
pub struct ConfigManager {
    config_file: PathBuf,
    config: Option<AnswerConfig>,
}

impl ConfigManager {
    /// 创建新的配置管理器，不立即读盘
    pub fn new(config_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
            config: None,
        }
    }

    /// 加载配置文件
    ///
    /// 文件不存在时使用默认（空）配置，不算错误。
    pub fn load_config(&mut self) -> AppResult<()> {
        if !self.config_file.exists() {
            warn!(
                "配置文件不存在: {}，使用默认配置",
                self.config_file.display()
            );
            self.config = Some(AnswerConfig::default());
            return Ok(());
        }

        let path = self.config_file.display().to_string();
        let contents = fs::read_to_string(&self.config_file).map_err(|e| {
            ConfigError::LoadFailed {
                path: path.clone(),
                source: Box::new(e),
            }
        })?;
        let config: AnswerConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::LoadFailed {
                path: path.clone(),
                source: Box::new(e),
            })?;

        info!("成功加载配置文件: {}", path);
        self.config = Some(config);
        Ok(())
    }

    /// 保存当前配置到文件
    pub fn save_config(&self) -> AppResult<()> {
        let config = self.config.clone().unwrap_or_default();
        let path = self.config_file.display().to_string();

        let contents =
            serde_json::to_string_pretty(&config).map_err(|e| ConfigError::SaveFailed {
                path: path.clone(),
                source: Box::new(e),
            })?;
        fs::write(&self.config_file, contents).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            source: Box::new(e),
        })?;

        info!("成功保存配置文件: {}", path);
        Ok(())
    }

    /// 设置题目截图区域并落盘
    pub fn set_question_area(&mut self, area: Region) -> AppResult<()> {
        self.config_mut().question_area = Some(area);
        self.save_config()?;
        info!(
            "设置题目区域: ({}, {}, {}, {})",
            area.x, area.y, area.width, area.height
        );
        Ok(())
    }

    /// 设置答案选项坐标并落盘
    pub fn set_option(&mut self, option: impl Into<String>, coordinate: Coordinate) -> AppResult<()> {
        let option = option.into();
        self.config_mut().options.insert(option.clone(), coordinate);
        self.save_config()?;
        info!(
            "设置选项 {} 坐标: ({}, {})",
            option, coordinate.x, coordinate.y
        );
        Ok(())
    }

    /// 设置"下一题"按钮坐标并落盘
    pub fn set_next_button(&mut self, coordinate: Coordinate) -> AppResult<()> {
        self.config_mut().next_button = Some(coordinate);
        self.save_config()?;
        info!("设置下一题按钮坐标: ({}, {})", coordinate.x, coordinate.y);
        Ok(())
    }

    /// 获取当前配置的快照
    ///
    /// 未加载时先读盘；答题流程每道题取一次快照，题目进行中
    /// 不会观察到配置变化。
    pub fn get_config(&mut self) -> AppResult<AnswerConfig> {
        if self.config.is_none() {
            self.load_config()?;
        }
        Ok(self.config.clone().unwrap_or_default())
    }

    fn config_mut(&mut self) -> &mut AnswerConfig {
        self.config.get_or_insert_with(AnswerConfig::default)
    }
}
