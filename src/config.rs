// 该文件是 Tuice （推测） 项目的一部分。
// src/config.rs - 数据集配置文件
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("配置文件不存在: {0}")]
  NotFound(PathBuf),
  #[error("无法读取配置文件 {0}: {1}")]
  Io(PathBuf, std::io::Error),
  #[error("配置文件解析失败 {0}: {1}")]
  Parse(PathBuf, serde_yaml::Error),
  #[error("配置文件缺少 '{0}' 字段")]
  MissingField(&'static str),
}

/// 数据集划分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
  Train,
  Val,
  Test,
}

impl Split {
  pub fn key(&self) -> &'static str {
    match self {
      Split::Train => "train",
      Split::Val => "val",
      Split::Test => "test",
    }
  }
}

impl fmt::Display for Split {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.key())
  }
}

/// 类别名称，可写作列表或 `id: name` 映射
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum ClassNames {
  #[default]
  #[serde(skip)]
  Empty,
  List(Vec<String>),
  Map(BTreeMap<u32, String>),
}

impl ClassNames {
  pub fn name(&self, class_id: u32) -> Option<&str> {
    match self {
      ClassNames::Empty => None,
      ClassNames::List(names) => names.get(class_id as usize).map(String::as_str),
      ClassNames::Map(names) => names.get(&class_id).map(String::as_str),
    }
  }

  /// 找不到名称时退回到类别编号
  pub fn label(&self, class_id: u32) -> String {
    self
      .name(class_id)
      .map(str::to_string)
      .unwrap_or_else(|| class_id.to_string())
  }

  pub fn len(&self) -> usize {
    match self {
      ClassNames::Empty => 0,
      ClassNames::List(names) => names.len(),
      ClassNames::Map(names) => names.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// YOLO 风格的数据集配置（`yolo_params.yaml`）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataConfig {
  #[serde(default)]
  pub path: Option<String>,
  #[serde(default)]
  pub train: Option<String>,
  #[serde(default)]
  pub val: Option<String>,
  #[serde(default)]
  pub test: Option<String>,
  #[serde(default)]
  pub nc: Option<usize>,
  #[serde(default)]
  pub names: ClassNames,
}

impl DataConfig {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    if !path.is_file() {
      return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content =
      std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    let config = Self::parse(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
    debug!("配置文件内容: {:?}", config);
    if let Some(nc) = config.class_count_mismatch() {
      warn!("nc = {} 与 names 中的 {} 个类别不一致", nc, config.names.len());
    }
    Ok(config)
  }

  pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
    // 空文件按空映射处理
    if content.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(content)
  }

  /// `nc` 与非空 `names` 数量不一致时返回 `nc`
  pub fn class_count_mismatch(&self) -> Option<usize> {
    self
      .nc
      .filter(|&nc| !self.names.is_empty() && nc != self.names.len())
  }

  /// 数据集根目录：`path` 非空时拼接到 `root` 上
  pub fn dataset_root(&self, root: &Path) -> PathBuf {
    match self.path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
      Some(path) => root.join(path),
      None => root.to_path_buf(),
    }
  }

  fn split_field(&self, split: Split) -> Option<&str> {
    let value = match split {
      Split::Train => self.train.as_deref(),
      Split::Val => self.val.as_deref(),
      Split::Test => self.test.as_deref(),
    };
    value.map(str::trim).filter(|v| !v.is_empty())
  }

  /// 解析划分目录，相对路径基于数据集根目录
  pub fn split_dir(&self, split: Split, root: &Path) -> Result<PathBuf, ConfigError> {
    let field = self
      .split_field(split)
      .ok_or(ConfigError::MissingField(split.key()))?;
    Ok(self.dataset_root(root).join(field))
  }
}
