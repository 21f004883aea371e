// 该文件是 Tuice （推测） 项目的一部分。
// src/settings.rs - 运行参数
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

use std::path::{Path, PathBuf};

use crate::model::ModelOptions;

pub const CONFIG_FILE_NAME: &str = "yolo_params.yaml";
pub const RUNS_DIR_NAME: &str = "runs";
pub const RUN_DIR_PREFIX: &str = "detect";
pub const OUTPUT_DIR_NAME: &str = "predictions";
pub const EVAL_DIR_NAME: &str = "val";
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

/// 一次完整运行所需的全部参数，路径均相对于 `root`
#[derive(Debug, Clone)]
pub struct Settings {
  pub root: PathBuf,
  pub config_file: PathBuf,
  pub runs_dir: PathBuf,
  pub run_prefix: String,
  pub output_dir: PathBuf,
  pub confidence: f32,
  pub model: ModelOptions,
  pub font: Option<PathBuf>,
  pub evaluate: bool,
}

impl Settings {
  pub fn with_root(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      config_file: PathBuf::from(CONFIG_FILE_NAME),
      runs_dir: PathBuf::from(RUNS_DIR_NAME),
      run_prefix: RUN_DIR_PREFIX.to_string(),
      output_dir: PathBuf::from(OUTPUT_DIR_NAME),
      confidence: CONFIDENCE_THRESHOLD,
      model: ModelOptions::default(),
      font: None,
      evaluate: true,
    }
  }

  fn resolve(&self, path: &Path) -> PathBuf {
    self.root.join(path)
  }

  pub fn config_path(&self) -> PathBuf {
    self.resolve(&self.config_file)
  }

  pub fn runs_path(&self) -> PathBuf {
    self.resolve(&self.runs_dir)
  }

  pub fn output_path(&self) -> PathBuf {
    self.resolve(&self.output_dir)
  }

  pub fn eval_path(&self) -> PathBuf {
    self.runs_path().join(EVAL_DIR_NAME)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_layout_follows_root() {
    let settings = Settings::with_root("/srv/job");
    assert_eq!(settings.config_path(), PathBuf::from("/srv/job/yolo_params.yaml"));
    assert_eq!(settings.runs_path(), PathBuf::from("/srv/job/runs"));
    assert_eq!(settings.output_path(), PathBuf::from("/srv/job/predictions"));
    assert_eq!(settings.eval_path(), PathBuf::from("/srv/job/runs/val"));
    assert_eq!(settings.confidence, 0.5);
    assert!(settings.evaluate);
  }

  #[test]
  fn eval_dir_never_matches_run_prefix() {
    assert!(!EVAL_DIR_NAME.starts_with(RUN_DIR_PREFIX));
  }
}
