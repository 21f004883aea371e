// 该文件是 Tuice （推测） 项目的一部分。
// src/eval.rs - 数据集划分上的精度评估
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

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::{ConfigError, DataConfig, Split},
  input::{ImageDirInput, ImageFileInputError, InputError},
  model::Model,
  settings::CONFIDENCE_THRESHOLD,
};

pub mod ground_truth;
pub mod metrics;
pub mod report;

pub use self::ground_truth::GroundTruth;
pub use self::metrics::{ClassMetrics, MatchStats};
pub use self::report::{ClassReport, EvalReport};

/// 评估时保留几乎全部候选框，以得到完整的 PR 曲线
pub const EVAL_CONFIDENCE: f32 = 0.001;

const IMAGES_DIR_NAME: &str = "images";
const LABELS_DIR_NAME: &str = "labels";

#[derive(Error, Debug)]
pub enum EvalError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("输入错误: {0}")]
  Input(#[from] InputError),
  #[error("图像读取错误: {0}")]
  ImageFile(#[from] ImageFileInputError),
  #[error("标注文件 {0} 第 {1} 行无效: {2}")]
  Label(PathBuf, usize, String),
  #[error("I/O 错误 {0}: {1}")]
  Io(PathBuf, std::io::Error),
  #[error("模型错误: {0}")]
  Model(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("无法序列化评估报告 {0}: {1}")]
  Report(PathBuf, serde_json::Error),
}

/// 在带标注的划分上运行模型并统计 P、R、mAP50、mAP50-95
#[derive(Debug, Clone)]
pub struct Validator {
  root: PathBuf,
  confidence: f32,
  report_confidence: f32,
}

impl Validator {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      confidence: EVAL_CONFIDENCE,
      report_confidence: CONFIDENCE_THRESHOLD,
    }
  }

  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn report_confidence(mut self, confidence: f32) -> Self {
    self.report_confidence = confidence;
    self
  }

  /// 重新读取数据集配置；图像取自 `<split>/images`，标注取自同级 `<split>/labels/<stem>.txt`
  pub fn validate<M: Model>(
    &self,
    model: &mut M,
    config_path: &Path,
    split: Split,
  ) -> Result<EvalReport, EvalError> {
    let config = DataConfig::load(config_path)?;
    let split_dir = config.split_dir(split, &self.root)?;
    let input = ImageDirInput::open(&split_dir.join(IMAGES_DIR_NAME))?;
    let labels_dir = split_dir.join(LABELS_DIR_NAME);
    info!("在 {} 划分上评估 {} 张图像", split, input.len());

    let mut stats = MatchStats::new();
    for frame in input {
      let frame = frame?;
      let label_path = label_path(&labels_dir, frame.stem());
      let truth = ground_truth::read_ground_truth(&label_path, frame.width(), frame.height())?;
      let result = model
        .infer(&frame.image, self.confidence)
        .map_err(|e| EvalError::Model(Box::new(e)))?;
      debug!(
        "{}: {} 个预测, {} 个真值",
        frame.file_name().to_string_lossy(),
        result.len(),
        truth.len()
      );
      stats.update(&result, &truth);
    }

    let classes = stats.per_class(self.report_confidence);
    Ok(EvalReport::new(split, stats.images(), &classes, &config.names))
  }
}

fn label_path(labels_dir: &Path, stem: &std::ffi::OsStr) -> PathBuf {
  let mut name = stem.to_os_string();
  name.push(".txt");
  labels_dir.join(name)
}
