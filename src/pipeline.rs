// 该文件是 Tuice （推测） 项目的一部分。
// src/pipeline.rs - 完整推理流水线
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

use std::fmt;
use std::path::PathBuf;

use tracing::info;

use crate::{
  config::{DataConfig, Split},
  error::PipelineError,
  eval::{EvalReport, Validator},
  input::ImageDirInput,
  locate::locate_weights,
  model::Model,
  output::{
    PredictionDirOutput,
    draw::{Draw, load_font},
  },
  settings::Settings,
  task::{BatchTask, Task},
};

const IMAGES_DIR_NAME: &str = "images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  ConfigLoaded,
  ImagesDiscovered,
  WeightsResolved,
  ModelLoaded,
  Exported,
  Evaluated,
  Done,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::ConfigLoaded => "配置已读取",
      Stage::ImagesDiscovered => "图像已枚举",
      Stage::WeightsResolved => "权重已定位",
      Stage::ModelLoaded => "模型已加载",
      Stage::Exported => "结果已导出",
      Stage::Evaluated => "评估完成",
      Stage::Done => "完成",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone)]
pub struct PipelineSummary {
  pub weights: PathBuf,
  pub images: usize,
  pub detections: usize,
  pub images_dir: PathBuf,
  pub labels_dir: PathBuf,
  pub report: Option<EvalReport>,
  pub report_path: Option<PathBuf>,
}

fn enter(stage: Stage) {
  info!("[{}]", stage);
}

/// 读取配置、定位权重、逐张推理导出，最后在测试集上评估。
///
/// 所有前置检查都在加载模型和创建输出目录之前完成。
pub fn run<M: Model>(settings: &Settings) -> Result<PipelineSummary, PipelineError> {
  let config_path = settings.config_path();
  info!("读取配置文件: {}", config_path.display());
  let config = DataConfig::load(&config_path)?;
  let test_dir = config.split_dir(Split::Test, &settings.root)?;
  enter(Stage::ConfigLoaded);

  let input = ImageDirInput::open(&test_dir.join(IMAGES_DIR_NAME))?;
  info!("在 {} 中找到 {} 张图像", input.directory().display(), input.len());
  enter(Stage::ImagesDiscovered);

  let weights = locate_weights(&settings.runs_path(), &settings.run_prefix, M::WEIGHTS_FILE)?;
  info!("使用权重: {}", weights.display());
  enter(Stage::WeightsResolved);

  let mut model = M::load(&weights, &settings.model).map_err(PipelineError::model)?;
  enter(Stage::ModelLoaded);

  let draw = Draw::new(config.names.clone(), load_font(settings.font.as_deref()));
  let output = PredictionDirOutput::create(&settings.output_path(), draw)?;
  let stats = BatchTask::new(settings.confidence).run_task(input.into_iter(), &mut model, &output)?;
  info!(
    "已处理 {} 张图像，共 {} 个检测框，结果保存在 {}",
    stats.images,
    stats.detections,
    settings.output_path().display()
  );
  enter(Stage::Exported);

  let (report, report_path) = if settings.evaluate {
    let report = Validator::new(&settings.root)
      .report_confidence(settings.confidence)
      .validate(&mut model, &config_path, Split::Test)?;
    let path = report.save_json(&settings.eval_path())?;
    info!(
      "mAP50: {:.3}, mAP50-95: {:.3}，报告保存在 {}",
      report.map50,
      report.map50_95,
      path.display()
    );
    enter(Stage::Evaluated);
    (Some(report), Some(path))
  } else {
    info!("跳过评估");
    (None, None)
  };

  enter(Stage::Done);
  Ok(PipelineSummary {
    weights,
    images: stats.images,
    detections: stats.detections,
    images_dir: output.images_dir().to_path_buf(),
    labels_dir: output.labels_dir().to_path_buf(),
    report,
    report_path,
  })
}
