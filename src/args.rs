// 该文件是 Tuice （推测） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;

use tuice::{
  Settings,
  model::{DEFAULT_IMGSZ, DEFAULT_IOU_THRESHOLD},
  settings::{CONFIDENCE_THRESHOLD, CONFIG_FILE_NAME, OUTPUT_DIR_NAME, RUNS_DIR_NAME},
};

/// 最大下采样步长
const MIN_IMGSZ: i64 = 32;

/// 在测试集上批量推理，导出标注图与标签并评估精度。
/// 不带参数运行时使用程序所在目录的默认布局。
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 项目根目录，默认为可执行文件所在目录
  #[arg(long, value_name = "DIR")]
  pub root: Option<PathBuf>,

  /// 数据集配置文件
  #[arg(long, default_value = CONFIG_FILE_NAME, value_name = "FILE")]
  pub config: PathBuf,

  /// 训练输出目录
  #[arg(long, default_value = RUNS_DIR_NAME, value_name = "DIR")]
  pub runs: PathBuf,

  /// 预测结果目录
  #[arg(long, default_value = OUTPUT_DIR_NAME, value_name = "DIR")]
  pub output: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD, value_name = "THRESHOLD")]
  pub iou: f32,

  /// 模型输入尺寸，至少为 32
  #[arg(
    long,
    default_value_t = DEFAULT_IMGSZ,
    value_name = "PIXELS",
    value_parser = clap::value_parser!(u32).range(MIN_IMGSZ..)
  )]
  pub imgsz: u32,

  /// 标注文字使用的 TrueType 字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 跳过测试集评估
  #[arg(long)]
  pub no_eval: bool,
}

impl Args {
  pub fn into_settings(self, root: PathBuf) -> Settings {
    let mut settings = Settings::with_root(root);
    settings.config_file = self.config;
    settings.runs_dir = self.runs;
    settings.output_dir = self.output;
    settings.confidence = self.confidence;
    settings.model.iou = self.iou;
    settings.model.imgsz = self.imgsz;
    settings.font = self.font;
    settings.evaluate = !self.no_eval;
    settings
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn no_arguments_keep_the_default_layout() {
    let args = Args::parse_from(["tuice"]);
    assert!(args.root.is_none());

    let settings = args.into_settings(PathBuf::from("/srv/tuice"));
    assert_eq!(settings.config_path(), PathBuf::from("/srv/tuice/yolo_params.yaml"));
    assert_eq!(settings.output_path(), PathBuf::from("/srv/tuice/predictions"));
    assert_eq!(settings.confidence, 0.5);
    assert_eq!(settings.model.iou, 0.7);
    assert_eq!(settings.model.imgsz, 640);
    assert!(settings.evaluate);
  }

  #[test]
  fn imgsz_below_one_stride_is_rejected() {
    for value in ["0", "16"] {
      let err = Args::try_parse_from(["tuice", "--imgsz", value]).unwrap_err();
      assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
    let args = Args::try_parse_from(["tuice", "--imgsz", "32"]).unwrap();
    assert_eq!(args.imgsz, 32);
  }

  #[test]
  fn overrides_are_applied() {
    let args = Args::parse_from([
      "tuice",
      "--output",
      "out",
      "--confidence",
      "0.25",
      "--no-eval",
    ]);
    let settings = args.into_settings(PathBuf::from("/r"));
    assert_eq!(settings.output_path(), PathBuf::from("/r/out"));
    assert_eq!(settings.confidence, 0.25);
    assert!(!settings.evaluate);
  }
}
