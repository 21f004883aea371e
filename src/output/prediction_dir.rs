// 该文件是 Tuice （推测） 项目的一部分。
// src/output/prediction_dir.rs - 预测结果目录输出
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

use tracing::debug;

use crate::{
  frame::ImageFrame,
  model::DetectResult,
  output::{OutputError, Render, draw::Draw, label_file::write_labels},
};

const IMAGES_DIR_NAME: &str = "images";
const LABELS_DIR_NAME: &str = "labels";

/// `<base>/images/<文件名>` 标注图与 `<base>/labels/<stem>.txt` 标签
pub struct PredictionDirOutput {
  images_dir: PathBuf,
  labels_dir: PathBuf,
  draw: Draw,
}

impl PredictionDirOutput {
  /// 创建输出目录（含父目录），已存在时直接复用
  pub fn create(base: &Path, draw: Draw) -> Result<Self, OutputError> {
    let images_dir = base.join(IMAGES_DIR_NAME);
    let labels_dir = base.join(LABELS_DIR_NAME);
    for dir in [&images_dir, &labels_dir] {
      std::fs::create_dir_all(dir).map_err(|e| OutputError::Io(dir.clone(), e))?;
    }

    Ok(Self {
      images_dir,
      labels_dir,
      draw,
    })
  }

  pub fn images_dir(&self) -> &Path {
    &self.images_dir
  }

  pub fn labels_dir(&self) -> &Path {
    &self.labels_dir
  }

  pub fn image_path(&self, frame: &ImageFrame) -> PathBuf {
    self.images_dir.join(frame.file_name())
  }

  pub fn label_path(&self, frame: &ImageFrame) -> PathBuf {
    let mut name = frame.stem().to_os_string();
    name.push(".txt");
    self.labels_dir.join(name)
  }
}

impl Render<ImageFrame, DetectResult> for PredictionDirOutput {
  type Error = OutputError;

  fn render_result(&self, frame: &ImageFrame, result: &DetectResult) -> Result<(), Self::Error> {
    let image_path = self.image_path(frame);
    let image = self.draw.draw_detection(frame, result);
    image
      .save(&image_path)
      .map_err(|e| OutputError::Image(image_path.clone(), e))?;

    let label_path = self.label_path(frame);
    write_labels(&label_path, result).map_err(|e| OutputError::Io(label_path.clone(), e))?;

    debug!(
      "已保存 {} 与 {}",
      image_path.display(),
      label_path.display()
    );
    Ok(())
  }
}
