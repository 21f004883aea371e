// 该文件是 Tuice （推测） 项目的一部分。
// src/task.rs - 批量推理任务
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

use tracing::info;

use crate::{
  error::PipelineError,
  frame::ImageFrame,
  input::ImageFileInputError,
  model::{DetectResult, Model},
  output::{OutputError, Render},
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: &mut M, output: &O) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
  pub images: usize,
  pub detections: usize,
}

/// 逐张顺序推理并导出，任何一张失败即终止
#[derive(Debug, Clone, Copy)]
pub struct BatchTask {
  confidence: f32,
}

impl BatchTask {
  pub fn new(confidence: f32) -> Self {
    Self { confidence }
  }
}

impl<I, M, O> Task<I, M, O> for BatchTask
where
  I: Iterator<Item = Result<ImageFrame, ImageFileInputError>>,
  M: Model,
  O: Render<ImageFrame, DetectResult, Error = OutputError>,
{
  type Output = BatchStats;
  type Error = PipelineError;

  fn run_task(self, input: I, model: &mut M, output: &O) -> Result<Self::Output, Self::Error> {
    info!("开始批量推理...");
    let mut stats = BatchStats::default();

    for frame in input {
      let frame = frame?;
      info!("处理图像: {}", frame.file_name().to_string_lossy());

      let now = std::time::Instant::now();
      let result = model
        .infer(&frame.image, self.confidence)
        .map_err(PipelineError::model)?;
      info!(
        "检测到 {} 个对象，耗时: {:.2?}",
        result.len(),
        now.elapsed()
      );

      output.render_result(&frame, &result)?;
      stats.images += 1;
      stats.detections += result.len();
    }

    info!("批量推理完成");
    Ok(stats)
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::path::Path;

  use image::RgbImage;

  use super::*;
  use crate::model::{BoundingBox, DetectItem, ModelOptions};

  struct CountingModel {
    seen_confidence: Vec<f32>,
  }

  impl Model for CountingModel {
    type Error = std::io::Error;
    const WEIGHTS_FILE: &'static str = "weights/best.pt";

    fn load(_: &Path, _: &ModelOptions) -> Result<Self, Self::Error> {
      Ok(Self {
        seen_confidence: Vec::new(),
      })
    }

    fn infer(&mut self, image: &RgbImage, confidence: f32) -> Result<DetectResult, Self::Error> {
      self.seen_confidence.push(confidence);
      let n = image.width() as usize;
      Ok(DetectResult::from(vec![
        DetectItem {
          class_id: 0,
          score: 0.9,
          bbox: BoundingBox::new(1.0, 1.0, 1.0, 1.0),
        };
        n
      ]))
    }
  }

  #[derive(Default)]
  struct MemoryOutput {
    rendered: RefCell<Vec<(String, usize)>>,
  }

  impl Render<ImageFrame, DetectResult> for MemoryOutput {
    type Error = OutputError;

    fn render_result(&self, frame: &ImageFrame, result: &DetectResult) -> Result<(), Self::Error> {
      self
        .rendered
        .borrow_mut()
        .push((frame.file_name().to_string_lossy().into_owned(), result.len()));
      Ok(())
    }
  }

  #[test]
  fn processes_every_frame_in_order() {
    let frames = vec![
      Ok(ImageFrame::new("a.png", RgbImage::new(2, 1))),
      Ok(ImageFrame::new("b.png", RgbImage::new(3, 1))),
    ];
    let mut model = CountingModel::load(Path::new(""), &ModelOptions::default()).unwrap();
    let output = MemoryOutput::default();

    let stats = BatchTask::new(0.5)
      .run_task(frames.into_iter(), &mut model, &output)
      .unwrap();

    assert_eq!(stats, BatchStats { images: 2, detections: 5 });
    assert_eq!(model.seen_confidence, vec![0.5, 0.5]);
    assert_eq!(
      *output.rendered.borrow(),
      vec![("a.png".to_string(), 2), ("b.png".to_string(), 3)]
    );
  }

  #[test]
  fn first_failure_aborts_the_batch() {
    let frames = vec![
      Err(ImageFileInputError::IoError(
        "bad.png".into(),
        std::io::Error::other("unreadable"),
      )),
      Ok(ImageFrame::new("b.png", RgbImage::new(1, 1))),
    ];
    let mut model = CountingModel::load(Path::new(""), &ModelOptions::default()).unwrap();
    let output = MemoryOutput::default();

    let err = BatchTask::new(0.5)
      .run_task(frames.into_iter(), &mut model, &output)
      .unwrap_err();

    assert!(matches!(err, PipelineError::ImageFile(_)));
    assert!(output.rendered.borrow().is_empty());
    assert!(model.seen_confidence.is_empty());
  }
}
