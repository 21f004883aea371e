// 该文件是 Tuice （推测） 项目的一部分。
// src/model/yolo_onnx.rs - ONNX Runtime 上的 YOLO 检测模型
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

use image::RgbImage;
use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  frame::LetterboxFrame,
  model::{DetectItem, DetectResult, Model, ModelOptions, nms::non_max_suppression, sort_by_score},
};

const YOLO_ONNX_BOX_DIMS: usize = 4;
/// 端到端导出每行 `x1 y1 x2 y2 score class`
const YOLO_ONNX_END_TO_END_DIMS: usize = 6;
const YOLO_ONNX_DEFAULT_INPUT: &str = "images";

#[derive(Error, Debug)]
pub enum YoloOnnxError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(PathBuf),
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("输出形状无效: {0:?}")]
  InvalidOutputShape(Vec<usize>),
}

pub struct YoloOnnxBuilder {
  model_path: PathBuf,
  options: ModelOptions,
  num_threads: usize,
}

impl YoloOnnxBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      options: ModelOptions::default(),
      num_threads: 4,
    }
  }

  pub fn options(mut self, options: ModelOptions) -> Self {
    self.options = options;
    self
  }

  pub fn num_threads(mut self, num_threads: usize) -> Self {
    self.num_threads = num_threads;
    self
  }

  pub fn build(self) -> Result<YoloOnnx, YoloOnnxError> {
    if !self.model_path.is_file() {
      return Err(YoloOnnxError::ModelNotFound(self.model_path));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()
      .map_err(|e| YoloOnnxError::ModelLoadError(format!("无法创建会话: {e}")))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| YoloOnnxError::ModelLoadError(format!("无法设置优化级别: {e}")))?
      .with_intra_threads(self.num_threads)
      .map_err(|e| YoloOnnxError::ModelLoadError(format!("无法设置线程数: {e}")))?
      .commit_from_file(&self.model_path)
      .map_err(|e| YoloOnnxError::ModelLoadError(format!("无法加载模型: {e}")))?;

    let input_name = session
      .inputs
      .first()
      .map(|i| i.name.clone())
      .unwrap_or_else(|| YOLO_ONNX_DEFAULT_INPUT.to_string());
    let output_name = session
      .outputs
      .first()
      .map(|o| o.name.clone())
      .ok_or_else(|| YoloOnnxError::ModelLoadError("模型没有输出".to_string()))?;

    debug!("模型输入: {}, 模型输出: {}", input_name, output_name);
    info!("模型加载完成");

    Ok(YoloOnnx {
      session,
      input_name,
      output_name,
      options: self.options,
    })
  }
}

/// YOLOv8 / YOLO11 风格的 ONNX 导出模型，输出为 `[1, 4 + nc, anchors]`；
/// 也接受 YOLO26 / YOLOv10 端到端导出的 `[1, N, 6]`
pub struct YoloOnnx {
  session: Session,
  input_name: String,
  output_name: String,
  options: ModelOptions,
}

impl YoloOnnx {
  fn run_inference(
    &mut self,
    frame: &LetterboxFrame,
  ) -> Result<(Vec<f32>, Vec<usize>), YoloOnnxError> {
    let size = frame.size() as usize;
    let input = Array4::from_shape_vec((1, frame.channels(), size, size), frame.to_nchw_f32())
      .map_err(|e| YoloOnnxError::InferenceError(format!("无法构造输入张量: {e}")))?;
    let tensor = TensorRef::from_array_view(input.view())
      .map_err(|e| YoloOnnxError::InferenceError(format!("无法构造输入张量: {e}")))?;

    let outputs = self
      .session
      .run(ort::inputs![self.input_name.as_str() => tensor])
      .map_err(|e| YoloOnnxError::InferenceError(format!("推理失败: {e}")))?;

    let output = outputs
      .get(self.output_name.as_str())
      .ok_or_else(|| YoloOnnxError::InferenceError(format!("找不到输出 '{}'", self.output_name)))?;
    let (shape, data) = output
      .try_extract_tensor::<f32>()
      .map_err(|e| YoloOnnxError::InferenceError(format!("无法读取输出: {e}")))?;

    let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    Ok((data.to_vec(), shape))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputLayout {
  /// `[1, 4 + nc, anchors]`，需要 NMS
  Anchors { rows: usize, anchors: usize },
  /// `[1, N, 6]`，模型内部已去重
  EndToEnd { detections: usize },
}

impl OutputLayout {
  /// 行数多于列数时只可能是端到端输出，列数必须为 6
  pub(crate) fn from_shape(shape: &[usize], len: usize) -> Result<Self, YoloOnnxError> {
    let invalid = || YoloOnnxError::InvalidOutputShape(shape.to_vec());
    let (rows, cols) = match shape {
      [1, rows, cols] | [rows, cols] => (*rows, *cols),
      _ => return Err(invalid()),
    };
    if len < rows * cols {
      return Err(invalid());
    }

    if rows > cols {
      if cols == YOLO_ONNX_END_TO_END_DIMS {
        Ok(OutputLayout::EndToEnd { detections: rows })
      } else {
        Err(invalid())
      }
    } else if rows > YOLO_ONNX_BOX_DIMS {
      Ok(OutputLayout::Anchors {
        rows,
        anchors: cols,
      })
    } else {
      Err(invalid())
    }
  }
}

/// 按布局解码并映射回原图，只保留置信度不低于 `confidence` 的框
pub(crate) fn decode_output(
  data: &[f32],
  layout: OutputLayout,
  confidence: f32,
  frame: &LetterboxFrame,
) -> Vec<DetectItem> {
  match layout {
    OutputLayout::Anchors { rows, anchors } => decode_anchors(data, rows, anchors, confidence, frame),
    OutputLayout::EndToEnd { detections } => decode_end_to_end(data, detections, confidence, frame),
  }
}

fn decode_anchors(
  data: &[f32],
  rows: usize,
  anchors: usize,
  confidence: f32,
  frame: &LetterboxFrame,
) -> Vec<DetectItem> {
  let num_classes = rows - YOLO_ONNX_BOX_DIMS;

  let mut items = Vec::new();
  for a in 0..anchors {
    let (class_id, score) = (0..num_classes)
      .map(|c| (c, data[(YOLO_ONNX_BOX_DIMS + c) * anchors + a]))
      .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    if score < confidence {
      continue;
    }

    let cx = data[a];
    let cy = data[anchors + a];
    let w = data[2 * anchors + a];
    let h = data[3 * anchors + a];
    let bbox = frame.restore_box([cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]);

    items.push(DetectItem {
      class_id: class_id as u32,
      score,
      bbox,
    });
  }

  items
}

fn decode_end_to_end(
  data: &[f32],
  detections: usize,
  confidence: f32,
  frame: &LetterboxFrame,
) -> Vec<DetectItem> {
  data
    .chunks_exact(YOLO_ONNX_END_TO_END_DIMS)
    .take(detections)
    .filter(|row| row[4] >= confidence && row[5].is_finite() && row[5] >= 0.0)
    .map(|row| DetectItem {
      class_id: row[5] as u32,
      score: row[4],
      bbox: frame.restore_box([row[0], row[1], row[2], row[3]]),
    })
    .collect()
}

impl Model for YoloOnnx {
  type Error = YoloOnnxError;

  const WEIGHTS_FILE: &'static str = "weights/best.onnx";

  fn load(weights: &Path, options: &ModelOptions) -> Result<Self, Self::Error> {
    YoloOnnxBuilder::new(weights).options(options.clone()).build()
  }

  fn infer(&mut self, image: &RgbImage, confidence: f32) -> Result<DetectResult, Self::Error> {
    let frame = LetterboxFrame::from_image(image, self.options.imgsz);

    debug!("执行模型推理");
    let (data, shape) = self.run_inference(&frame)?;
    debug!("模型输出形状: {:?}", shape);

    let layout = OutputLayout::from_shape(&shape, data.len())?;
    let mut items = decode_output(&data, layout, confidence, &frame);
    match layout {
      OutputLayout::Anchors { .. } => {
        items = non_max_suppression(items, self.options.iou, self.options.max_det);
      }
      OutputLayout::EndToEnd { .. } => {
        sort_by_score(&mut items);
        items.truncate(self.options.max_det);
      }
    }
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult::from(items))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BoundingBox;

  /// 构造 `[1, 4 + nc, anchors]` 输出
  fn output(anchors: &[([f32; 4], Vec<f32>)]) -> (Vec<f32>, Vec<usize>) {
    let n = anchors.len();
    let nc = anchors[0].1.len();
    let mut data = vec![0f32; (4 + nc) * n];
    for (a, (bbox, scores)) in anchors.iter().enumerate() {
      for (r, v) in bbox.iter().enumerate() {
        data[r * n + a] = *v;
      }
      for (c, s) in scores.iter().enumerate() {
        data[(4 + c) * n + a] = *s;
      }
    }
    (data, vec![1, 4 + nc, n])
  }

  #[test]
  fn decodes_best_class_and_filters_by_confidence() {
    let frame = LetterboxFrame::from_image(&RgbImage::new(64, 64), 64);
    let mut anchors = vec![
      ([32.0, 32.0, 10.0, 20.0], vec![0.1, 0.8, 0.3]),
      ([10.0, 10.0, 4.0, 4.0], vec![0.2, 0.1, 0.4]),
    ];
    // 真实输出的锚点数远多于行数
    anchors.resize(8, ([0.0; 4], vec![0.0; 3]));
    let (data, shape) = output(&anchors);

    let layout = OutputLayout::from_shape(&shape, data.len()).unwrap();
    assert_eq!(layout, OutputLayout::Anchors { rows: 7, anchors: 8 });

    let items = decode_output(&data, layout, 0.5, &frame);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].class_id, 1);
    assert!((items[0].score - 0.8).abs() < 1e-6);
    assert!((items[0].bbox.x_center - 32.0).abs() < 1e-4);
    assert!((items[0].bbox.height - 20.0).abs() < 1e-4);
  }

  #[test]
  fn rejects_unexpected_shapes() {
    let err = OutputLayout::from_shape(&[1, 2, 2, 2], 8).unwrap_err();
    assert!(matches!(err, YoloOnnxError::InvalidOutputShape(_)));

    let err = OutputLayout::from_shape(&[1, 4, 2], 8).unwrap_err();
    assert!(matches!(err, YoloOnnxError::InvalidOutputShape(_)));

    // 行数多于列数但不是 6 列
    let err = OutputLayout::from_shape(&[1, 300, 7], 2100).unwrap_err();
    assert!(matches!(err, YoloOnnxError::InvalidOutputShape(_)));

    let err = OutputLayout::from_shape(&[1, 84, 8400], 10).unwrap_err();
    assert!(matches!(err, YoloOnnxError::InvalidOutputShape(_)));
  }

  #[test]
  fn end_to_end_rows_are_not_read_as_classes() {
    let layout = OutputLayout::from_shape(&[1, 300, 6], 1800).unwrap();
    assert_eq!(layout, OutputLayout::EndToEnd { detections: 300 });

    let frame = LetterboxFrame::from_image(&RgbImage::new(64, 64), 64);
    let mut data = vec![0f32; 300 * 6];
    data[..6].copy_from_slice(&[10.0, 20.0, 30.0, 60.0, 0.9, 3.0]);
    data[6..12].copy_from_slice(&[0.0, 0.0, 8.0, 8.0, 0.2, 1.0]);

    let items = decode_output(&data, layout, 0.5, &frame);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].class_id, 3);
    assert!((items[0].score - 0.9).abs() < 1e-6);
    assert_eq!(items[0].bbox, BoundingBox::new(20.0, 40.0, 20.0, 40.0));
  }

  #[test]
  fn missing_model_file_is_reported() {
    let err = YoloOnnxBuilder::new("/nonexistent/best.onnx").build().err().unwrap();
    assert!(matches!(err, YoloOnnxError::ModelNotFound(_)));
  }
}
