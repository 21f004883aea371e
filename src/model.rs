// 该文件是 Tuice （推测） 项目的一部分。
// src/model.rs - 模型
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

use std::path::Path;

use image::RgbImage;

pub const DEFAULT_IMGSZ: u32 = 640;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
pub const DEFAULT_MAX_DET: usize = 300;

/// 检测模型能力边界：加载一次，逐张推理
pub trait Model: Sized {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 权重文件相对训练目录的路径
  const WEIGHTS_FILE: &'static str;

  fn load(weights: &Path, options: &ModelOptions) -> Result<Self, Self::Error>;

  /// 推理单张图像，只返回置信度不低于 `confidence` 的检测框，坐标为原图像素
  fn infer(&mut self, image: &RgbImage, confidence: f32) -> Result<DetectResult, Self::Error>;
}

#[derive(Debug, Clone)]
pub struct ModelOptions {
  /// 模型输入边长
  pub imgsz: u32,
  /// NMS IoU 阈值
  pub iou: f32,
  /// 单张图像最多保留的检测框数
  pub max_det: usize,
}

impl Default for ModelOptions {
  fn default() -> Self {
    Self {
      imgsz: DEFAULT_IMGSZ,
      iou: DEFAULT_IOU_THRESHOLD,
      max_det: DEFAULT_MAX_DET,
    }
  }
}

/// 中心点格式的边界框，单位为像素
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub x_center: f32,
  pub y_center: f32,
  pub width: f32,
  pub height: f32,
}

impl BoundingBox {
  pub fn new(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
    Self {
      x_center,
      y_center,
      width,
      height,
    }
  }

  pub fn from_xyxy([x_min, y_min, x_max, y_max]: [f32; 4]) -> Self {
    Self {
      x_center: (x_min + x_max) / 2.0,
      y_center: (y_min + y_max) / 2.0,
      width: x_max - x_min,
      height: y_max - y_min,
    }
  }

  /// `[x_min, y_min, x_max, y_max]`
  pub fn xyxy(&self) -> [f32; 4] {
    let (hw, hh) = (self.width / 2.0, self.height / 2.0);
    [
      self.x_center - hw,
      self.y_center - hh,
      self.x_center + hw,
      self.y_center + hh,
    ]
  }

  pub fn area(&self) -> f32 {
    self.width.max(0.0) * self.height.max(0.0)
  }

  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let [ax1, ay1, ax2, ay2] = self.xyxy();
    let [bx1, by1, bx2, by2] = other.xyxy();
    let inter_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
    let inter_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
    let intersection = inter_w * inter_h;
    let union = self.area() + other.area() - intersection;
    if union <= 0.0 { 0.0 } else { intersection / union }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem> {
    self.items.iter()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

/// 按置信度降序排列
pub(crate) fn sort_by_score(items: &mut [DetectItem]) {
  items.sort_by(|a, b| b.score.total_cmp(&a.score));
}

pub mod nms;

#[cfg(feature = "model_onnx")]
mod yolo_onnx;
#[cfg(feature = "model_onnx")]
pub use self::yolo_onnx::{YoloOnnx, YoloOnnxBuilder, YoloOnnxError};

#[cfg(feature = "model_rknn")]
mod yolo26;
#[cfg(feature = "model_rknn")]
pub use self::yolo26::{Yolo26, Yolo26Builder, Yolo26Error};

/// 当前构建所使用的检测后端
#[cfg(feature = "model_onnx")]
pub type DefaultModel = YoloOnnx;
#[cfg(all(feature = "model_rknn", not(feature = "model_onnx")))]
pub type DefaultModel = Yolo26;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn xyxy_round_trips_through_center_form() {
    let bbox = BoundingBox::from_xyxy([85.0, 30.0, 115.0, 70.0]);
    assert_eq!(bbox, BoundingBox::new(100.0, 50.0, 30.0, 40.0));
    assert_eq!(bbox.xyxy(), [85.0, 30.0, 115.0, 70.0]);
  }

  #[test]
  fn iou_of_identical_and_disjoint_boxes() {
    let a = BoundingBox::new(10.0, 10.0, 10.0, 10.0);
    let b = BoundingBox::new(40.0, 40.0, 10.0, 10.0);
    assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    assert_eq!(a.iou(&b), 0.0);

    let half = BoundingBox::new(15.0, 10.0, 10.0, 10.0);
    assert!((a.iou(&half) - 1.0 / 3.0).abs() < 1e-6);
  }

  #[test]
  fn degenerate_boxes_have_zero_iou() {
    let a = BoundingBox::new(0.0, 0.0, 0.0, 0.0);
    assert_eq!(a.iou(&a), 0.0);
  }
}
