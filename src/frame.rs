// 该文件是 Tuice （推测） 项目的一部分。
// src/frame.rs - 图像帧与 letterbox 帧定义
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

use image::{Rgb, RgbImage, imageops::FilterType};

use crate::model::BoundingBox;

const RGB_CHANNELS: usize = 3;
const LETTERBOX_FILL: u8 = 114;

/// 从磁盘读取的一张输入图像
#[derive(Debug, Clone)]
pub struct ImageFrame {
  pub path: PathBuf,
  pub image: RgbImage,
}

impl ImageFrame {
  pub fn new(path: impl Into<PathBuf>, image: RgbImage) -> Self {
    Self {
      path: path.into(),
      image,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn file_name(&self) -> &std::ffi::OsStr {
    self.path.file_name().unwrap_or_default()
  }

  pub fn stem(&self) -> &std::ffi::OsStr {
    self.path.file_stem().unwrap_or_default()
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 等比例缩放并居中填充后的方形模型输入，NHWC 排列
#[derive(Debug, Clone)]
pub struct LetterboxFrame {
  data: Box<[u8]>,
  size: u32,
  scale: f32,
  pad_x: f32,
  pad_y: f32,
  source_width: u32,
  source_height: u32,
}

impl LetterboxFrame {
  /// `size` 为 0 时按 1 处理
  pub fn from_image(image: &RgbImage, size: u32) -> Self {
    let size = size.max(1);
    let (source_width, source_height) = image.dimensions();
    let scale = (size as f32 / source_width.max(1) as f32)
      .min(size as f32 / source_height.max(1) as f32);
    let new_w = ((source_width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((source_height as f32 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_w) as f32 / 2.0;
    let pad_y = (size - new_h) as f32 / 2.0;

    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_FILL; 3]));
    image::imageops::replace(
      &mut canvas,
      &resized,
      pad_x.floor() as i64,
      pad_y.floor() as i64,
    );

    Self {
      data: canvas.into_raw().into_boxed_slice(),
      size,
      scale,
      pad_x: pad_x.floor(),
      pad_y: pad_y.floor(),
      source_width,
      source_height,
    }
  }

  pub fn size(&self) -> u32 {
    self.size
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }

  /// 归一化到 `[0, 1]` 的 NCHW 浮点数据
  pub fn to_nchw_f32(&self) -> Vec<f32> {
    let plane = (self.size * self.size) as usize;
    let mut out = vec![0f32; plane * RGB_CHANNELS];
    for (idx, pixel) in self.data.chunks_exact(RGB_CHANNELS).enumerate() {
      for c in 0..RGB_CHANNELS {
        out[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }
    out
  }

  /// 将模型输入坐标系下的 `[x_min, y_min, x_max, y_max]` 映射回原图并裁剪
  pub fn restore_box(&self, xyxy: [f32; 4]) -> BoundingBox {
    let (w, h) = (self.source_width as f32, self.source_height as f32);
    let x_min = ((xyxy[0] - self.pad_x) / self.scale).clamp(0.0, w);
    let y_min = ((xyxy[1] - self.pad_y) / self.scale).clamp(0.0, h);
    let x_max = ((xyxy[2] - self.pad_x) / self.scale).clamp(0.0, w);
    let y_max = ((xyxy[3] - self.pad_y) / self.scale).clamp(0.0, h);
    BoundingBox::from_xyxy([x_min, y_min, x_max, y_max])
  }
}
