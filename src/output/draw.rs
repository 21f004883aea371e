// 该文件是 Tuice （推测） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::{
  config::ClassNames,
  frame::ImageFrame,
  model::{DetectItem, DetectResult},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const PALETTE_SIZE: usize = 80;

/// 未指定字体时依次尝试的系统字体
const SYSTEM_FONTS: [&str; 6] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

/// 读取字体，失败时返回 `None` 并只绘制边框
pub fn load_font(path: Option<&Path>) -> Option<FontVec> {
  let candidates: Vec<PathBuf> = match path {
    Some(path) => vec![path.to_path_buf()],
    None => SYSTEM_FONTS.iter().map(PathBuf::from).collect(),
  };

  for candidate in candidates {
    let Ok(data) = std::fs::read(&candidate) else {
      continue;
    };
    match FontVec::try_from_vec(data) {
      Ok(font) => {
        debug!("使用字体: {}", candidate.display());
        return Some(font);
      }
      Err(e) => warn!("无法解析字体 {}: {}", candidate.display(), e),
    }
  }

  warn!("未找到可用字体，标注图只绘制边框");
  None
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  colors: Vec<Rgb<u8>>,
  names: ClassNames,
}

impl Default for Draw {
  fn default() -> Self {
    Self::new(ClassNames::default(), None)
  }
}

impl Draw {
  pub fn new(names: ClassNames, font: Option<FontVec>) -> Self {
    let colors = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb((i as f32 / PALETTE_SIZE as f32) * 360.0, 0.8, 0.9))
      .collect();

    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      colors,
      names,
    }
  }

  pub fn color(&self, class_id: u32) -> Rgb<u8> {
    self.colors[class_id as usize % self.colors.len()]
  }

  pub fn label(&self, item: &DetectItem) -> String {
    format!("{} {:.2}", self.names.label(item.class_id), item.score)
  }

  // 在图像上绘制一个矩形边框及其标签
  fn draw_bbox_with_label(&self, image: &mut RgbImage, item: &DetectItem) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let [x_min, y_min, x_max, y_max] = item.bbox.xyxy();
    let x_min = (x_min.floor() as i32).clamp(0, w - 1);
    let y_min = (y_min.floor() as i32).clamp(0, h - 1);
    let x_max = (x_max.ceil() as i32).clamp(0, w - 1);
    let y_max = (y_max.ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = self.color(item.class_id);

    // 边框向内加粗
    for t in 0..BOX_THICKNESS {
      let (bw, bh) = (x_max - x_min - 2 * t + 1, y_max - y_min - 2 * t + 1);
      if bw <= 0 || bh <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(bw as u32, bh as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let label = self.label(item);
    let text_width = (label.chars().count() as f32 * self.label_char_width) as i32;
    let text_height = self.label_text_height;

    // 标签放在边框上方，放不下时贴住图像顶部
    let label_x = x_min;
    let label_y = (y_min - text_height).max(0);
    let label_width = text_width.min(w - label_x).max(0) as u32;
    let label_height = text_height.min(h - label_y).max(0) as u32;

    if label_width == 0 || label_height == 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
    draw_filled_rect_mut(image, rect, color);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        Rgb([255u8, 255u8, 255u8]),
        label_x,
        label_y + self.label_text_vertical_padding,
        PxScale::from(self.font_size),
        font,
        &label,
      );
    }
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.iter() {
      self.draw_bbox_with_label(image, item);
    }
  }

  pub fn draw_detection(&self, frame: &ImageFrame, result: &DetectResult) -> RgbImage {
    let mut image = frame.image.clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BoundingBox;

  fn result(bbox: BoundingBox) -> DetectResult {
    DetectResult::from(vec![DetectItem {
      class_id: 3,
      score: 0.87,
      bbox,
    }])
  }

  #[test]
  fn box_edges_are_painted_in_class_color() {
    let draw = Draw::default();
    let frame = ImageFrame::new("a.png", RgbImage::new(100, 100));
    let image = draw.draw_detection(&frame, &result(BoundingBox::new(50.0, 60.0, 40.0, 40.0)));

    let color = draw.color(3);
    assert_eq!(image.get_pixel(30, 60), &color);
    assert_eq!(image.get_pixel(31, 60), &color);
    assert_eq!(image.get_pixel(70, 60), &color);
    // 内部保持原样
    assert_eq!(image.get_pixel(50, 60), &Rgb([0, 0, 0]));
    // 原图不被修改
    assert_eq!(frame.image.get_pixel(30, 60), &Rgb([0, 0, 0]));
  }

  #[test]
  fn degenerate_boxes_are_skipped() {
    let draw = Draw::default();
    let frame = ImageFrame::new("a.png", RgbImage::new(10, 10));
    let image = draw.draw_detection(&frame, &result(BoundingBox::new(5.0, 5.0, 0.0, 0.0)));
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn label_uses_class_names_with_fallback() {
    let names = ClassNames::List(vec!["car".into(), "bus".into()]);
    let draw = Draw::new(names, None);
    let mut item = result(BoundingBox::new(1.0, 1.0, 1.0, 1.0)).items[0].clone();
    assert_eq!(draw.label(&item), "3 0.87");
    item.class_id = 1;
    assert_eq!(draw.label(&item), "bus 0.87");
  }

  #[test]
  fn missing_font_path_yields_none() {
    assert!(load_font(Some(Path::new("/nonexistent/font.ttf"))).is_none());
  }
}
