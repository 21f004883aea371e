// 该文件是 Tuice （推测） 项目的一部分。
// src/output/label_file.rs - 标签文本输出
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

use crate::model::{DetectItem, DetectResult};

/// 以 64 位最短往返形式打印，`100.0`、`50.5`；指数带符号且至少两位，如 `1e-06`
fn format_value(value: f32) -> String {
  let value = value as f64;
  if value.is_nan() {
    return "nan".to_string();
  }

  let repr = format!("{:?}", value);
  match repr.split_once('e') {
    Some((mantissa, exponent)) => {
      let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
      };
      format!("{mantissa}e{sign}{digits:0>2}")
    }
    None => repr,
  }
}

/// `<class_id> <x_center> <y_center> <width> <height>`，像素坐标
pub fn format_label_line(item: &DetectItem) -> String {
  let bbox = &item.bbox;
  format!(
    "{} {} {} {} {}",
    item.class_id,
    format_value(bbox.x_center),
    format_value(bbox.y_center),
    format_value(bbox.width),
    format_value(bbox.height)
  )
}

/// 每个检测框一行，保持模型返回的顺序
pub fn format_labels(result: &DetectResult) -> String {
  let mut content = String::new();
  for item in result.iter() {
    content.push_str(&format_label_line(item));
    content.push('\n');
  }
  content
}

pub fn write_labels(path: &Path, result: &DetectResult) -> Result<(), std::io::Error> {
  std::fs::write(path, format_labels(result))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BoundingBox;

  fn item(class_id: u32, bbox: BoundingBox) -> DetectItem {
    DetectItem {
      class_id,
      score: 0.8,
      bbox,
    }
  }

  #[test]
  fn integral_values_keep_a_decimal_point() {
    let line = format_label_line(&item(2, BoundingBox::new(100.0, 50.0, 30.0, 40.0)));
    assert_eq!(line, "2 100.0 50.0 30.0 40.0");
  }

  #[test]
  fn fractional_values_are_widened() {
    let line = format_label_line(&item(0, BoundingBox::new(10.5, 0.25, 1.1, 7.0)));
    assert_eq!(line, "0 10.5 0.25 1.100000023841858 7.0");
  }

  #[test]
  fn tiny_and_huge_values_use_padded_signed_exponents() {
    let line = format_label_line(&item(0, BoundingBox::new(0.00005, 1e-5, 3.0, 4.0)));
    assert_eq!(line, "0 4.999999873689376e-05 9.999999747378752e-06 3.0 4.0");

    assert_eq!(format_value(1e16), "1.0000000272564224e+16");
    assert_eq!(format_value(1e-30), "1.0000000031710769e-30");
    assert_eq!(format_value(0.0001), "9.999999747378752e-05");
    assert_eq!(format_value(0.001), "0.0010000000474974513");
  }

  #[test]
  fn lines_follow_model_order_and_end_with_newline() {
    let result = DetectResult::from(vec![
      item(1, BoundingBox::new(1.0, 2.0, 3.0, 4.0)),
      item(0, BoundingBox::new(5.0, 6.0, 7.0, 8.0)),
    ]);
    assert_eq!(
      format_labels(&result),
      "1 1.0 2.0 3.0 4.0\n0 5.0 6.0 7.0 8.0\n"
    );
    assert_eq!(format_labels(&DetectResult::default()), "");
  }
}
