// 该文件是 Tuice （推测） 项目的一部分。
// src/eval/ground_truth.rs - 数据集标注读取
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

use super::EvalError;
use crate::model::BoundingBox;

/// 一个真值框，像素坐标
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
  pub class_id: u32,
  pub bbox: BoundingBox,
}

/// 解析一行归一化标注。
///
/// 五个数为 `class xc yc w h`；更多的数视为分割多边形 `class x1 y1 x2 y2 ...`，
/// 取其外接矩形。
pub fn parse_label_line(line: &str, width: u32, height: u32) -> Result<GroundTruth, String> {
  let mut fields = line.split_whitespace();
  let class_id = fields
    .next()
    .ok_or_else(|| "空行".to_string())?
    .parse::<f32>()
    .map_err(|e| format!("类别无效: {e}"))?;
  if class_id < 0.0 || class_id.fract() != 0.0 {
    return Err(format!("类别无效: {class_id}"));
  }

  let values = fields
    .map(|v| v.parse::<f32>().map_err(|e| format!("坐标无效 {v}: {e}")))
    .collect::<Result<Vec<_>, _>>()?;

  let (w, h) = (width as f32, height as f32);
  let bbox = match values.len() {
    4 => BoundingBox::new(values[0] * w, values[1] * h, values[2] * w, values[3] * h),
    n if n >= 6 && n % 2 == 0 => {
      let xs = values.iter().step_by(2);
      let ys = values.iter().skip(1).step_by(2);
      let x_min = xs.clone().copied().fold(f32::INFINITY, f32::min);
      let x_max = xs.copied().fold(f32::NEG_INFINITY, f32::max);
      let y_min = ys.clone().copied().fold(f32::INFINITY, f32::min);
      let y_max = ys.copied().fold(f32::NEG_INFINITY, f32::max);
      BoundingBox::from_xyxy([x_min * w, y_min * h, x_max * w, y_max * h])
    }
    n => return Err(format!("字段数量错误: {}", n + 1)),
  };

  Ok(GroundTruth {
    class_id: class_id as u32,
    bbox,
  })
}

/// 读取图像对应的标注文件，文件不存在视为背景图
pub fn read_ground_truth(path: &Path, width: u32, height: u32) -> Result<Vec<GroundTruth>, EvalError> {
  let content = match std::fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(EvalError::Io(path.to_path_buf(), e)),
  };

  content
    .lines()
    .enumerate()
    .filter(|(_, line)| !line.trim().is_empty())
    .map(|(i, line)| {
      parse_label_line(line, width, height)
        .map_err(|reason| EvalError::Label(path.to_path_buf(), i + 1, reason))
    })
    .collect()
}
