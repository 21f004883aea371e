// 该文件是 Tuice （推测） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use super::{DetectItem, sort_by_score};

/// 按类别进行 NMS，结果按置信度降序，最多保留 `max_det` 个
pub fn non_max_suppression(
  mut items: Vec<DetectItem>,
  iou_threshold: f32,
  max_det: usize,
) -> Vec<DetectItem> {
  sort_by_score(&mut items);

  let mut suppressed = vec![false; items.len()];
  let mut kept = Vec::new();

  for i in 0..items.len() {
    if suppressed[i] {
      continue;
    }
    if kept.len() >= max_det {
      break;
    }

    for j in (i + 1)..items.len() {
      if suppressed[j] || items[j].class_id != items[i].class_id {
        continue;
      }
      if items[i].bbox.iou(&items[j].bbox) > iou_threshold {
        suppressed[j] = true;
      }
    }
    kept.push(items[i].clone());
  }

  kept
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BoundingBox;

  fn item(class_id: u32, score: f32, x: f32) -> DetectItem {
    DetectItem {
      class_id,
      score,
      bbox: BoundingBox::new(x, 50.0, 20.0, 20.0),
    }
  }

  #[test]
  fn overlapping_boxes_of_same_class_are_merged() {
    let kept = non_max_suppression(
      vec![item(0, 0.6, 51.0), item(0, 0.9, 50.0), item(0, 0.7, 200.0)],
      0.7,
      300,
    );
    let scores: Vec<f32> = kept.iter().map(|d| d.score).collect();
    assert_eq!(scores, vec![0.9, 0.7]);
  }

  #[test]
  fn different_classes_are_not_suppressed() {
    let kept = non_max_suppression(vec![item(0, 0.9, 50.0), item(1, 0.8, 50.0)], 0.5, 300);
    assert_eq!(kept.len(), 2);
  }

  #[test]
  fn max_det_limits_output() {
    let items = (0..10).map(|i| item(0, 0.5 + i as f32 / 100.0, i as f32 * 100.0)).collect();
    let kept = non_max_suppression(items, 0.5, 3);
    assert_eq!(kept.len(), 3);
    assert!(kept[0].score >= kept[1].score && kept[1].score >= kept[2].score);
  }
}
