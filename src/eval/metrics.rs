// 该文件是 Tuice （推测） 项目的一部分。
// src/eval/metrics.rs - 检测指标计算
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

use std::collections::{BTreeMap, BTreeSet};

use super::ground_truth::GroundTruth;
use crate::model::{DetectItem, DetectResult};

pub const NUM_IOU_THRESHOLDS: usize = 10;

/// 0.50:0.05:0.95
pub fn iou_thresholds() -> [f32; NUM_IOU_THRESHOLDS] {
  std::array::from_fn(|i| 0.5 + 0.05 * i as f32)
}

const INTERP_POINTS: usize = 101;

/// 每个预测在各 IoU 阈值下是否为 TP
pub type Correct = [bool; NUM_IOU_THRESHOLDS];

/// 同类别、IoU 不低于阈值的配对按 IoU 降序贪心匹配，预测与真值各用一次
pub fn match_predictions(predictions: &[DetectItem], ground_truth: &[GroundTruth]) -> Vec<Correct> {
  let mut correct = vec![[false; NUM_IOU_THRESHOLDS]; predictions.len()];
  if predictions.is_empty() || ground_truth.is_empty() {
    return correct;
  }

  let mut pairs = Vec::new();
  for (p, pred) in predictions.iter().enumerate() {
    for (g, gt) in ground_truth.iter().enumerate() {
      if pred.class_id != gt.class_id {
        continue;
      }
      let iou = pred.bbox.iou(&gt.bbox);
      if iou > 0.0 {
        pairs.push((iou, p, g));
      }
    }
  }
  // IoU 相同时按下标保证结果稳定
  pairs.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

  for (t, threshold) in iou_thresholds().into_iter().enumerate() {
    let mut used_pred = vec![false; predictions.len()];
    let mut used_gt = vec![false; ground_truth.len()];
    for &(iou, p, g) in pairs.iter() {
      if iou < threshold {
        break;
      }
      if used_pred[p] || used_gt[g] {
        continue;
      }
      used_pred[p] = true;
      used_gt[g] = true;
      correct[p][t] = true;
    }
  }

  correct
}

/// 等价于 `numpy.interp`，`xp` 单调不减
fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
  let n = xp.len();
  if x >= xp[n - 1] {
    return fp[n - 1];
  }
  if x < xp[0] {
    return fp[0];
  }

  // 最后一个满足 xp[j] <= x 的下标
  let j = xp.partition_point(|&v| v <= x) - 1;
  if x == xp[j] {
    return fp[j];
  }
  let slope = (fp[j + 1] - fp[j]) / (xp[j + 1] - xp[j]);
  fp[j] + slope * (x - xp[j])
}

fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
  x.windows(2)
    .zip(y.windows(2))
    .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
    .sum()
}

/// 由召回率与精确率曲线计算 AP：单调包络后 101 点插值积分
pub fn average_precision(recall: &[f64], precision: &[f64]) -> f64 {
  let mut mrec = Vec::with_capacity(recall.len() + 2);
  mrec.push(0.0);
  mrec.extend_from_slice(recall);
  mrec.push(1.0);

  let mut mpre = Vec::with_capacity(precision.len() + 2);
  mpre.push(1.0);
  mpre.extend_from_slice(precision);
  mpre.push(0.0);

  for i in (0..mpre.len() - 1).rev() {
    mpre[i] = mpre[i].max(mpre[i + 1]);
  }

  let xs: Vec<f64> = (0..INTERP_POINTS)
    .map(|i| i as f64 / (INTERP_POINTS - 1) as f64)
    .collect();
  let ys: Vec<f64> = xs.iter().map(|&x| interp(x, &mrec, &mpre)).collect();
  trapezoid(&ys, &xs)
}

#[derive(Debug, Clone)]
struct PredictionRecord {
  score: f32,
  class_id: u32,
  correct: Correct,
}

/// 单个类别的评估结果
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
  pub class_id: u32,
  pub images: usize,
  pub instances: usize,
  pub precision: f64,
  pub recall: f64,
  pub ap50: f64,
  pub ap50_95: f64,
}

/// 跨图像累积的匹配结果
#[derive(Debug, Clone, Default)]
pub struct MatchStats {
  records: Vec<PredictionRecord>,
  instances: BTreeMap<u32, usize>,
  images_with_class: BTreeMap<u32, usize>,
  images: usize,
}

impl MatchStats {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn update(&mut self, predictions: &DetectResult, ground_truth: &[GroundTruth]) {
    self.images += 1;

    let mut classes = BTreeSet::new();
    for gt in ground_truth {
      *self.instances.entry(gt.class_id).or_default() += 1;
      classes.insert(gt.class_id);
    }
    for class_id in classes {
      *self.images_with_class.entry(class_id).or_default() += 1;
    }

    let correct = match_predictions(&predictions.items, ground_truth);
    for (item, correct) in predictions.iter().zip(correct) {
      self.records.push(PredictionRecord {
        score: item.score,
        class_id: item.class_id,
        correct,
      });
    }
  }

  pub fn images(&self) -> usize {
    self.images
  }

  pub fn instances(&self) -> usize {
    self.instances.values().sum()
  }

  /// 只统计出现过真值的类别；精确率与召回率取置信度 `report_confidence` 处的值
  pub fn per_class(&self, report_confidence: f32) -> Vec<ClassMetrics> {
    let mut records: Vec<&PredictionRecord> = self.records.iter().collect();
    records.sort_by(|a, b| b.score.total_cmp(&a.score));

    self
      .instances
      .iter()
      .map(|(&class_id, &instances)| {
        let class_records: Vec<&&PredictionRecord> =
          records.iter().filter(|r| r.class_id == class_id).collect();

        let mut ap = [0f64; NUM_IOU_THRESHOLDS];
        for (t, ap) in ap.iter_mut().enumerate() {
          let mut tp = 0f64;
          let mut fp = 0f64;
          let mut recall = Vec::with_capacity(class_records.len());
          let mut precision = Vec::with_capacity(class_records.len());
          for record in class_records.iter() {
            if record.correct[t] {
              tp += 1.0;
            } else {
              fp += 1.0;
            }
            recall.push(tp / instances as f64);
            precision.push(tp / (tp + fp));
          }
          if !class_records.is_empty() {
            *ap = average_precision(&recall, &precision);
          }
        }

        let confident: Vec<_> = class_records
          .iter()
          .filter(|r| r.score >= report_confidence)
          .collect();
        let tp = confident.iter().filter(|r| r.correct[0]).count() as f64;
        let precision = if confident.is_empty() {
          0.0
        } else {
          tp / confident.len() as f64
        };
        let recall = tp / instances as f64;

        ClassMetrics {
          class_id,
          images: self.images_with_class.get(&class_id).copied().unwrap_or(0),
          instances,
          precision,
          recall,
          ap50: ap[0],
          ap50_95: ap.iter().sum::<f64>() / NUM_IOU_THRESHOLDS as f64,
        }
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BoundingBox;

  fn gt(class_id: u32, x: f32) -> GroundTruth {
    GroundTruth {
      class_id,
      bbox: BoundingBox::new(x, 50.0, 20.0, 20.0),
    }
  }

  fn pred(class_id: u32, score: f32, x: f32) -> DetectItem {
    DetectItem {
      class_id,
      score,
      bbox: BoundingBox::new(x, 50.0, 20.0, 20.0),
    }
  }

  #[test]
  fn thresholds_span_half_to_ninety_five() {
    let t = iou_thresholds();
    assert!((t[0] - 0.5).abs() < 1e-6);
    assert!((t[9] - 0.95).abs() < 1e-6);
  }

  #[test]
  fn interp_matches_numpy_semantics() {
    let xp = [0.0, 0.5, 1.0, 1.0];
    let fp = [1.0, 0.5, 0.25, 0.0];
    assert_eq!(interp(0.0, &xp, &fp), 1.0);
    assert!((interp(0.25, &xp, &fp) - 0.75).abs() < 1e-12);
    assert_eq!(interp(1.0, &xp, &fp), 0.0);
    assert_eq!(interp(2.0, &xp, &fp), 0.0);
  }

  #[test]
  fn perfect_detector_scores_0_995() {
    let ap = average_precision(&[1.0], &[1.0]);
    assert!((ap - 0.995).abs() < 1e-9);
  }

  #[test]
  fn no_true_positives_scores_zero() {
    let ap = average_precision(&[0.0, 0.0], &[0.0, 0.0]);
    assert!(ap.abs() < 1e-9);
  }

  #[test]
  fn duplicate_predictions_match_once() {
    let predictions = [pred(0, 0.9, 50.0), pred(0, 0.8, 50.0)];
    let correct = match_predictions(&predictions, &[gt(0, 50.0)]);
    assert!(correct[0].iter().all(|&c| c));
    assert!(correct[1].iter().all(|&c| !c));
  }

  #[test]
  fn wrong_class_never_matches() {
    let correct = match_predictions(&[pred(1, 0.9, 50.0)], &[gt(0, 50.0)]);
    assert!(correct[0].iter().all(|&c| !c));
  }

  #[test]
  fn partial_overlap_matches_only_low_thresholds() {
    // IoU = 16*20 / (800 - 320) = 2/3
    let correct = match_predictions(&[pred(0, 0.9, 54.0)], &[gt(0, 50.0)]);
    assert_eq!(correct[0], [true, true, true, true, false, false, false, false, false, false]);
  }

  #[test]
  fn per_class_metrics_for_mixed_results() {
    let mut stats = MatchStats::new();
    stats.update(
      &DetectResult::from(vec![pred(0, 0.9, 50.0), pred(0, 0.3, 200.0)]),
      &[gt(0, 50.0), gt(1, 300.0)],
    );
    stats.update(&DetectResult::default(), &[gt(0, 80.0)]);

    assert_eq!(stats.images(), 2);
    assert_eq!(stats.instances(), 3);

    let metrics = stats.per_class(0.5);
    assert_eq!(metrics.len(), 2);

    let car = &metrics[0];
    assert_eq!((car.class_id, car.images, car.instances), (0, 2, 2));
    assert!((car.precision - 1.0).abs() < 1e-9);
    assert!((car.recall - 0.5).abs() < 1e-9);
    // 召回 0.5 处精确率由 1 降至 0.5，之后线性降到 0
    assert!((car.ap50 - 0.6225).abs() < 1e-9);

    let missed = &metrics[1];
    assert_eq!(missed.class_id, 1);
    assert_eq!(missed.ap50, 0.0);
    assert_eq!(missed.recall, 0.0);
  }
}
