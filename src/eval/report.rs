// 该文件是 Tuice （推测） 项目的一部分。
// src/eval/report.rs - 评估报告
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

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{EvalError, metrics::ClassMetrics};
use crate::config::{ClassNames, Split};

pub const REPORT_FILE_NAME: &str = "metrics.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassReport {
  pub class_id: u32,
  pub name: String,
  pub images: usize,
  pub instances: usize,
  pub precision: f64,
  pub recall: f64,
  pub map50: f64,
  pub map50_95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
  pub split: Split,
  pub created_at: DateTime<Utc>,
  pub images: usize,
  pub instances: usize,
  pub precision: f64,
  pub recall: f64,
  pub map50: f64,
  pub map50_95: f64,
  pub classes: Vec<ClassReport>,
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
  let n = values.len();
  if n == 0 { 0.0 } else { values.sum::<f64>() / n as f64 }
}

impl EvalReport {
  pub fn new(
    split: Split,
    images: usize,
    classes: &[ClassMetrics],
    names: &ClassNames,
  ) -> Self {
    let classes: Vec<ClassReport> = classes
      .iter()
      .map(|m| ClassReport {
        class_id: m.class_id,
        name: names.label(m.class_id),
        images: m.images,
        instances: m.instances,
        precision: m.precision,
        recall: m.recall,
        map50: m.ap50,
        map50_95: m.ap50_95,
      })
      .collect();

    Self {
      split,
      created_at: Utc::now(),
      images,
      instances: classes.iter().map(|c| c.instances).sum(),
      precision: mean(classes.iter().map(|c| c.precision)),
      recall: mean(classes.iter().map(|c| c.recall)),
      map50: mean(classes.iter().map(|c| c.map50)),
      map50_95: mean(classes.iter().map(|c| c.map50_95)),
      classes,
    }
  }

  /// 按列对齐的汇总表，首行为全部类别
  pub fn table(&self) -> String {
    let mut table = String::new();
    let _ = writeln!(
      table,
      "{:>22}{:>11}{:>11}{:>11}{:>11}{:>11}{:>11}",
      "Class", "Images", "Instances", "P", "R", "mAP50", "mAP50-95"
    );
    let mut row = |name: &str, images, instances, p: f64, r: f64, m50: f64, m: f64| {
      let _ = writeln!(
        table,
        "{:>22}{:>11}{:>11}{:>11.3}{:>11.3}{:>11.3}{:>11.3}",
        name, images, instances, p, r, m50, m
      );
    };
    row(
      "all",
      self.images,
      self.instances,
      self.precision,
      self.recall,
      self.map50,
      self.map50_95,
    );
    for c in self.classes.iter() {
      row(
        c.name.as_str(),
        c.images,
        c.instances,
        c.precision,
        c.recall,
        c.map50,
        c.map50_95,
      );
    }
    table
  }

  pub fn save_json(&self, dir: &Path) -> Result<std::path::PathBuf, EvalError> {
    std::fs::create_dir_all(dir).map_err(|e| EvalError::Io(dir.to_path_buf(), e))?;
    let path = dir.join(REPORT_FILE_NAME);
    let json = serde_json::to_string_pretty(self).map_err(|e| EvalError::Report(path.clone(), e))?;
    std::fs::write(&path, json).map_err(|e| EvalError::Io(path.clone(), e))?;
    Ok(path)
  }
}
