// 该文件是 Tuice （推测） 项目的一部分。
// src/locate.rs - 训练目录与权重文件定位
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
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LocateError {
  #[error("未找到训练目录: {0}")]
  NoTrainingRuns(PathBuf),
  #[error("权重文件不存在: {0}")]
  WeightsNotFound(PathBuf),
  #[error("I/O 错误 {0}: {1}")]
  Io(PathBuf, std::io::Error),
}

/// 一个候选训练目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCandidate {
  pub path: PathBuf,
  pub modified: SystemTime,
}

impl RunCandidate {
  fn name(&self) -> &std::ffi::OsStr {
    self.path.file_name().unwrap_or_default()
  }
}

/// 列出 `runs_dir` 下名称以 `prefix` 开头的子目录
pub fn list_runs(runs_dir: &Path, prefix: &str) -> Result<Vec<RunCandidate>, LocateError> {
  if !runs_dir.is_dir() {
    return Err(LocateError::NoTrainingRuns(runs_dir.to_path_buf()));
  }

  let io_err = |e| LocateError::Io(runs_dir.to_path_buf(), e);
  let mut runs = Vec::new();
  for entry in std::fs::read_dir(runs_dir).map_err(io_err)? {
    let entry = entry.map_err(io_err)?;
    let path = entry.path();
    let matches_prefix = entry
      .file_name()
      .to_str()
      .is_some_and(|name| name.starts_with(prefix));
    if !matches_prefix || !path.is_dir() {
      continue;
    }

    // 与 metadata 一致，跟随符号链接
    let modified = std::fs::metadata(&path)
      .and_then(|meta| meta.modified())
      .map_err(|e| LocateError::Io(path.clone(), e))?;
    debug!("候选训练目录: {} ({:?})", path.display(), modified);
    runs.push(RunCandidate { path, modified });
  }

  Ok(runs)
}

/// 修改时间最新者胜出；时间相同时取名称字典序最大者
pub fn select_latest(candidates: &[RunCandidate]) -> Option<&RunCandidate> {
  candidates
    .iter()
    .max_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name().cmp(b.name())))
}

/// 定位最近一次训练的权重文件
pub fn locate_weights(
  runs_dir: &Path,
  prefix: &str,
  weights_file: &str,
) -> Result<PathBuf, LocateError> {
  let runs = list_runs(runs_dir, prefix)?;
  let latest =
    select_latest(&runs).ok_or_else(|| LocateError::NoTrainingRuns(runs_dir.to_path_buf()))?;
  info!("最近的训练目录: {}", latest.path.display());

  let weights = latest.path.join(weights_file);
  if !weights.is_file() {
    return Err(LocateError::WeightsNotFound(weights));
  }

  Ok(weights)
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  fn candidate(name: &str, secs: u64) -> RunCandidate {
    RunCandidate {
      path: PathBuf::from("runs").join(name),
      modified: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
    }
  }

  #[test]
  fn latest_mtime_wins_over_name_order() {
    let runs = vec![
      candidate("detect9", 100),
      candidate("detect10", 300),
      candidate("detect2", 200),
    ];
    assert_eq!(select_latest(&runs).unwrap().path, PathBuf::from("runs/detect10"));
  }

  #[test]
  fn ties_break_on_greatest_name() {
    let runs = vec![
      candidate("detect_a", 100),
      candidate("detect_c", 100),
      candidate("detect_b", 100),
    ];
    assert_eq!(select_latest(&runs).unwrap().path, PathBuf::from("runs/detect_c"));

    let mut reversed = runs.clone();
    reversed.reverse();
    assert_eq!(select_latest(&reversed), select_latest(&runs));
  }

  #[test]
  fn empty_candidates_select_nothing() {
    assert!(select_latest(&[]).is_none());
  }

  #[test]
  fn missing_runs_dir_reports_no_runs() {
    let err = locate_weights(Path::new("/nonexistent/runs"), "detect", "weights/best.onnx")
      .unwrap_err();
    assert!(matches!(err, LocateError::NoTrainingRuns(_)));
  }
}
