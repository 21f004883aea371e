// 该文件是 Tuice （推测） 项目的一部分。
// src/main.rs - 项目主程序
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

#[cfg(not(any(feature = "model_onnx", feature = "model_rknn")))]
compile_error!("至少需要启用一个模型后端: model_onnx 或 model_rknn");

mod args;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use tuice::{PipelineSummary, model::DefaultModel};

/// 可执行文件所在目录
fn program_root() -> Result<PathBuf> {
  let exe = std::env::current_exe().context("无法获取可执行文件路径")?;
  let dir = exe
    .parent()
    .context("可执行文件没有父目录")?
    .to_path_buf();
  Ok(dir)
}

fn print_summary(summary: &PipelineSummary) {
  println!();
  println!("处理完成!");
  println!("权重文件: {}", summary.weights.display());
  println!("图像数: {}", summary.images);
  println!("总检测数: {}", summary.detections);
  println!("标注图像: {}", summary.images_dir.display());
  println!("标签文件: {}", summary.labels_dir.display());
  if let Some(report) = &summary.report {
    println!();
    print!("{}", report.table());
  }
  if let Some(path) = &summary.report_path {
    println!("评估报告: {}", path.display());
  }
}

fn run(args: args::Args) -> Result<PipelineSummary> {
  let root = match &args.root {
    Some(root) => root.clone(),
    None => program_root()?,
  };
  std::env::set_current_dir(&root)
    .with_context(|| format!("无法切换工作目录到 {}", root.display()))?;
  // 相对的 --root 在切换后失效
  let root = std::env::current_dir().context("无法获取工作目录")?;
  info!("工作目录: {}", root.display());

  let settings = args.into_settings(root);
  let summary = tuice::run::<DefaultModel>(&settings)?;
  Ok(summary)
}

fn main() -> ExitCode {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  match run(args) {
    Ok(summary) => {
      print_summary(&summary);
      ExitCode::SUCCESS
    }
    Err(err) => {
      let code = err
        .downcast_ref::<tuice::PipelineError>()
        .map(|e| e.exit_code())
        .unwrap_or(1);
      error!("{:#}", err);
      ExitCode::from(code)
    }
  }
}
