// 该文件是 Tuice （推测） 项目的一部分。
// src/error.rs - 流水线错误
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

use thiserror::Error;

use crate::{
  config::ConfigError,
  eval::EvalError,
  input::{ImageFileInputError, InputError},
  locate::LocateError,
  output::OutputError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// 配置文件或字段缺失
  Configuration,
  /// 图像、训练目录或权重文件缺失
  ResourceNotFound,
  /// 推理、导出或评估过程中的错误
  Runtime,
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("输入错误: {0}")]
  Input(#[from] InputError),
  #[error("图像读取错误: {0}")]
  ImageFile(#[from] ImageFileInputError),
  #[error("模型定位错误: {0}")]
  Locate(#[from] LocateError),
  #[error("模型错误: {0}")]
  Model(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("输出错误: {0}")]
  Output(#[from] OutputError),
  #[error("评估错误: {0}")]
  Eval(#[from] EvalError),
}

impl PipelineError {
  pub fn model<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    PipelineError::Model(Box::new(err))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      PipelineError::Config(_) => ErrorKind::Configuration,
      PipelineError::Input(_) | PipelineError::Locate(_) => ErrorKind::ResourceNotFound,
      PipelineError::ImageFile(_)
      | PipelineError::Model(_)
      | PipelineError::Output(_)
      | PipelineError::Eval(_) => ErrorKind::Runtime,
    }
  }

  /// 所有错误都以状态码 1 退出
  pub fn exit_code(&self) -> u8 {
    1
  }
}
