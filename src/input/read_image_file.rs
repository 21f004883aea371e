// 该文件是 Tuice （推测） 项目的一部分。
// src/input/read_image_file.rs - 图像文件读取
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

use image::ImageReader;
use thiserror::Error;

use crate::frame::ImageFrame;

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("I/O error {0}: {1}")]
  IoError(PathBuf, std::io::Error),
  #[error("Image loading error {0}: {1}")]
  ImageLoadError(PathBuf, image::ImageError),
}

/// 读取并解码一张图片，统一转为 RGB8
pub fn read_image_file(path: &Path) -> Result<ImageFrame, ImageFileInputError> {
  let image = ImageReader::open(path)
    .map_err(|e| ImageFileInputError::IoError(path.to_path_buf(), e))?
    .with_guessed_format()
    .map_err(|e| ImageFileInputError::IoError(path.to_path_buf(), e))?
    .decode()
    .map_err(|e| ImageFileInputError::ImageLoadError(path.to_path_buf(), e))?;

  Ok(ImageFrame::new(path, image.into_rgb8()))
}
