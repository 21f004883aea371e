// 该文件是 Tuice （推测） 项目的一部分。
// src/input/read_image_dir.rs - 图像目录输入
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

use tracing::debug;

use super::{ImageFileInputError, InputError, read_image_file};
use crate::frame::ImageFrame;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub fn is_supported_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// 目录中的全部图片，按文件名排序，逐张延迟解码
#[derive(Debug, Clone)]
pub struct ImageDirInput {
  directory: PathBuf,
  paths: Vec<PathBuf>,
}

impl ImageDirInput {
  pub fn open(directory: &Path) -> Result<Self, InputError> {
    if !directory.is_dir() {
      return Err(InputError::DirectoryNotFound(directory.to_path_buf()));
    }

    let io_err = |e| InputError::Io(directory.to_path_buf(), e);
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(directory).map_err(io_err)? {
      let path = entry.map_err(io_err)?.path();
      if path.is_file() && is_supported_image(&path) {
        paths.push(path);
      }
    }

    if paths.is_empty() {
      return Err(InputError::NoImages(directory.to_path_buf()));
    }

    paths.sort();
    debug!("图像列表: {:?}", paths);

    Ok(Self {
      directory: directory.to_path_buf(),
      paths,
    })
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub fn paths(&self) -> &[PathBuf] {
    &self.paths
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }

  pub fn is_empty(&self) -> bool {
    self.paths.is_empty()
  }
}

impl IntoIterator for ImageDirInput {
  type Item = Result<ImageFrame, ImageFileInputError>;
  type IntoIter = ImageDirIter;

  fn into_iter(self) -> Self::IntoIter {
    ImageDirIter {
      paths: self.paths.into_iter(),
    }
  }
}

pub struct ImageDirIter {
  paths: std::vec::IntoIter<PathBuf>,
}

impl Iterator for ImageDirIter {
  type Item = Result<ImageFrame, ImageFileInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.paths.next().map(|path| read_image_file(&path))
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    self.paths.size_hint()
  }
}
