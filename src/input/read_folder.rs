// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/input/read_folder.rs - 目录批量输入
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

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Orientation, RawImage},
  input::{OrientationParamError, orientation_param, read_image_file::decode_rgb},
  url_path,
};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum FolderInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Orientation error: {0}")]
  OrientationError(#[from] OrientationParamError),
}

/// 按文件名顺序逐个读取目录中的图像，无法解码的文件会被跳过
pub struct FolderInput {
  paths: std::vec::IntoIter<PathBuf>,
  orientation: Orientation,
}

impl FromUrlWithScheme for FolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for FolderInput {
  type Error = FolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(FolderInputError::SchemaMismatch);
    }

    let orientation = orientation_param(url)?;
    FolderInput::open(url_path(url), orientation)
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      IMAGE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
    })
    .unwrap_or(false)
}

impl FolderInput {
  pub fn open(
    directory: impl AsRef<Path>,
    orientation: Orientation,
  ) -> Result<Self, FolderInputError> {
    let directory = directory.as_ref();
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && is_image(&path) {
        paths.push(path);
      }
    }
    paths.sort();

    info!("目录 {} 中找到 {} 张图像", directory.display(), paths.len());
    Ok(FolderInput {
      paths: paths.into_iter(),
      orientation,
    })
  }

  pub fn remaining(&self) -> usize {
    self.paths.len()
  }
}

impl Iterator for FolderInput {
  type Item = RawImage;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.paths.by_ref() {
      match decode_rgb(&path) {
        Ok(image) => {
          return Some(
            RawImage::new(image, self.orientation).with_source(path.display().to_string()),
          );
        }
        Err(e) => warn!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}
