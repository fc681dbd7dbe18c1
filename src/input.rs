// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/input.rs - 图像输入
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
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{InvalidOrientation, Orientation, RawImage},
  url_query,
};

mod read_folder;
mod read_image_file;

pub use self::read_folder::{FolderInput, FolderInputError};
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum OrientationParamError {
  #[error("方向参数不是整数: {0}")]
  NotInteger(String),
  #[error(transparent)]
  Invalid(#[from] InvalidOrientation),
}

/// 读取 `orientation` 查询参数，缺省为 0 度
pub(crate) fn orientation_param(url: &Url) -> Result<Orientation, OrientationParamError> {
  match url_query(url, "orientation") {
    Some(value) => {
      let degrees = value
        .trim()
        .parse::<i32>()
        .map_err(|_| OrientationParamError::NotInteger(value.clone()))?;
      Ok(Orientation::from_degrees(degrees)?)
    }
    None => Ok(Orientation::Deg0),
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Folder input error: {0}")]
  FolderInputError(#[from] FolderInputError),
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  ImageFile(ImageFileInput),
  Folder(FolderInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?)),
      FolderInput::SCHEME => Ok(InputWrapper::Folder(FolderInput::from_url(url)?)),
      other => Err(InputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = RawImage;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ImageFile(input) => input.next(),
      InputWrapper::Folder(input) => input.next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn orientation_param_defaults_to_zero() {
    let url = Url::parse("image:///a.jpg").unwrap();
    assert_eq!(orientation_param(&url).unwrap(), Orientation::Deg0);
  }

  #[test]
  fn orientation_param_is_validated() {
    let url = Url::parse("image:///a.jpg?orientation=270").unwrap();
    assert_eq!(orientation_param(&url).unwrap(), Orientation::Deg270);

    let odd = Url::parse("image:///a.jpg?orientation=30").unwrap();
    assert!(matches!(
      orientation_param(&odd),
      Err(OrientationParamError::Invalid(InvalidOrientation(30)))
    ));

    let text = Url::parse("image:///a.jpg?orientation=left").unwrap();
    assert!(matches!(
      orientation_param(&text),
      Err(OrientationParamError::NotInteger(_))
    ));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("v4l2:///dev/video0").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch(_))
    ));
  }
}
