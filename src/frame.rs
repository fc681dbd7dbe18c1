// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/frame.rs - 输入帧与 NHWC 张量定义
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

use std::fmt;

use image::RgbImage;
use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("拍摄方向必须是 90 度的整数倍, 实际为 {0}")]
pub struct InvalidOrientation(pub i32);

/// 拍摄方向，图像在分类前按该方向逆时针旋转回正
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Orientation {
  #[default]
  Deg0,
  Deg90,
  Deg180,
  Deg270,
}

impl Orientation {
  /// 非 90 度整数倍的角度直接拒绝；负角度和超过一周的角度按 360 取余
  pub fn from_degrees(degrees: i32) -> Result<Self, InvalidOrientation> {
    if degrees % 90 != 0 {
      return Err(InvalidOrientation(degrees));
    }
    Ok(match degrees.rem_euclid(360) / 90 {
      0 => Orientation::Deg0,
      1 => Orientation::Deg90,
      2 => Orientation::Deg180,
      _ => Orientation::Deg270,
    })
  }

  pub fn degrees(self) -> i32 {
    self.quarter_turns() as i32 * 90
  }

  pub fn quarter_turns(self) -> u8 {
    match self {
      Orientation::Deg0 => 0,
      Orientation::Deg90 => 1,
      Orientation::Deg180 => 2,
      Orientation::Deg270 => 3,
    }
  }
}

impl TryFrom<i32> for Orientation {
  type Error = InvalidOrientation;

  fn try_from(degrees: i32) -> Result<Self, Self::Error> {
    Orientation::from_degrees(degrees)
  }
}

impl fmt::Display for Orientation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}°", self.degrees())
  }
}

/// 待分类的原始图像，由调用方持有
#[derive(Debug, Clone)]
pub struct RawImage {
  pub image: RgbImage,
  pub orientation: Orientation,
  /// 图像来源（文件路径等），仅用于输出记录
  pub source: String,
}

impl RawImage {
  pub fn new(image: RgbImage, orientation: Orientation) -> Self {
    Self {
      image,
      orientation,
      source: String::new(),
    }
  }

  pub fn with_source(mut self, source: impl Into<String>) -> Self {
    self.source = source.into();
    self
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

const I8_OFFSET: f32 = 128.0;

/// 归一化后的 NHWC 张量，batch 固定为 1
#[derive(Debug, Clone, PartialEq)]
pub struct NhwcTensor {
  width: usize,
  height: usize,
  data: Box<[f32]>,
}

impl NhwcTensor {
  pub(crate) fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
    debug_assert_eq!(data.len(), width * height * RGB_CHANNELS);
    Self {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// [N, H, W, C]
  pub fn shape(&self) -> [usize; 4] {
    [1, self.height, self.width, RGB_CHANNELS]
  }

  pub fn as_nhwc(&self) -> &[f32] {
    &self.data
  }

  pub fn pixel(&self, x: usize, y: usize) -> [f32; RGB_CHANNELS] {
    let idx = (y * self.width + x) * RGB_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  pub fn to_u8(&self) -> Vec<u8> {
    self
      .data
      .iter()
      .map(|v| v.round().clamp(u8::MIN as f32, u8::MAX as f32) as u8)
      .collect()
  }

  /// 有符号输入沿用 u8 的取值区间，整体平移 128：0 对应 -128，255 对应 127
  pub fn to_i8(&self) -> Vec<i8> {
    self
      .data
      .iter()
      .map(|v| (v.round() - I8_OFFSET).clamp(i8::MIN as f32, i8::MAX as f32) as i8)
      .collect()
  }
}
