// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/processor.rs - 图像预处理与张量归一化
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

use image::{RgbImage, imageops};
use thiserror::Error;

use crate::frame::NhwcTensor;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessorError {
  #[error("归一化参数无效: mean={mean}, std={std}（std 必须为正的有限值）")]
  InvalidNormalize { mean: f32, std: f32 },
}

/// 仿射归一化 `(v - mean) / std`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeOp {
  mean: f32,
  std: f32,
}

impl Default for NormalizeOp {
  fn default() -> Self {
    Self {
      mean: 0.0,
      std: 1.0,
    }
  }
}

impl NormalizeOp {
  pub fn new(mean: f32, std: f32) -> Result<Self, ProcessorError> {
    if !mean.is_finite() || !std.is_finite() || std <= 0.0 {
      return Err(ProcessorError::InvalidNormalize { mean, std });
    }
    Ok(Self { mean, std })
  }

  pub(crate) const fn from_parts(mean: f32, std: f32) -> Self {
    Self { mean, std }
  }

  pub fn mean(&self) -> f32 {
    self.mean
  }

  pub fn std(&self) -> f32 {
    self.std
  }

  #[inline]
  pub fn apply(&self, value: f32) -> f32 {
    (value - self.mean) / self.std
  }

  pub fn apply_all(&self, values: &[f32]) -> Vec<f32> {
    values.iter().map(|&v| self.apply(v)).collect()
  }
}

/// 单步图像变换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOp {
  /// 居中裁剪或补黑边到指定尺寸
  ResizeWithCropOrPad { width: u32, height: u32 },
  /// 最近邻缩放
  Resize { width: u32, height: u32 },
  /// 逆时针旋转若干个 90 度
  Rot90 { quarter_turns: u8 },
}

impl ImageOp {
  pub fn apply(&self, image: &RgbImage) -> RgbImage {
    match *self {
      ImageOp::ResizeWithCropOrPad { width, height } => {
        resize_with_crop_or_pad(image, width, height)
      }
      ImageOp::Resize { width, height } => resize_nearest(image, width, height),
      ImageOp::Rot90 { quarter_turns } => rot90(image, quarter_turns),
    }
  }
}

/// 按顺序执行图像变换，最后做像素归一化并展开为 NHWC 张量
#[derive(Debug, Clone, Default)]
pub struct ImageProcessor {
  ops: Vec<ImageOp>,
  normalize: NormalizeOp,
}

impl ImageProcessor {
  pub fn add(mut self, op: ImageOp) -> Self {
    self.ops.push(op);
    self
  }

  pub fn normalize(mut self, normalize: NormalizeOp) -> Self {
    self.normalize = normalize;
    self
  }

  pub fn ops(&self) -> &[ImageOp] {
    &self.ops
  }

  pub fn transform(&self, image: &RgbImage) -> RgbImage {
    let mut iter = self.ops.iter();
    let Some(first) = iter.next() else {
      return image.clone();
    };
    iter.fold(first.apply(image), |acc, op| op.apply(&acc))
  }

  pub fn process(&self, image: &RgbImage) -> NhwcTensor {
    let transformed = self.transform(image);
    to_tensor(&transformed, &self.normalize)
  }
}

fn crop_or_pad_axis(src: u32, target: u32) -> (u32, u32, u32) {
  // (源偏移, 目标偏移, 拷贝长度)
  if src > target {
    ((src - target) / 2, 0, target)
  } else {
    (0, (target - src) / 2, src)
  }
}

pub fn resize_with_crop_or_pad(image: &RgbImage, width: u32, height: u32) -> RgbImage {
  let (src_w, src_h) = image.dimensions();
  if (src_w, src_h) == (width, height) {
    return image.clone();
  }

  let (src_x, dst_x, copy_w) = crop_or_pad_axis(src_w, width);
  let (src_y, dst_y, copy_h) = crop_or_pad_axis(src_h, height);

  let region = imageops::crop_imm(image, src_x, src_y, copy_w, copy_h).to_image();
  let mut canvas = RgbImage::new(width, height);
  imageops::replace(&mut canvas, &region, dst_x as i64, dst_y as i64);
  canvas
}

pub fn resize_nearest(image: &RgbImage, width: u32, height: u32) -> RgbImage {
  if image.dimensions() == (width, height) {
    return image.clone();
  }
  imageops::resize(image, width, height, imageops::FilterType::Nearest)
}

pub fn rot90(image: &RgbImage, quarter_turns: u8) -> RgbImage {
  // image 的 rotate90 为顺时针，逆时针一次即顺时针三次
  match quarter_turns % 4 {
    0 => image.clone(),
    1 => imageops::rotate270(image),
    2 => imageops::rotate180(image),
    _ => imageops::rotate90(image),
  }
}

pub fn to_tensor(image: &RgbImage, normalize: &NormalizeOp) -> NhwcTensor {
  let (width, height) = image.dimensions();
  let data = image
    .pixels()
    .flat_map(|p| p.0)
    .map(|v| normalize.apply(v as f32))
    .collect();
  NhwcTensor::from_vec(width as usize, height as usize, data)
}
