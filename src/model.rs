// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/model.rs - 模型
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

use thiserror::Error;

use crate::{
  frame::{InvalidOrientation, NhwcTensor},
  processor::ProcessorError,
};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 张量元素类型，量化类型按其存储类型归类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
  F32,
  U8,
  I8,
}

impl fmt::Display for ElementType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ElementType::F32 => "f32",
      ElementType::U8 => "u8",
      ElementType::I8 => "i8",
    };
    f.write_str(name)
  }
}

/// 模型声明的张量形状与元素类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
  pub shape: Vec<usize>,
  pub element_type: ElementType,
}

impl TensorSpec {
  pub fn new(shape: impl Into<Vec<usize>>, element_type: ElementType) -> Self {
    Self {
      shape: shape.into(),
      element_type,
    }
  }

  pub fn element_count(&self) -> usize {
    self.shape.iter().product()
  }
}

/// 推理后端，负责执行单输入单输出的模型
///
/// `run` 通过 `&self` 调用，每次调用自行分配状态，因此后端可被多个线程共享。
pub trait Backend {
  fn input_spec(&self) -> &TensorSpec;
  fn output_spec(&self) -> &TensorSpec;
  /// 返回输出张量的原始数值，量化输出不做反量化
  fn run(&self, input: &NhwcTensor) -> Result<Vec<f32>, ClassifierError>;
}

#[derive(Error, Debug)]
pub enum ClassifierError {
  #[error("模型加载错误: {0}")]
  ModelLoad(String),
  #[error("标签数量与模型输出不匹配: 标签 {labels} 个, 输出 {outputs} 个")]
  LabelMismatch { labels: usize, outputs: usize },
  #[error("标签文件无效: {0}")]
  InvalidLabels(String),
  #[error("推理错误: {0}")]
  Inference(String),
  #[error(transparent)]
  InvalidOrientation(#[from] InvalidOrientation),
  #[error("图像无效: {0}")]
  InvalidImage(String),
  #[error("配置无效: {0}")]
  InvalidConfig(String),
  #[error("模型路径错误: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

impl From<ProcessorError> for ClassifierError {
  fn from(err: ProcessorError) -> Self {
    ClassifierError::InvalidConfig(err.to_string())
  }
}

impl ClassifierError {
  pub fn model_load(msg: impl Into<String>) -> Self {
    ClassifierError::ModelLoad(msg.into())
  }

  pub fn inference(msg: impl Into<String>) -> Self {
    ClassifierError::Inference(msg.into())
  }
}

/// 一次分类的结果：标签到概率的映射，保持标签文件中的顺序
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionMap {
  entries: Vec<(String, f32)>,
}

impl PredictionMap {
  pub(crate) fn from_entries(entries: Vec<(String, f32)>) -> Self {
    Self { entries }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn get(&self, label: &str) -> Option<f32> {
    self
      .entries
      .iter()
      .find(|(l, _)| l == label)
      .map(|&(_, p)| p)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
    self.entries.iter().map(|(l, p)| (l.as_str(), *p))
  }

  pub fn labels(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(l, _)| l.as_str())
  }

  /// 概率最高的一项，并列时取标签顺序靠前者
  pub fn top(&self) -> Option<(&str, f32)> {
    self.top_k(1).into_iter().next()
  }

  /// 按概率降序取前 k 项
  pub fn top_k(&self, k: usize) -> Vec<(&str, f32)> {
    let mut sorted: Vec<(&str, f32)> = self.iter().collect();
    // 稳定排序，保证并列时保持标签顺序
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    sorted.truncate(k);
    sorted
  }

}

impl IntoIterator for PredictionMap {
  type Item = (String, f32);
  type IntoIter = std::vec::IntoIter<(String, f32)>;

  fn into_iter(self) -> Self::IntoIter {
    self.entries.into_iter()
  }
}

mod classifier;
mod labels;
mod tflite;

pub use self::classifier::{Classifier, ClassifierBuilder, ClassifierOptions};
pub use self::labels::Labels;
pub use self::tflite::TfliteBackend;
