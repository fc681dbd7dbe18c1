// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/model/labels.rs - 标签列表
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

use std::{collections::HashSet, path::Path, sync::Arc};

use tracing::debug;

use crate::model::ClassifierError;

/// 有序标签列表，第 i 个标签对应输出张量的第 i 个位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
  labels: Arc<[String]>,
}

impl Labels {
  /// 每行一个标签，去掉首尾空白并跳过空行
  pub fn from_text(text: &str) -> Result<Self, ClassifierError> {
    let labels: Vec<String> = text
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();

    if labels.is_empty() {
      return Err(ClassifierError::InvalidLabels("标签列表为空".to_string()));
    }

    let mut seen = HashSet::with_capacity(labels.len());
    for label in &labels {
      if !seen.insert(label.as_str()) {
        return Err(ClassifierError::InvalidLabels(format!(
          "标签重复: {}",
          label
        )));
      }
    }

    debug!("读取到 {} 个标签", labels.len());
    Ok(Self {
      labels: labels.into(),
    })
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    Self::from_text(&text)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.labels.iter().map(String::as_str)
  }
}
