// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/output/json_record.rs - JSON 行记录输出
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

use std::{
  collections::BTreeMap,
  fs::{File, OpenOptions},
  io::Write,
  path::{Path, PathBuf},
  sync::Mutex,
};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RawImage,
  model::PredictionMap,
  output::{
    Render,
    buy_link::{BuyLinkError, BuyLinkTable},
  },
  url_path, url_query,
};

#[derive(Error, Debug)]
pub enum JsonRecordOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("购买链接表错误: {0}")]
  BuyLinkError(#[from] BuyLinkError),
  #[error("记录文件锁已损坏")]
  Poisoned,
  #[error("分类结果为空")]
  EmptyResult,
}

/// 每次分类写入一行 JSON
#[derive(Debug, Serialize)]
pub struct ClassificationRecord<'a> {
  pub timestamp: String,
  pub source: &'a str,
  pub orientation: i32,
  pub label: &'a str,
  pub probability: f32,
  pub buy_link: Option<&'a str>,
  pub predictions: BTreeMap<&'a str, f32>,
}

pub struct JsonRecordOutput {
  path: PathBuf,
  links: BuyLinkTable,
  file: Mutex<File>,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonRecordOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let links = BuyLinkTable::from_optional_file(url_query(url, "links").as_deref())?;
    JsonRecordOutput::create(url_path(url), links)
  }
}

impl JsonRecordOutput {
  /// 以追加方式打开记录文件，必要时创建上级目录
  pub fn create(
    path: impl AsRef<Path>,
    links: BuyLinkTable,
  ) -> Result<Self, JsonRecordOutputError> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    info!("分类记录写入: {}", path.display());

    Ok(Self {
      path,
      links,
      file: Mutex::new(file),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn record<'a>(
    &'a self,
    frame: &'a RawImage,
    result: &'a PredictionMap,
  ) -> Result<ClassificationRecord<'a>, JsonRecordOutputError> {
    let (label, probability) = result.top().ok_or(JsonRecordOutputError::EmptyResult)?;
    Ok(ClassificationRecord {
      timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
      source: &frame.source,
      orientation: frame.orientation.degrees(),
      label,
      probability,
      buy_link: self.links.link_for(label),
      predictions: result.iter().collect(),
    })
  }
}

impl Render<RawImage, PredictionMap> for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn render_result(&self, frame: &RawImage, result: &PredictionMap) -> Result<(), Self::Error> {
    let record = self.record(frame, result)?;
    let line = serde_json::to_string(&record)?;

    let mut file = self
      .file
      .lock()
      .map_err(|_| JsonRecordOutputError::Poisoned)?;
    writeln!(file, "{}", line)?;
    file.flush()?;

    debug!("写入分类记录: {}", record.label);
    Ok(())
  }
}
