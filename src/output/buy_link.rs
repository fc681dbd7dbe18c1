// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/output/buy_link.rs - 购买链接表
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

use std::{collections::HashMap, path::Path};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// 标签没有对应购买链接时显示的文字
pub const NO_BUY_LINK: &str = "暂无购买链接";

const SNEAKER_LINKS: [(&str, &str); 8] = [
  (
    "Air Jordan 11",
    "https://restocks.net/it/c/sneakers/air-jordan/Air-Jordan-11",
  ),
  ("Nike Blazer Mid", "https://stockx.com/search?s=blazer%20mid"),
  (
    "Nike Air Max 1",
    "https://restocks.net/it/c/sneakers/nike/air-max/air-max-1",
  ),
  (
    "Yeezy Boost 700",
    "https://restocks.net/it/c/sneakers/adidas/yeezy/700/v1",
  ),
  (
    "Yeezy Boost 350 V2",
    "https://restocks.net/it/c/sneakers/adidas/yeezy/350/v2",
  ),
  (
    "Air Jordan 4",
    "https://restocks.net/it/c/sneakers/air-jordan/air-jordan-4",
  ),
  (
    "Air Jordan 1 High",
    "https://restocks.net/it/c/sneakers/air-jordan/air-jordan-1/high",
  ),
  (
    "Yeezy Slide",
    "https://restocks.net/it/c/sneakers/adidas/yeezy/slide",
  ),
];

#[derive(Error, Debug)]
pub enum BuyLinkError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("标签 {label} 的购买链接无效: {url}")]
  InvalidUrl { label: String, url: String },
}

/// 标签到购买链接的显式映射，查不到时返回 `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuyLinkTable {
  links: HashMap<String, String>,
}

impl BuyLinkTable {
  /// 内置的球鞋购买链接
  pub fn sneakers() -> Self {
    let links = SNEAKER_LINKS
      .iter()
      .map(|&(label, url)| (label.to_string(), url.to_string()))
      .collect();
    Self { links }
  }

  /// 从 `{"标签": "链接"}` 形式的 JSON 对象读取
  pub fn from_json_str(text: &str) -> Result<Self, BuyLinkError> {
    let links: HashMap<String, String> = serde_json::from_str(text)?;
    for (label, url) in &links {
      if Url::parse(url).is_err() {
        return Err(BuyLinkError::InvalidUrl {
          label: label.clone(),
          url: url.clone(),
        });
      }
    }
    debug!("读取到 {} 条购买链接", links.len());
    Ok(Self { links })
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BuyLinkError> {
    let path = path.as_ref();
    info!("加载购买链接表: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  /// 链接表参数缺省时使用内置表
  pub fn from_optional_file(path: Option<&str>) -> Result<Self, BuyLinkError> {
    match path {
      Some(path) => Self::from_json_file(path),
      None => Ok(Self::sneakers()),
    }
  }

  pub fn insert(&mut self, label: impl Into<String>, url: impl Into<String>) {
    self.links.insert(label.into(), url.into());
  }

  pub fn link_for(&self, label: &str) -> Option<&str> {
    self.links.get(label).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.links.len()
  }

  pub fn is_empty(&self) -> bool {
    self.links.is_empty()
  }
}
