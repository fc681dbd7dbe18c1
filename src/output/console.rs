// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/output/console.rs - 终端输出
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
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RawImage,
  model::PredictionMap,
  output::{
    Render,
    buy_link::{BuyLinkError, BuyLinkTable, NO_BUY_LINK},
  },
  url_query,
};

#[derive(Error, Debug)]
pub enum ConsoleOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("参数 top 无效: {0}")]
  InvalidTop(String),
  #[error("购买链接表错误: {0}")]
  BuyLinkError(#[from] BuyLinkError),
  #[error("分类结果为空")]
  EmptyResult,
}

/// 在终端打印最可能的鞋款和购买链接
pub struct ConsoleOutput {
  links: BuyLinkTable,
  top: usize,
}

impl Default for ConsoleOutput {
  fn default() -> Self {
    Self {
      links: BuyLinkTable::sneakers(),
      top: 1,
    }
  }
}

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConsoleOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let links = BuyLinkTable::from_optional_file(url_query(url, "links").as_deref())?;
    let top = match url_query(url, "top") {
      Some(value) => match value.parse::<usize>() {
        Ok(top) if top > 0 => top,
        _ => return Err(ConsoleOutputError::InvalidTop(value)),
      },
      None => 1,
    };

    Ok(ConsoleOutput { links, top })
  }
}

impl ConsoleOutput {
  pub fn new(links: BuyLinkTable, top: usize) -> Self {
    Self {
      links,
      top: top.max(1),
    }
  }

  /// 生成要打印的文字，第一行为结论，之后为购买链接和候选列表
  pub fn summary(
    &self,
    frame: &RawImage,
    result: &PredictionMap,
  ) -> Result<Vec<String>, ConsoleOutputError> {
    let (label, probability) = result.top().ok_or(ConsoleOutputError::EmptyResult)?;

    let prefix = if frame.source.is_empty() {
      String::new()
    } else {
      format!("{}: ", frame.source)
    };

    let mut lines = vec![
      format!(
        "{}这双鞋是 {}，概率 {:.2}%",
        prefix,
        label,
        probability * 100.0
      ),
      format!(
        "购买链接: {}",
        self.links.link_for(label).unwrap_or(NO_BUY_LINK)
      ),
    ];

    if self.top > 1 {
      for (rank, (label, probability)) in result.top_k(self.top).into_iter().enumerate() {
        lines.push(format!("  {}. {} {:.2}%", rank + 1, label, probability * 100.0));
      }
    }

    Ok(lines)
  }
}

impl Render<RawImage, PredictionMap> for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn render_result(&self, frame: &RawImage, result: &PredictionMap) -> Result<(), Self::Error> {
    let lines = self.summary(frame, result)?;
    info!("{}", lines[0]);
    for line in lines {
      println!("{}", line);
    }
    Ok(())
  }
}
