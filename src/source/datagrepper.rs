//! HTTP client for the datagrepper `raw` endpoint.
//!
//! Every request carries the configured timeout; failures are returned as-is
//! and never retried.

use crate::config::SourceConfig;
use crate::source::provider::{EventSource, RangeQuery};
use crate::source::{EventPage, RawEvent};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct TotalResponse {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    pages: u32,
    #[serde(default)]
    raw_messages: Vec<RawEvent>,
}

pub struct DatagrepperSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl DatagrepperSource {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(concat!("fedweek/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build datagrepper HTTP client")?;
        Ok(Self {
            url: cfg.url.clone(),
            client,
        })
    }

    fn get(&self, params: &[(&str, String)]) -> Result<String> {
        let resp = self
            .client
            .get(&self.url)
            .query(params)
            .send()
            .with_context(|| format!("request {}", self.url))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("{} returned HTTP {status}", self.url);
        }
        resp.text()
            .with_context(|| format!("read response body from {}", self.url))
    }
}

pub(crate) fn base_params(query: &RangeQuery) -> Vec<(&'static str, String)> {
    vec![
        ("start", query.start.to_string()),
        ("end", query.end.to_string()),
        ("topic", query.topic.clone()),
    ]
}

pub(crate) fn page_params(
    query: &RangeQuery,
    page: u32,
    rows_per_page: u32,
) -> Vec<(&'static str, String)> {
    let mut params = base_params(query);
    params.push(("rows_per_page", rows_per_page.to_string()));
    params.push(("page", page.to_string()));
    params.push(("meta", "usernames".to_string()));
    params
}

pub(crate) fn parse_total(body: &str) -> Result<u64> {
    let parsed: TotalResponse =
        serde_json::from_str(body).context("parse datagrepper total response")?;
    Ok(parsed.total)
}

pub(crate) fn parse_page(body: &str) -> Result<EventPage> {
    let parsed: PageResponse =
        serde_json::from_str(body).context("parse datagrepper page response")?;
    Ok(EventPage {
        pages: parsed.pages,
        events: parsed.raw_messages,
    })
}

impl EventSource for DatagrepperSource {
    fn total(&self, query: &RangeQuery) -> Result<u64> {
        let body = self.get(&base_params(query))?;
        parse_total(&body).with_context(|| format!("topic {}", query.topic))
    }

    fn page(&self, query: &RangeQuery, page: u32, rows_per_page: u32) -> Result<EventPage> {
        let body = self.get(&page_params(query, page, rows_per_page))?;
        parse_page(&body).with_context(|| format!("topic {} page {page}", query.topic))
    }
}
