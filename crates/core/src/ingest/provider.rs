use crate::config::Settings;
use crate::ingest::types::{ChartResponse, PriceSeries, PriceTable};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;

const CHART_PATH: &str = "/v8/finance/chart";
const CLIENT_USER_AGENT: &str = "Mozilla/5.0 (compatible; portfolio-advisor/0.1)";

#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Adjusted daily closes for every ticker over the trailing `lookback_years`.
    async fn fetch_adjusted_closes(
        &self,
        tickers: &[String],
        lookback_years: u32,
    ) -> Result<PriceTable>;
}

#[derive(Debug, Clone)]
pub struct YahooChartProvider {
    http: reqwest::Client,
    base_url: String,
}

impl YahooChartProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.market_data_timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url: settings.market_data_base_url.clone(),
        })
    }

    fn url(&self, ticker: &str) -> String {
        format!("{}{CHART_PATH}/{ticker}", self.base_url.trim_end_matches('/'))
    }

    async fn fetch_series(&self, ticker: &str, lookback_years: u32) -> Result<PriceSeries> {
        let res = self
            .http
            .get(self.url(ticker))
            .query(&[
                ("range", format!("{lookback_years}y")),
                ("interval", "1d".to_string()),
                ("events", "div,splits".to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("market data request failed for {ticker}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read market data response for {ticker}"))?;

        decode_chart(ticker, status, &text)
    }
}

fn decode_chart(ticker: &str, status: StatusCode, body: &str) -> Result<PriceSeries> {
    if !status.is_success() {
        anyhow::bail!("market data HTTP {status} for {ticker}: {body}");
    }

    let parsed = serde_json::from_str::<ChartResponse>(body)
        .with_context(|| format!("failed to parse chart response for {ticker}"))?;
    parsed.into_series(ticker)
}

#[async_trait::async_trait]
impl MarketDataClient for YahooChartProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_adjusted_closes(
        &self,
        tickers: &[String],
        lookback_years: u32,
    ) -> Result<PriceTable> {
        let mut series = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let s = self.fetch_series(ticker, lookback_years).await?;
            tracing::debug!(%ticker, rows = s.closes.len(), "fetched price series");
            series.push(s);
        }
        PriceTable::align(series)
    }
}
