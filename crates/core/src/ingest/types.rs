use anyhow::{ensure, Context};
use chrono::{DateTime, NaiveDate};
use ndarray::Array2;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Shared dates must cover at least this share (in percent) of the longest series, so one
/// short-lived ticker cannot shrink everyone else's estimation window.
pub const MIN_SHARED_COVERAGE_PCT: usize = 90;

/// Adjusted closes for one ticker, keyed by trading date.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: String,
    pub closes: BTreeMap<NaiveDate, f64>,
}

/// Dates × tickers matrix of adjusted closes with every cell populated.
#[derive(Debug, Clone)]
pub struct PriceTable {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    values: Array2<f64>,
}

impl PriceTable {
    /// Joins series on the dates all of them share. Any ticker without usable history, or with
    /// much less history than the others, fails the whole table.
    pub fn align(series: Vec<PriceSeries>) -> anyhow::Result<Self> {
        ensure!(!series.is_empty(), "no price series to align");

        for s in &series {
            ensure!(!s.closes.is_empty(), "empty price series for {}", s.ticker);
            if let Some((date, close)) = s.closes.iter().find(|(_, c)| !(c.is_finite() && **c > 0.0)) {
                anyhow::bail!("invalid close {close} for {} on {date}", s.ticker);
            }
        }

        let mut common: BTreeSet<NaiveDate> = series[0].closes.keys().copied().collect();
        for s in &series[1..] {
            common.retain(|d| s.closes.contains_key(d));
        }
        ensure!(
            common.len() >= 2,
            "price series share only {} trading dates",
            common.len()
        );

        let longest = series.iter().map(|s| s.closes.len()).max().unwrap_or_default();
        if common.len() * 100 < longest * MIN_SHARED_COVERAGE_PCT {
            let shortest = series
                .iter()
                .min_by_key(|s| s.closes.len())
                .unwrap_or(&series[0]);
            let first = shortest
                .closes
                .keys()
                .next()
                .map(ToString::to_string)
                .unwrap_or_default();
            anyhow::bail!(
                "insufficient history: {} has {} closes starting {first}, \
                 series share {} of {longest} trading dates",
                shortest.ticker,
                shortest.closes.len(),
                common.len()
            );
        }

        let dates: Vec<NaiveDate> = common.into_iter().collect();
        let tickers: Vec<String> = series.iter().map(|s| s.ticker.clone()).collect();
        let values = Array2::from_shape_fn((dates.len(), series.len()), |(row, col)| {
            series[col].closes[&dates[row]]
        });

        Ok(Self {
            tickers,
            dates,
            values,
        })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartEnvelope {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartError {
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: ChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartMeta {
    pub symbol: String,
    #[serde(default)]
    pub gmtoffset: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartIndicators {
    #[serde(default)]
    pub adjclose: Vec<AdjClose>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjClose {
    pub adjclose: Vec<Option<f64>>,
}

impl ChartResponse {
    pub fn into_series(self, ticker: &str) -> anyhow::Result<PriceSeries> {
        if let Some(err) = self.chart.error {
            anyhow::bail!(
                "chart error for {ticker}: {} ({})",
                err.code,
                err.description.unwrap_or_default()
            );
        }

        let result = self
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .with_context(|| format!("chart response for {ticker} has no result"))?;
        result.into_series()
    }
}

impl ChartResult {
    pub fn into_series(self) -> anyhow::Result<PriceSeries> {
        let ticker = self.meta.symbol;
        let adjclose = self
            .indicators
            .adjclose
            .into_iter()
            .next()
            .with_context(|| format!("chart response for {ticker} has no adjclose"))?
            .adjclose;

        ensure!(
            adjclose.len() == self.timestamp.len(),
            "chart response for {ticker} has {} timestamps but {} closes",
            self.timestamp.len(),
            adjclose.len()
        );

        let mut closes = BTreeMap::new();
        for (ts, close) in self.timestamp.into_iter().zip(adjclose) {
            // Halted or not-yet-settled sessions come back as null.
            let Some(close) = close else { continue };
            let date = DateTime::from_timestamp(ts + self.meta.gmtoffset, 0)
                .with_context(|| format!("timestamp {ts} out of range for {ticker}"))?
                .date_naive();
            closes.insert(date, close);
        }

        Ok(PriceSeries { ticker, closes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(ticker: &str, rows: &[(u32, f64)]) -> PriceSeries {
        PriceSeries {
            ticker: ticker.to_string(),
            closes: rows
                .iter()
                .map(|(day, c)| (NaiveDate::from_ymd_opt(2026, 1, *day).unwrap(), *c))
                .collect(),
        }
    }

    fn days(range: std::ops::RangeInclusive<u32>) -> Vec<(u32, f64)> {
        range.map(|d| (d, f64::from(d))).collect()
    }

    #[test]
    fn align_keeps_only_shared_dates() {
        let mut agg = days(5..=14);
        agg.retain(|(d, _)| *d != 9);
        let table = PriceTable::align(vec![series("VOO", &days(5..=14)), series("AGG", &agg)])
            .unwrap();

        assert_eq!(table.tickers(), ["VOO".to_string(), "AGG".to_string()]);
        assert_eq!(table.len(), 9);
        assert_eq!(table.values()[[0, 0]], 5.0);
        assert_eq!(table.values()[[4, 1]], 10.0);
    }

    #[test]
    fn align_rejects_a_ticker_with_short_history() {
        let err = PriceTable::align(vec![
            series("VOO", &days(1..=30)),
            series("AGG", &days(1..=30)),
            series("XLE", &days(25..=30)),
        ])
        .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("insufficient history"), "{msg}");
        assert!(msg.contains("XLE"), "{msg}");
    }

    #[test]
    fn align_rejects_empty_series() {
        let err = PriceTable::align(vec![series("VOO", &[(5, 1.0), (6, 2.0)]), series("XLE", &[])])
            .unwrap_err();
        assert!(err.to_string().contains("XLE"));
    }

    #[test]
    fn align_rejects_non_positive_closes() {
        assert!(PriceTable::align(vec![series("VOO", &[(5, 1.0), (6, 0.0)])]).is_err());
    }

    #[test]
    fn parses_chart_response_and_skips_null_closes() {
        // 2026-01-05 14:30 UTC, then the next two sessions.
        let v = json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "VOO", "gmtoffset": -18000},
                    "timestamp": [1767623400, 1767709800, 1767796200],
                    "indicators": {
                        "quote": [{}],
                        "adjclose": [{"adjclose": [500.0, null, 505.5]}]
                    }
                }],
                "error": null
            }
        });

        let parsed: ChartResponse = serde_json::from_value(v).unwrap();
        let s = parsed.into_series("VOO").unwrap();
        assert_eq!(s.ticker, "VOO");
        assert_eq!(s.closes.len(), 2);
        assert_eq!(
            s.closes.get(&NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()),
            Some(&500.0)
        );
        assert_eq!(
            s.closes.get(&NaiveDate::from_ymd_opt(2026, 1, 7).unwrap()),
            Some(&505.5)
        );
    }

    #[test]
    fn mismatched_timestamps_and_closes_are_rejected() {
        let v = json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "QQQ", "gmtoffset": -18000},
                    "timestamp": [1767623400, 1767709800, 1767796200],
                    "indicators": {"adjclose": [{"adjclose": [400.0, 401.0]}]}
                }],
                "error": null
            }
        });
        let parsed: ChartResponse = serde_json::from_value(v).unwrap();
        let err = parsed.into_series("QQQ").unwrap_err();
        assert!(err.to_string().contains("3 timestamps but 2 closes"), "{err}");
    }

    #[test]
    fn chart_error_is_reported() {
        let v = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        });
        let parsed: ChartResponse = serde_json::from_value(v).unwrap();
        let err = parsed.into_series("NOPE").unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }
}
