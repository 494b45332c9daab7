use crate::error::{AdvisorError, Result};
use crate::ingest::types::PriceTable;
use ndarray::{s, Array1, Array2, Axis};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Annualized return and risk inputs for the frontier, one column per ticker.
#[derive(Debug, Clone)]
pub struct Estimates {
    pub tickers: Vec<String>,
    pub expected_returns: Array1<f64>,
    pub covariance: Array2<f64>,
}

impl Estimates {
    pub fn from_prices(prices: &PriceTable) -> Result<Self> {
        // Two returns are the minimum for a sample covariance.
        if prices.len() < 3 {
            return Err(AdvisorError::MarketData(anyhow::anyhow!(
                "insufficient price history: {} rows",
                prices.len()
            )));
        }

        let expected_returns = mean_historical_return(prices.values(), TRADING_DAYS_PER_YEAR);
        let covariance = sample_cov(prices.values(), TRADING_DAYS_PER_YEAR);

        if expected_returns.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
            return Err(AdvisorError::Optimization(
                "return estimates are not finite".to_string(),
            ));
        }

        Ok(Self {
            tickers: prices.tickers().to_vec(),
            expected_returns,
            covariance,
        })
    }
}

/// Simple period-over-period returns. `prices` must have at least two rows.
pub fn daily_returns(prices: &Array2<f64>) -> Array2<f64> {
    let rows = prices.nrows();
    let prev = prices.slice(s![..rows - 1, ..]);
    let next = prices.slice(s![1.., ..]);
    &next / &prev - 1.0
}

/// Compounded (geometric) mean return, annualized with `frequency` periods per year.
pub fn mean_historical_return(prices: &Array2<f64>, frequency: f64) -> Array1<f64> {
    let returns = daily_returns(prices);
    returns
        .axis_iter(Axis(1))
        .map(|col| {
            let growth: f64 = col.iter().map(|r| 1.0 + r).product();
            growth.powf(frequency / col.len() as f64) - 1.0
        })
        .collect()
}

/// Annualized sample covariance (ddof = 1) of simple returns.
pub fn sample_cov(prices: &Array2<f64>, frequency: f64) -> Array2<f64> {
    let returns = daily_returns(prices);
    let periods = returns.nrows();
    let n = returns.ncols();
    let Some(mean) = returns.mean_axis(Axis(0)) else {
        return Array2::zeros((n, n));
    };
    let centered = &returns - &mean;
    centered.t().dot(&centered) / (periods as f64 - 1.0) * frequency
}
