use crate::domain::portfolio::PortfolioWeights;
use crate::error::{AdvisorError, Result};
use crate::ingest::provider::MarketDataClient;
use crate::ingest::universe::instrument_universe;
use crate::optimizer::{
    clean_weights, EfficientFrontier, Estimates, Performance, WeightBounds, CLEAN_CUTOFF,
    CLEAN_ROUNDING,
};
use crate::questionnaire::AnswerSet;
use crate::scoring::{RiskScore, ScoreTable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const LOOKBACK_YEARS: u32 = 5;
pub const WEIGHT_CAP: f64 = 0.25;
pub const RISK_FREE_RATE: f64 = 0.02;

/// How the optimizer is asked for a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocationMode {
    /// Minimum risk subject to an expected annual return of at least `target`.
    TargetReturn { target: f64 },
    /// Maximum return per unit of risk.
    MaxSharpe,
}

impl AllocationMode {
    /// Half-open score bands, lowest first. A score of exactly 4.0 goes to max Sharpe.
    pub fn from_score(score: RiskScore) -> Self {
        let s = score.value();
        if s < 2.0 {
            Self::TargetReturn { target: 0.05 }
        } else if s < 3.0 {
            Self::TargetReturn { target: 0.08 }
        } else if s < 4.0 {
            Self::TargetReturn { target: 0.11 }
        } else {
            Self::MaxSharpe
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Allocation {
    pub mode: AllocationMode,
    pub weights: PortfolioWeights,
    pub performance: Performance,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub score: RiskScore,
    pub allocation: Allocation,
}

#[derive(Clone)]
pub struct AllocationSelector {
    client: Arc<dyn MarketDataClient>,
    universe: Vec<String>,
    bounds: WeightBounds,
}

impl AllocationSelector {
    pub fn new(client: Arc<dyn MarketDataClient>) -> Self {
        Self::with_universe(client, instrument_universe())
    }

    pub fn with_universe(client: Arc<dyn MarketDataClient>, universe: Vec<String>) -> Self {
        Self {
            client,
            universe,
            bounds: WeightBounds {
                lower: 0.0,
                upper: WEIGHT_CAP,
            },
        }
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    /// Scores a session's answers and builds the matching portfolio. Nothing is fetched or
    /// solved when the questionnaire was never completed.
    pub async fn recommend(
        &self,
        table: &ScoreTable,
        answers: Option<&AnswerSet>,
    ) -> Result<Recommendation> {
        let score = table.score_session(answers)?;
        let allocation = self.select(score).await?;
        Ok(Recommendation { score, allocation })
    }

    pub async fn select(&self, score: RiskScore) -> Result<Allocation> {
        let mode = AllocationMode::from_score(score);

        let prices = self
            .client
            .fetch_adjusted_closes(&self.universe, LOOKBACK_YEARS)
            .await
            .map_err(AdvisorError::MarketData)?;

        tracing::info!(
            provider = self.client.provider_name(),
            rows = prices.len(),
            tickers = prices.tickers().len(),
            "fetched price history"
        );

        let missing: Vec<&str> = self
            .universe
            .iter()
            .filter(|t| !prices.tickers().contains(*t))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AdvisorError::MarketData(anyhow::anyhow!(
                "price history missing for {}",
                missing.join(", ")
            )));
        }

        let estimates = Estimates::from_prices(&prices)?;
        let bounds = self.bounds;

        let allocation = tokio::task::spawn_blocking(move || solve(estimates, bounds, mode))
            .await
            .map_err(|e| AdvisorError::Optimization(format!("solver task failed: {e}")))??;

        tracing::info!(
            risk_score = score.value(),
            ?mode,
            holdings = allocation.weights.len(),
            expected_return = allocation.performance.expected_return,
            volatility = allocation.performance.volatility,
            "portfolio selected"
        );

        Ok(allocation)
    }
}

pub fn solve(
    estimates: Estimates,
    bounds: WeightBounds,
    mode: AllocationMode,
) -> Result<Allocation> {
    let frontier = EfficientFrontier::new(estimates, bounds)?;

    let raw = match mode {
        AllocationMode::TargetReturn { target } => frontier.efficient_return(target)?,
        AllocationMode::MaxSharpe => frontier.max_sharpe(RISK_FREE_RATE)?,
    };

    let cleaned = clean_weights(&raw, CLEAN_CUTOFF, Some(CLEAN_ROUNDING));
    let performance = frontier.portfolio_performance(&cleaned, RISK_FREE_RATE);
    let weights =
        PortfolioWeights::from_cleaned(frontier.tickers().iter().zip(cleaned.iter().copied()));

    if weights.is_empty() {
        return Err(AdvisorError::Optimization(
            "solver returned an empty portfolio".to_string(),
        ));
    }

    Ok(Allocation {
        mode,
        weights,
        performance,
    })
}
