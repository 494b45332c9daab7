use crate::allocation::{Allocation, AllocationMode};
use crate::optimizer::Performance;
use crate::scoring::RiskScore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ticker → weight with zero weights removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortfolioWeights(BTreeMap<String, f64>);

impl PortfolioWeights {
    pub fn from_cleaned<'a, I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, f64)>,
    {
        Self(
            weights
                .into_iter()
                .filter(|(_, w)| *w > 0.0)
                .map(|(t, w)| (t.clone(), w))
                .collect(),
        )
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.0.get(ticker).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub weight: f64,
    pub percent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSlice {
    pub label: String,
    pub value: f64,
    pub autopct: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PieChart {
    pub title: String,
    pub slices: Vec<ChartSlice>,
}

/// What the Portfolio view shows for one scored questionnaire.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioView {
    pub risk_score: RiskScore,
    pub risk_score_text: String,
    pub mode: AllocationMode,
    pub holdings: Vec<Holding>,
    pub chart: PieChart,
    pub performance: Performance,
}

impl PortfolioView {
    pub fn new(score: RiskScore, allocation: &Allocation) -> Self {
        let holdings = allocation
            .weights
            .iter()
            .map(|(ticker, weight)| Holding {
                ticker: ticker.to_string(),
                weight,
                percent: format!("{:.2}%", weight * 100.0),
            })
            .collect();

        let total = allocation.weights.total();
        let slices = allocation
            .weights
            .iter()
            .map(|(ticker, weight)| {
                let share = if total > 0.0 { weight / total } else { 0.0 };
                ChartSlice {
                    label: ticker.to_string(),
                    value: weight,
                    autopct: format!("{:.1}%", share * 100.0),
                }
            })
            .collect();

        Self {
            risk_score: score,
            risk_score_text: format!("Your risk score is {score} out of 5"),
            mode: allocation.mode,
            holdings,
            chart: PieChart {
                title: "Portfolio Allocation".to_string(),
                slices,
            },
            performance: allocation.performance,
        }
    }
}
