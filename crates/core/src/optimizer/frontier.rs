use crate::error::{AdvisorError, Result};
use crate::optimizer::estimators::Estimates;
use ndarray::{Array1, Array2};
use serde::Serialize;

const MAX_INNER_ITERS: usize = 20_000;
const INNER_TOL: f64 = 1e-11;
const BISECTION_ITERS: usize = 80;
const MAX_TRADEOFF_DOUBLINGS: usize = 40;
const GOLDEN_SECTION_ITERS: usize = 60;
const MIN_LOG_TRADEOFF: f64 = -14.0;
const RETURN_TOL: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightBounds {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Performance {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

/// Long-only mean-variance frontier with per-asset weight bounds and a fully invested budget.
///
/// Frontier portfolios are found by minimizing `wᵀΣw - t·μᵀw` over the bounded simplex for a
/// risk/return tradeoff `t >= 0`. `t = 0` is the minimum-variance portfolio and the return of
/// the solution is nondecreasing in `t`, which lets both solve modes search over `t` alone.
#[derive(Debug, Clone)]
pub struct EfficientFrontier {
    tickers: Vec<String>,
    expected_returns: Array1<f64>,
    cov: Array2<f64>,
    bounds: WeightBounds,
    step: f64,
}

impl EfficientFrontier {
    pub fn new(estimates: Estimates, bounds: WeightBounds) -> Result<Self> {
        let Estimates {
            tickers,
            expected_returns,
            covariance: cov,
        } = estimates;
        let n = tickers.len();

        if n == 0 {
            return Err(AdvisorError::Optimization("no assets to optimize".to_string()));
        }
        if expected_returns.len() != n || cov.dim() != (n, n) {
            return Err(AdvisorError::Optimization(format!(
                "dimension mismatch: {n} tickers, {} returns, {:?} covariance",
                expected_returns.len(),
                cov.dim()
            )));
        }
        if !(bounds.lower.is_finite() && bounds.upper.is_finite())
            || bounds.lower < 0.0
            || bounds.lower > bounds.upper
        {
            return Err(AdvisorError::Optimization(format!(
                "invalid weight bounds {bounds:?}"
            )));
        }
        if (n as f64) * bounds.upper < 1.0 - 1e-12 || (n as f64) * bounds.lower > 1.0 + 1e-12 {
            return Err(AdvisorError::Infeasible(format!(
                "{n} weights bounded by [{}, {}] cannot sum to 1",
                bounds.lower, bounds.upper
            )));
        }

        // Gershgorin bound on the largest eigenvalue of Σ gives a safe gradient step.
        let row_bound = cov
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
            .fold(0.0_f64, f64::max);
        let lipschitz = 2.0 * row_bound;
        let step = if lipschitz > 0.0 { 1.0 / lipschitz } else { 1.0 };

        Ok(Self {
            tickers,
            expected_returns,
            cov,
            bounds,
            step,
        })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn portfolio_return(&self, weights: &Array1<f64>) -> f64 {
        weights.dot(&self.expected_returns)
    }

    pub fn portfolio_volatility(&self, weights: &Array1<f64>) -> f64 {
        weights.dot(&self.cov.dot(weights)).max(0.0).sqrt()
    }

    pub fn portfolio_performance(&self, weights: &Array1<f64>, risk_free_rate: f64) -> Performance {
        let expected_return = self.portfolio_return(weights);
        let volatility = self.portfolio_volatility(weights);
        let sharpe_ratio = if volatility > 0.0 {
            (expected_return - risk_free_rate) / volatility
        } else {
            0.0
        };
        Performance {
            expected_return,
            volatility,
            sharpe_ratio,
        }
    }

    /// Highest return reachable under the bounds: fill the best assets up to the cap in order.
    pub fn max_return_portfolio(&self) -> (f64, Array1<f64>) {
        let WeightBounds { lower, upper } = self.bounds;
        let n = self.tickers.len();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| self.expected_returns[b].total_cmp(&self.expected_returns[a]));

        let mut weights = Array1::from_elem(n, lower);
        let mut remaining = 1.0 - n as f64 * lower;
        for i in order {
            if remaining <= 0.0 {
                break;
            }
            let add = (upper - lower).min(remaining);
            weights[i] += add;
            remaining -= add;
        }

        (self.portfolio_return(&weights), weights)
    }

    pub fn min_volatility(&self) -> Array1<f64> {
        self.minimize_tradeoff(0.0, &self.uniform_weights())
    }

    /// Minimum-variance portfolio whose expected return is at least `target_return`.
    pub fn efficient_return(&self, target_return: f64) -> Result<Array1<f64>> {
        if !target_return.is_finite() {
            return Err(AdvisorError::Optimization(format!(
                "target return must be finite (got {target_return})"
            )));
        }

        let (max_return, max_weights) = self.max_return_portfolio();
        if target_return > max_return + RETURN_TOL {
            return Err(AdvisorError::Infeasible(format!(
                "target return {target_return:.4} is unreachable; the best attainable under weight bounds [{}, {}] is {max_return:.4}",
                self.bounds.lower, self.bounds.upper
            )));
        }
        if target_return >= max_return - RETURN_TOL {
            return Ok(max_weights);
        }

        let min_var = self.min_volatility();
        if self.portfolio_return(&min_var) >= target_return {
            return Ok(min_var);
        }

        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        let mut best = self.minimize_tradeoff(hi, &min_var);
        let mut doublings = 0;
        while self.portfolio_return(&best) < target_return {
            doublings += 1;
            if doublings > MAX_TRADEOFF_DOUBLINGS {
                return Err(AdvisorError::Optimization(format!(
                    "solver could not reach target return {target_return:.4}"
                )));
            }
            lo = hi;
            hi *= 2.0;
            best = self.minimize_tradeoff(hi, &best);
        }

        let mut warm = best.clone();
        for _ in 0..BISECTION_ITERS {
            if hi - lo <= 1e-12 * hi {
                break;
            }
            let mid = 0.5 * (lo + hi);
            let candidate = self.minimize_tradeoff(mid, &warm);
            let ret = self.portfolio_return(&candidate);
            if ret >= target_return {
                hi = mid;
                best = candidate.clone();
                if ret - target_return < 1e-9 {
                    break;
                }
            } else {
                lo = mid;
            }
            warm = candidate;
        }

        Ok(best)
    }

    /// Tangency portfolio: maximum `(μᵀw - rf) / σ(w)` along the frontier.
    pub fn max_sharpe(&self, risk_free_rate: f64) -> Result<Array1<f64>> {
        if !self.expected_returns.iter().any(|&m| m > risk_free_rate) {
            return Err(AdvisorError::Infeasible(format!(
                "at least one asset must have an expected return above the risk-free rate {risk_free_rate}"
            )));
        }

        let sharpe = |w: &Array1<f64>| self.portfolio_performance(w, risk_free_rate).sharpe_ratio;

        let min_var = self.min_volatility();
        let (max_return, max_weights) = self.max_return_portfolio();

        let mut t_max = 1.0_f64;
        let mut frontier_end = self.minimize_tradeoff(t_max, &min_var);
        for _ in 0..MAX_TRADEOFF_DOUBLINGS {
            if self.portfolio_return(&frontier_end) >= max_return - RETURN_TOL {
                break;
            }
            t_max *= 2.0;
            frontier_end = self.minimize_tradeoff(t_max, &frontier_end);
        }

        // Sharpe is unimodal along the frontier; search it in log-tradeoff space.
        let phi = (5f64.sqrt() - 1.0) / 2.0;
        let mut a = MIN_LOG_TRADEOFF;
        let mut b = t_max.ln().max(a + 1.0);
        let mut c = b - phi * (b - a);
        let mut d = a + phi * (b - a);
        let mut wc = self.minimize_tradeoff(c.exp(), &min_var);
        let mut wd = self.minimize_tradeoff(d.exp(), &wc);
        let mut fc = sharpe(&wc);
        let mut fd = sharpe(&wd);

        for _ in 0..GOLDEN_SECTION_ITERS {
            if fc >= fd {
                b = d;
                d = c;
                fd = fc;
                wd = wc;
                c = b - phi * (b - a);
                wc = self.minimize_tradeoff(c.exp(), &wd);
                fc = sharpe(&wc);
            } else {
                a = c;
                c = d;
                fc = fd;
                wc = wd;
                d = a + phi * (b - a);
                wd = self.minimize_tradeoff(d.exp(), &wc);
                fd = sharpe(&wd);
            }
        }

        let interior = if fc >= fd { wc } else { wd };
        [min_var, interior, frontier_end, max_weights]
            .into_iter()
            .max_by(|x, y| sharpe(x).total_cmp(&sharpe(y)))
            .ok_or_else(|| AdvisorError::Optimization("no frontier candidates".to_string()))
    }

    fn uniform_weights(&self) -> Array1<f64> {
        let n = self.tickers.len();
        Array1::from_elem(n, 1.0 / n as f64)
    }

    /// Accelerated projected gradient on `wᵀΣw - t·μᵀw`, warm-started from `start`.
    fn minimize_tradeoff(&self, tradeoff: f64, start: &Array1<f64>) -> Array1<f64> {
        let mut x = self.project(start);
        let mut y = x.clone();
        let mut momentum = 1.0_f64;

        for _ in 0..MAX_INNER_ITERS {
            let grad = 2.0 * self.cov.dot(&y) - tradeoff * &self.expected_returns;
            let next = self.project(&(&y - &(self.step * &grad)));
            let next_momentum = (1.0 + (1.0 + 4.0 * momentum * momentum).sqrt()) / 2.0;
            let delta = &next - &x;
            let change = delta.iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));

            y = &next + &(((momentum - 1.0) / next_momentum) * &delta);
            x = next;
            momentum = next_momentum;

            if change < INNER_TOL {
                break;
            }
        }

        x
    }

    /// Euclidean projection onto `{w : lower <= w_i <= upper, Σw = 1}`.
    ///
    /// The projection is `clamp(v - τ)` for the `τ` that makes the budget hold; the clamped sum
    /// is piecewise linear in `τ` with breakpoints at `v_i - upper` and `v_i - lower`.
    fn project(&self, v: &Array1<f64>) -> Array1<f64> {
        let WeightBounds { lower, upper } = self.bounds;
        let clamped_sum =
            |tau: f64| -> f64 { v.iter().map(|x| (x - tau).clamp(lower, upper)).sum() };

        let mut breakpoints: Vec<f64> = v.iter().flat_map(|&x| [x - upper, x - lower]).collect();
        breakpoints.sort_by(|a, b| a.total_cmp(b));

        let mut prev = breakpoints[0];
        let mut prev_sum = clamped_sum(prev);
        let mut tau = breakpoints[breakpoints.len() - 1];
        for &point in &breakpoints[1..] {
            let sum = clamped_sum(point);
            if sum <= 1.0 {
                tau = if prev_sum - sum > f64::EPSILON {
                    prev + (prev_sum - 1.0) * (point - prev) / (prev_sum - sum)
                } else {
                    point
                };
                break;
            }
            prev = point;
            prev_sum = sum;
        }

        v.mapv(|x| (x - tau).clamp(lower, upper))
    }
}

/// Zeroes weights below `cutoff` in magnitude and rounds the rest to `rounding` decimals.
pub fn clean_weights(weights: &Array1<f64>, cutoff: f64, rounding: Option<u32>) -> Array1<f64> {
    weights.mapv(|w| {
        if w.abs() < cutoff {
            return 0.0;
        }
        match rounding {
            Some(places) => {
                let scale = 10f64.powi(places as i32);
                (w * scale).round() / scale
            }
            None => w,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn estimates(mu: Array1<f64>, cov: Array2<f64>) -> Estimates {
        Estimates {
            tickers: (0..mu.len()).map(|i| format!("T{i}")).collect(),
            expected_returns: mu,
            covariance: cov,
        }
    }

    /// Eight uncorrelated assets with rising return and rising volatility.
    fn ladder() -> Estimates {
        let n = 8;
        let mu = Array1::from_shape_fn(n, |i| 0.02 + 0.02 * i as f64);
        let cov = Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                let vol = 0.05 + 0.03 * i as f64;
                vol * vol
            } else {
                0.0
            }
        });
        estimates(mu, cov)
    }

    const CAPPED: WeightBounds = WeightBounds {
        lower: 0.0,
        upper: 0.25,
    };

    fn assert_feasible(w: &Array1<f64>, bounds: WeightBounds) {
        assert!((w.sum() - 1.0).abs() < 1e-8, "sum = {}", w.sum());
        for &x in w {
            assert!(x >= bounds.lower - 1e-9 && x <= bounds.upper + 1e-9, "weight {x}");
        }
    }

    #[test]
    fn projection_lands_on_bounded_simplex() {
        let ef = EfficientFrontier::new(ladder(), CAPPED).unwrap();
        let p = ef.project(&array![3.0, -1.0, 0.2, 0.2, 0.1, 0.0, 0.0, 0.0]);
        assert_feasible(&p, CAPPED);
        assert!((p[0] - 0.25).abs() < 1e-12);
        assert_eq!(p[1], 0.0);
    }

    #[test]
    fn projection_keeps_feasible_points() {
        let ef = EfficientFrontier::new(ladder(), CAPPED).unwrap();
        let w = array![0.25, 0.25, 0.2, 0.1, 0.1, 0.05, 0.05, 0.0];
        let p = ef.project(&w);
        for (a, b) in p.iter().zip(w.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_bounds_that_cannot_sum_to_one() {
        let err = EfficientFrontier::new(
            ladder(),
            WeightBounds {
                lower: 0.0,
                upper: 0.1,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AdvisorError::Infeasible(_)));
    }

    #[test]
    fn max_return_fills_best_assets_to_the_cap() {
        let ef = EfficientFrontier::new(ladder(), CAPPED).unwrap();
        let (ret, w) = ef.max_return_portfolio();
        assert_eq!(w.to_vec(), vec![0.0, 0.0, 0.0, 0.0, 0.25, 0.25, 0.25, 0.25]);
        assert!((ret - (0.10 + 0.12 + 0.14 + 0.16) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn min_volatility_matches_inverse_variance_weights() {
        // Two uncorrelated assets, loose bounds: w_i ∝ 1/σ_i².
        let ef = EfficientFrontier::new(
            estimates(array![0.05, 0.05], array![[0.04, 0.0], [0.0, 0.01]]),
            WeightBounds {
                lower: 0.0,
                upper: 1.0,
            },
        )
        .unwrap();
        let w = ef.min_volatility();
        assert!((w[0] - 0.2).abs() < 1e-6, "{w}");
        assert!((w[1] - 0.8).abs() < 1e-6, "{w}");
    }

    #[test]
    fn efficient_return_meets_target_within_bounds() {
        let ef = EfficientFrontier::new(ladder(), CAPPED).unwrap();
        let w = ef.efficient_return(0.11).unwrap();
        assert_feasible(&w, CAPPED);
        assert!(ef.portfolio_return(&w) >= 0.11 - 1e-6);

        // Lower-variance than naive max-return for the same or lower target.
        let (_, max_w) = ef.max_return_portfolio();
        assert!(ef.portfolio_volatility(&w) <= ef.portfolio_volatility(&max_w) + 1e-9);
    }

    #[test]
    fn efficient_return_below_min_variance_return_is_min_variance() {
        let ef = EfficientFrontier::new(ladder(), CAPPED).unwrap();
        let min_var = ef.min_volatility();
        let w = ef.efficient_return(0.0).unwrap();
        for (a, b) in w.iter().zip(min_var.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn unreachable_target_is_infeasible() {
        let ef = EfficientFrontier::new(ladder(), CAPPED).unwrap();
        let err = ef.efficient_return(0.20).unwrap_err();
        assert!(matches!(err, AdvisorError::Infeasible(_)));
    }

    #[test]
    fn max_sharpe_beats_frontier_endpoints() {
        let ef = EfficientFrontier::new(ladder(), CAPPED).unwrap();
        let rf = 0.02;
        let w = ef.max_sharpe(rf).unwrap();
        assert_feasible(&w, CAPPED);

        let best = ef.portfolio_performance(&w, rf).sharpe_ratio;
        let min_var = ef.portfolio_performance(&ef.min_volatility(), rf).sharpe_ratio;
        let (_, max_w) = ef.max_return_portfolio();
        let max_ret = ef.portfolio_performance(&max_w, rf).sharpe_ratio;
        assert!(best >= min_var - 1e-9);
        assert!(best >= max_ret - 1e-9);
    }

    #[test]
    fn max_sharpe_requires_an_asset_above_risk_free() {
        let ef = EfficientFrontier::new(ladder(), CAPPED).unwrap();
        let err = ef.max_sharpe(0.5).unwrap_err();
        assert!(matches!(err, AdvisorError::Infeasible(_)));
    }

    #[test]
    fn clean_weights_drops_noise_and_rounds() {
        let w = array![0.123456789, 0.00005, -0.00002, 0.876543211];
        let cleaned = clean_weights(&w, 1e-4, Some(5));
        assert_eq!(cleaned.to_vec(), vec![0.12346, 0.0, 0.0, 0.87654]);
    }
}
