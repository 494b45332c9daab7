pub mod portfolio;

pub use portfolio::{Holding, PortfolioView, PortfolioWeights};
