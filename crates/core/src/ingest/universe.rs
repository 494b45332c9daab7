/// Broad equity, sector, bond and income ETFs the optimizer chooses from. AGG is listed twice;
/// the market data source returns one column per symbol, so the effective universe is smaller.
pub const DECLARED_UNIVERSE: [&str; 13] = [
    "VOO", "QQQ", "AGG", "VEA", "XLF", "XLK", "XLE", "XLV", "AGG", "TLT", "HYG", "IWM", "SCHD",
];

/// The declared universe without repeats, first occurrence wins.
pub fn instrument_universe() -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(DECLARED_UNIVERSE.len());
    for ticker in DECLARED_UNIVERSE {
        if !out.iter().any(|t| t == ticker) {
            out.push(ticker.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_drops_duplicate_agg() {
        let u = instrument_universe();
        assert_eq!(u.len(), 12);
        assert_eq!(u.iter().filter(|t| t.as_str() == "AGG").count(), 1);
        assert_eq!(u[0], "VOO");
        assert_eq!(u[11], "SCHD");
    }
}
