//! Ticker list parsing for comparisons and overrides.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TickerListError {
    #[error("empty ticker in list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Splits on commas or whitespace, upper-cases, and rejects duplicates.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, TickerListError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    let tokens: Vec<&str> = if input.contains(',') {
        input.split(',').map(str::trim).collect()
    } else {
        input.split_whitespace().collect()
    };
    if tokens.is_empty() {
        return Err(TickerListError::EmptyToken);
    }

    for token in tokens {
        if token.is_empty() {
            return Err(TickerListError::EmptyToken);
        }
        let ticker = token.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(TickerListError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_separated() {
        assert_eq!(parse_tickers("SPY,QQQ, vti").unwrap(), vec!["SPY", "QQQ", "VTI"]);
    }

    #[test]
    fn whitespace_separated() {
        assert_eq!(parse_tickers("spy  qqq").unwrap(), vec!["SPY", "QQQ"]);
    }

    #[test]
    fn single() {
        assert_eq!(parse_tickers("SPY").unwrap(), vec!["SPY"]);
    }

    #[test]
    fn empty_token() {
        assert_eq!(parse_tickers("SPY,,QQQ"), Err(TickerListError::EmptyToken));
        assert_eq!(parse_tickers("   "), Err(TickerListError::EmptyToken));
    }

    #[test]
    fn duplicate() {
        assert_eq!(
            parse_tickers("SPY,QQQ,spy"),
            Err(TickerListError::DuplicateTicker("SPY".into()))
        );
    }
}
