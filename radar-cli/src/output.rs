use std::collections::HashMap;
use std::fmt::Write as _;

use anyhow::Result;
use radar_paper::Account;
use radar_screener::ScanOutcome;

/// Renders scan results as a fixed-width table followed by a summary line.
pub fn scan_table(outcome: &ScanOutcome) -> String {
    let mut out = String::new();
    if outcome.candidates.is_empty() {
        out.push_str("no candidates\n");
    } else {
        let _ = writeln!(
            out,
            "{:<10} {:<26} {:>10} {:>8} {:>10} {:>10}  {}",
            "TICKER", "INDUSTRY", "PRICE", "LOTS", "STOP", "TARGET", "STRATEGY"
        );
        for candidate in &outcome.candidates {
            let _ = writeln!(
                out,
                "{:<10} {:<26} {:>10} {:>8} {:>10} {:>10}  {}",
                candidate.ticker.as_str(),
                candidate.industry.as_deref().unwrap_or("-"),
                candidate.price,
                candidate.volume_lots,
                candidate.stop_loss,
                candidate.take_profit,
                candidate
                    .strategy
                    .map(|label| label.description())
                    .unwrap_or("-"),
            );
        }
    }
    let _ = writeln!(
        out,
        "{} candidates, {} excluded, {} of {} tickers evaluated",
        outcome.candidates.len(),
        outcome.exclusions.len(),
        outcome.evaluated,
        outcome.universe_size,
    );
    if outcome.is_degraded() {
        let _ = writeln!(
            out,
            "warning: {} batches failed, {} tickers not scanned",
            outcome.failed_batches.len(),
            outcome.unscanned().count(),
        );
    }
    out
}

pub fn scan_json(outcome: &ScanOutcome) -> Result<String> {
    Ok(serde_json::to_string_pretty(outcome)?)
}

/// Cash, holdings at cost and total equity.
pub fn account_summary(account: &Account) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "account: {}", account.owner);
    let _ = writeln!(out, "cash: {}", account.cash);
    if account.holdings.is_empty() {
        out.push_str("holdings: none\n");
    } else {
        let _ = writeln!(out, "{:<10} {:>6} {:>12}", "TICKER", "LOTS", "AVG COST");
        for (ticker, holding) in &account.holdings {
            let _ = writeln!(
                out,
                "{:<10} {:>6} {:>12}",
                ticker.as_str(),
                holding.lots,
                holding.average_cost
            );
        }
    }
    let _ = writeln!(out, "equity at cost: {}", account.equity(&HashMap::new()));
    let _ = writeln!(out, "fills: {}", account.history.len());
    out
}
