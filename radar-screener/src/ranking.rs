use radar_config::RankingPolicy;
use radar_core::CandidateResult;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Orders candidates per `policy`, then truncates to `cap`.
///
/// Candidates are expected in universe order; `Unordered` keeps that order.
pub fn rank(
    policy: RankingPolicy,
    cap: Option<usize>,
    mut candidates: Vec<CandidateResult>,
) -> Vec<CandidateResult> {
    match policy {
        RankingPolicy::VolumeDescending => candidates.sort_by(|a, b| {
            b.volume_lots
                .cmp(&a.volume_lots)
                .then_with(|| a.ticker.cmp(&b.ticker))
        }),
        RankingPolicy::Unordered => {}
        RankingPolicy::RandomSample { seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            candidates.shuffle(&mut rng);
        }
    }
    if let Some(cap) = cap {
        candidates.truncate(cap);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use radar_core::TickerId;
    use rust_decimal::Decimal;

    fn candidate(ticker: &str, lots: u64) -> CandidateResult {
        CandidateResult {
            ticker: TickerId::from(ticker),
            industry: None,
            as_of: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            price: Decimal::ONE_HUNDRED,
            volume_lots: lots,
            stop_loss: Decimal::ONE,
            take_profit: Decimal::TWO,
            strategy: None,
            convergence: Decimal::ZERO,
            bias: Decimal::ZERO,
            volume_ratio: Decimal::TWO,
        }
    }

    fn tickers(candidates: &[CandidateResult]) -> Vec<&str> {
        candidates.iter().map(|c| c.ticker.as_str()).collect()
    }

    #[test]
    fn volume_descending_breaks_ties_by_ticker() {
        let ranked = rank(
            RankingPolicy::VolumeDescending,
            None,
            vec![candidate("C", 5), candidate("B", 9), candidate("A", 5)],
        );
        assert_eq!(tickers(&ranked), vec!["B", "A", "C"]);
    }

    #[test]
    fn cap_applies_after_ordering() {
        let ranked = rank(
            RankingPolicy::VolumeDescending,
            Some(2),
            vec![candidate("A", 1), candidate("B", 3), candidate("C", 2)],
        );
        assert_eq!(tickers(&ranked), vec!["B", "C"]);
    }

    #[test]
    fn unordered_keeps_input_order() {
        let ranked = rank(
            RankingPolicy::Unordered,
            Some(2),
            vec![candidate("Z", 1), candidate("A", 3), candidate("M", 2)],
        );
        assert_eq!(tickers(&ranked), vec!["Z", "A"]);
    }

    #[test]
    fn seeded_sample_is_reproducible() {
        let pool: Vec<_> = (0..20).map(|i| candidate(&format!("{i:04}"), i)).collect();
        let policy = RankingPolicy::RandomSample { seed: Some(7) };
        let first = rank(policy, Some(5), pool.clone());
        let second = rank(policy, Some(5), pool.clone());
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert!(first.iter().all(|c| pool.contains(c)));
    }
}
