use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use radar_core::{lots_to_shares, Price, Side, TickerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AccountError, AccountResult};

/// Starting capital for new and reset accounts.
pub const DEFAULT_STARTING_CASH: i64 = 1_000_000;

/// Lots held in one ticker and their volume-weighted cost.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub lots: u64,
    pub average_cost: Price,
}

impl Holding {
    pub fn cost_basis(&self) -> Decimal {
        lots_to_shares(self.lots) * self.average_cost
    }
}

/// A simulated execution in whole round lots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: Uuid,
    pub ticker: TickerId,
    pub side: Side,
    pub lots: u64,
    pub price: Price,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn new(ticker: TickerId, side: Side, lots: u64, price: Price) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticker,
            side,
            lots,
            price,
            timestamp: Utc::now(),
        }
    }

    pub fn buy(ticker: impl Into<TickerId>, lots: u64, price: Price) -> Self {
        Self::new(ticker.into(), Side::Buy, lots, price)
    }

    pub fn sell(ticker: impl Into<TickerId>, lots: u64, price: Price) -> Self {
        Self::new(ticker.into(), Side::Sell, lots, price)
    }

    /// Cash value of the fill: lots × shares per lot × price.
    pub fn notional(&self) -> Decimal {
        lots_to_shares(self.lots) * self.price
    }
}

/// A user's simulated balance, holdings and fill history.
///
/// State only changes through [`Account::apply_fill`] and friends, each of which returns
/// a new validated account and leaves `self` untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub owner: String,
    pub starting_cash: Decimal,
    pub cash: Decimal,
    pub holdings: BTreeMap<TickerId, Holding>,
    pub history: Vec<Fill>,
}

impl Account {
    pub fn new(owner: impl Into<String>, starting_cash: Decimal) -> Self {
        Self {
            owner: owner.into(),
            starting_cash,
            cash: starting_cash,
            holdings: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    pub fn with_default_cash(owner: impl Into<String>) -> Self {
        Self::new(owner, Decimal::from(DEFAULT_STARTING_CASH))
    }

    pub fn holding(&self, ticker: &TickerId) -> Option<&Holding> {
        self.holdings.get(ticker)
    }

    /// Validates `fill` against the current state and returns the resulting account.
    pub fn apply_fill(&self, fill: Fill) -> AccountResult<Account> {
        if fill.lots == 0 {
            return Err(AccountError::ZeroLots);
        }
        if fill.price <= Decimal::ZERO {
            return Err(AccountError::NonPositivePrice(fill.price));
        }
        let notional = fill.notional();
        let mut next = self.clone();
        match fill.side {
            Side::Buy => {
                if notional > self.cash {
                    return Err(AccountError::InsufficientCash {
                        required: notional,
                        available: self.cash,
                    });
                }
                next.cash -= notional;
                let holding = next.holdings.entry(fill.ticker.clone()).or_insert(Holding {
                    lots: 0,
                    average_cost: Decimal::ZERO,
                });
                let lots = holding.lots + fill.lots;
                holding.average_cost = ((holding.cost_basis() + notional) / lots_to_shares(lots))
                    .round_dp(4);
                holding.lots = lots;
            }
            Side::Sell => {
                let held = self.holding(&fill.ticker).map_or(0, |holding| holding.lots);
                if fill.lots > held {
                    return Err(AccountError::InsufficientHoldings {
                        ticker: fill.ticker.clone(),
                        requested: fill.lots,
                        held,
                    });
                }
                next.cash += notional;
                if fill.lots == held {
                    next.holdings.remove(&fill.ticker);
                } else if let Some(holding) = next.holdings.get_mut(&fill.ticker) {
                    holding.lots -= fill.lots;
                }
            }
        }
        next.history.push(fill);
        Ok(next)
    }

    /// Sells every holding at its average cost.
    pub fn liquidate_at_cost(&self) -> AccountResult<Account> {
        self.holdings
            .iter()
            .map(|(ticker, holding)| Fill::sell(ticker.clone(), holding.lots, holding.average_cost))
            .try_fold(self.clone(), |account, fill| account.apply_fill(fill))
    }

    /// Restores starting capital and clears holdings and history.
    #[must_use]
    pub fn reset(&self) -> Account {
        Account::new(self.owner.clone(), self.starting_cash)
    }

    /// Cash plus holdings valued at `quotes`, falling back to average cost.
    pub fn equity(&self, quotes: &HashMap<TickerId, Price>) -> Decimal {
        self.holdings
            .iter()
            .map(|(ticker, holding)| {
                let price = quotes.get(ticker).copied().unwrap_or(holding.average_cost);
                lots_to_shares(holding.lots) * price
            })
            .fold(self.cash, |total, value| total + value)
    }

    /// Unrealised profit relative to starting capital at the given quotes.
    pub fn profit(&self, quotes: &HashMap<TickerId, Price>) -> Decimal {
        self.equity(quotes) - self.starting_cash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account() -> Account {
        Account::with_default_cash("alice")
    }

    #[test]
    fn buy_debits_cash_and_records_holding() {
        let next = account().apply_fill(Fill::buy("2330.TW", 2, dec!(100))).unwrap();
        assert_eq!(next.cash, dec!(800000));
        let holding = next.holding(&TickerId::from("2330.TW")).unwrap();
        assert_eq!(holding.lots, 2);
        assert_eq!(holding.average_cost, dec!(100));
        assert_eq!(next.history.len(), 1);
    }

    #[test]
    fn buy_averages_cost() {
        let next = account()
            .apply_fill(Fill::buy("2330.TW", 1, dec!(100)))
            .and_then(|a| a.apply_fill(Fill::buy("2330.TW", 3, dec!(120))))
            .unwrap();
        let holding = next.holding(&TickerId::from("2330.TW")).unwrap();
        assert_eq!(holding.lots, 4);
        assert_eq!(holding.average_cost, dec!(115));
    }

    #[test]
    fn apply_fill_leaves_receiver_untouched() {
        let start = account();
        let _ = start.apply_fill(Fill::buy("2330.TW", 1, dec!(100))).unwrap();
        assert_eq!(start.cash, dec!(1000000));
        assert!(start.holdings.is_empty());
    }

    #[test]
    fn rejects_invalid_fills() {
        let start = account();
        assert_eq!(
            start.apply_fill(Fill::buy("2330.TW", 0, dec!(100))),
            Err(AccountError::ZeroLots)
        );
        assert_eq!(
            start.apply_fill(Fill::buy("2330.TW", 1, dec!(0))),
            Err(AccountError::NonPositivePrice(dec!(0)))
        );
        assert_eq!(
            start.apply_fill(Fill::buy("2330.TW", 2, dec!(600))),
            Err(AccountError::InsufficientCash {
                required: dec!(1200000),
                available: dec!(1000000)
            })
        );
        assert!(matches!(
            start.apply_fill(Fill::sell("2330.TW", 1, dec!(100))),
            Err(AccountError::InsufficientHoldings { held: 0, .. })
        ));
    }

    #[test]
    fn selling_everything_removes_holding() {
        let next = account()
            .apply_fill(Fill::buy("2330.TW", 2, dec!(100)))
            .and_then(|a| a.apply_fill(Fill::sell("2330.TW", 1, dec!(110))))
            .unwrap();
        assert_eq!(next.holding(&TickerId::from("2330.TW")).unwrap().lots, 1);
        assert_eq!(next.cash, dec!(910000));
        let flat = next.apply_fill(Fill::sell("2330.TW", 1, dec!(90))).unwrap();
        assert!(flat.holdings.is_empty());
        assert_eq!(flat.cash, dec!(1000000));
    }

    #[test]
    fn liquidation_and_reset() {
        let held = account()
            .apply_fill(Fill::buy("2330.TW", 2, dec!(100)))
            .and_then(|a| a.apply_fill(Fill::buy("2317.TW", 1, dec!(150))))
            .unwrap();
        let liquidated = held.liquidate_at_cost().unwrap();
        assert!(liquidated.holdings.is_empty());
        assert_eq!(liquidated.cash, dec!(1000000));
        assert_eq!(liquidated.history.len(), 4);

        let reset = held.reset();
        assert_eq!(reset.cash, dec!(1000000));
        assert!(reset.history.is_empty());
    }

    #[test]
    fn equity_uses_quotes_then_cost() {
        let held = account()
            .apply_fill(Fill::buy("2330.TW", 1, dec!(100)))
            .and_then(|a| a.apply_fill(Fill::buy("2317.TW", 1, dec!(50))))
            .unwrap();
        let quotes = HashMap::from([(TickerId::from("2330.TW"), dec!(110))]);
        assert_eq!(held.equity(&quotes), dec!(1010000));
        assert_eq!(held.profit(&quotes), dec!(10000));
    }
}
