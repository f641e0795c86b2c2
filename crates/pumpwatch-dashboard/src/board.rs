/*
[INPUT]:  Token trade events (create / buy / sell), SOL/USD prices, wall-clock time
[OUTPUT]: Token board with derived SOL/USD values, large transactions, price history, snapshots
[POS]:    Aggregation layer - pure dashboard state (no I/O)
[UPDATE]: When changing derived metrics, filters, or retention limits
*/

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use pumpwatch_adapter::{PumpTradeEvent, TxType};

const DEFAULT_CURVE_TOKENS: u64 = 1_000_000_000;

/// Retention and filter limits for the board.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSettings {
    /// Trades worth more than this (USD) are kept as large transactions.
    pub large_transaction_usd: Decimal,
    pub max_large_transactions: usize,
    pub max_tokens_displayed: usize,
    /// Tokens without activity for this long leave the filtered view.
    pub inactive_after: Duration,
    /// A dev balance below `previous * rug_ratio` marks the token rugged.
    pub rug_ratio: Decimal,
    pub price_history_len: usize,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            large_transaction_usd: Decimal::from(1_000),
            max_large_transactions: 20,
            max_tokens_displayed: 20,
            inactive_after: Duration::from_secs(300),
            rug_ratio: Decimal::new(3, 1),
            price_history_len: 30,
        }
    }
}

/// Values a token had before its latest trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValues {
    pub market_cap_sol: Decimal,
    pub market_cap_usd: Decimal,
    pub dev_balance: Decimal,
    pub dev_value_sol: Decimal,
    pub dev_value_usd: Decimal,
    pub est_token_price_sol: Decimal,
    pub est_token_price_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenData {
    pub name: String,
    pub symbol: String,
    pub mint: String,
    pub signature: String,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub v_tokens_in_bonding_curve: Decimal,
    pub has_dev_activity: bool,
    pub current: TokenValues,
    pub previous: Option<TokenValues>,
}

impl TokenData {
    fn from_create(event: &PumpTradeEvent, sol_price: Option<Decimal>, now: DateTime<Utc>) -> Self {
        let curve = event
            .v_tokens_in_bonding_curve
            .filter(|v| !v.is_zero())
            .unwrap_or_else(|| Decimal::from(DEFAULT_CURVE_TOKENS));
        let mut token = Self {
            name: event.name.clone().unwrap_or_default(),
            symbol: event.symbol.clone().unwrap_or_default(),
            mint: event.mint.clone(),
            signature: event.signature.clone(),
            creator: event.trader_public_key.clone(),
            created_at: now,
            last_update: now,
            v_tokens_in_bonding_curve: curve,
            has_dev_activity: true,
            current: TokenValues {
                market_cap_sol: event.market_cap_sol.unwrap_or_default(),
                market_cap_usd: Decimal::ZERO,
                dev_balance: event.initial_buy.unwrap_or_default(),
                dev_value_sol: Decimal::ZERO,
                dev_value_usd: Decimal::ZERO,
                est_token_price_sol: Decimal::ZERO,
                est_token_price_usd: Decimal::ZERO,
            },
            previous: None,
        };
        token.recompute(sol_price);
        token
    }

    fn apply_trade(&mut self, event: &PumpTradeEvent, sol_price: Option<Decimal>, now: DateTime<Utc>) {
        self.previous = Some(self.current.clone());
        if let Some(market_cap) = event.market_cap_sol {
            self.current.market_cap_sol = market_cap;
        }
        self.signature = event.signature.clone();
        self.last_update = now;

        if event.trader_public_key == self.creator {
            if let Some(balance) = event.new_token_balance {
                self.current.dev_balance = balance;
            }
            self.has_dev_activity = true;
        }
        self.recompute(sol_price);
    }

    fn recompute(&mut self, sol_price: Option<Decimal>) {
        let values = &mut self.current;
        values.est_token_price_sol = values
            .market_cap_sol
            .checked_div(self.v_tokens_in_bonding_curve)
            .unwrap_or_default();
        values.dev_value_sol = values.dev_balance.saturating_mul(values.est_token_price_sol);
        self.reprice(sol_price);
    }

    /// USD values follow the latest SOL price; without one they stay as they are.
    fn reprice(&mut self, sol_price: Option<Decimal>) {
        let Some(price) = sol_price else {
            return;
        };
        let values = &mut self.current;
        values.market_cap_usd = values.market_cap_sol.saturating_mul(price);
        values.dev_value_usd = values.dev_value_sol.saturating_mul(price);
        values.est_token_price_usd = values.est_token_price_sol.saturating_mul(price);
    }

    /// Dev balance fell below `ratio` of its previous value.
    pub fn is_rugged(&self, ratio: Decimal) -> bool {
        match &self.previous {
            Some(previous) if !previous.dev_balance.is_zero() => {
                self.current.dev_balance < previous.dev_balance.saturating_mul(ratio)
            }
            _ => false,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>, inactive_after: Duration) -> bool {
        now.signed_duration_since(self.last_update)
            .to_std()
            .map(|idle| idle < inactive_after)
            .unwrap_or(true)
    }

    pub fn market_cap_trend(&self) -> Trend {
        Trend::between(
            Some(self.current.market_cap_sol),
            self.previous.as_ref().map(|p| p.market_cap_sol),
        )
    }

    pub fn market_cap_change_pct(&self) -> Option<Decimal> {
        percent_change(
            self.current.market_cap_sol,
            self.previous.as_ref()?.market_cap_sol,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn between(current: Option<Decimal>, previous: Option<Decimal>) -> Self {
        match (current, previous) {
            (Some(current), Some(previous)) if current > previous => Trend::Up,
            (Some(current), Some(previous)) if current < previous => Trend::Down,
            _ => Trend::Flat,
        }
    }
}

/// `(current - previous) / previous * 100`; `None` when previous is zero.
pub fn percent_change(current: Decimal, previous: Decimal) -> Option<Decimal> {
    (current - previous)
        .checked_div(previous)
        .map(|ratio| ratio * Decimal::ONE_HUNDRED)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeTransaction {
    pub signature: String,
    pub token_mint: String,
    pub token_name: String,
    pub token_symbol: String,
    pub trader: String,
    pub timestamp: DateTime<Utc>,
    pub tx_type: TxType,
    pub amount_sol: Decimal,
    pub value_usd: Decimal,
    pub is_developer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: Decimal,
    pub is_increase: bool,
}

/// Outcome of feeding one trade event to the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardUpdate {
    /// New token; its trades should be subscribed.
    Created { mint: String },
    Traded { mint: String, large: bool },
    /// Trade for a mint the board does not track.
    Ignored,
}

/// Immutable view published to consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub sol_price: Option<Decimal>,
    pub prev_sol_price: Option<Decimal>,
    pub price_history: Vec<PricePoint>,
    /// Active, non-rugged tokens by market cap, capped.
    pub tokens: Vec<TokenData>,
    pub tracked_tokens: usize,
    pub large_buys: Vec<LargeTransaction>,
    pub large_sells: Vec<LargeTransaction>,
}

#[derive(Debug, Default)]
pub struct TokenBoard {
    settings: BoardSettings,
    tokens: HashMap<String, TokenData>,
    large_transactions: VecDeque<LargeTransaction>,
    sol_price: Option<Decimal>,
    prev_sol_price: Option<Decimal>,
    price_history: VecDeque<PricePoint>,
}

impl TokenBoard {
    pub fn new(settings: BoardSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn token(&self, mint: &str) -> Option<&TokenData> {
        self.tokens.get(mint)
    }

    pub fn tracked_mints(&self) -> Vec<String> {
        let mut mints: Vec<String> = self.tokens.keys().cloned().collect();
        mints.sort();
        mints
    }

    pub fn apply_trade(&mut self, event: &PumpTradeEvent, now: DateTime<Utc>) -> BoardUpdate {
        match event.tx_type {
            TxType::Create => {
                let token = TokenData::from_create(event, self.sol_price, now);
                debug!(mint = %token.mint, symbol = %token.symbol, "token created");
                self.tokens.insert(event.mint.clone(), token);
                BoardUpdate::Created {
                    mint: event.mint.clone(),
                }
            }
            TxType::Buy | TxType::Sell => {
                let sol_price = self.sol_price;
                let Some(token) = self.tokens.get_mut(&event.mint) else {
                    return BoardUpdate::Ignored;
                };
                token.apply_trade(event, sol_price, now);
                let large = self.record_large_transaction(event, now);
                BoardUpdate::Traded {
                    mint: event.mint.clone(),
                    large,
                }
            }
        }
    }

    fn record_large_transaction(&mut self, event: &PumpTradeEvent, now: DateTime<Utc>) -> bool {
        let (Some(price), Some(amount_sol)) = (self.sol_price, event.sol_amount) else {
            return false;
        };
        let value_usd = amount_sol.saturating_mul(price);
        if value_usd <= self.settings.large_transaction_usd {
            return false;
        }
        let Some(token) = self.tokens.get(&event.mint) else {
            return false;
        };

        self.large_transactions.push_front(LargeTransaction {
            signature: event.signature.clone(),
            token_mint: event.mint.clone(),
            token_name: token.name.clone(),
            token_symbol: token.symbol.clone(),
            trader: event.trader_public_key.clone(),
            timestamp: now,
            tx_type: event.tx_type,
            amount_sol,
            value_usd,
            is_developer: event.trader_public_key == token.creator,
        });
        self.large_transactions
            .truncate(self.settings.max_large_transactions);
        true
    }

    /// Record a new SOL/USD price and re-price every token.
    pub fn record_sol_price(&mut self, price: Decimal, now: DateTime<Utc>) {
        let is_increase = self
            .price_history
            .back()
            .map(|last| price > last.price)
            .unwrap_or(true);
        self.price_history.push_back(PricePoint {
            time: now,
            price,
            is_increase,
        });
        while self.price_history.len() > self.settings.price_history_len {
            self.price_history.pop_front();
        }

        self.prev_sol_price = self.sol_price;
        self.sol_price = Some(price);
        self.reprice();
    }

    pub fn reprice(&mut self) {
        let sol_price = self.sol_price;
        for token in self.tokens.values_mut() {
            token.reprice(sol_price);
        }
    }

    /// Forget tokens idle past the inactivity window; returns their mints.
    pub fn prune_inactive(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let inactive_after = self.settings.inactive_after;
        let mut pruned: Vec<String> = self
            .tokens
            .values()
            .filter(|token| !token.is_active(now, inactive_after))
            .map(|token| token.mint.clone())
            .collect();
        pruned.sort();
        for mint in &pruned {
            self.tokens.remove(mint);
        }
        pruned
    }

    /// Active, non-rugged tokens sorted by market cap (largest first), capped.
    pub fn filtered_tokens(&self, now: DateTime<Utc>) -> Vec<TokenData> {
        let mut tokens: Vec<TokenData> = self
            .tokens
            .values()
            .filter(|token| token.is_active(now, self.settings.inactive_after))
            .filter(|token| !token.is_rugged(self.settings.rug_ratio))
            .cloned()
            .collect();
        tokens.sort_by(|a, b| {
            b.current
                .market_cap_sol
                .cmp(&a.current.market_cap_sol)
                .then_with(|| a.mint.cmp(&b.mint))
        });
        tokens.truncate(self.settings.max_tokens_displayed);
        tokens
    }

    pub fn large_transactions(&self) -> impl Iterator<Item = &LargeTransaction> {
        self.large_transactions.iter()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> DashboardSnapshot {
        let (large_buys, large_sells): (Vec<_>, Vec<_>) = self
            .large_transactions()
            .cloned()
            .partition(|tx| tx.tx_type == TxType::Buy);
        DashboardSnapshot {
            sol_price: self.sol_price,
            prev_sol_price: self.prev_sol_price,
            price_history: self.price_history.iter().cloned().collect(),
            tokens: self.filtered_tokens(now),
            tracked_tokens: self.tokens.len(),
            large_buys,
            large_sells,
        }
    }
}
