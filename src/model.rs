// model.rs — core data model (spec §3).
//
// These types carry no behavior beyond the invariants the spec assigns them;
// components read and mutate them but ownership stays where §3 puts it
// (OrderRecord/HedgeTicket with the OMS, everything else shared by clone
// through the single-threaded event loop).
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEPTH_LEVELS: usize = 5;

/// Best bid/ask price and size on one side of one book, plus a monotonic
/// timestamp (ms since epoch) of the update that produced it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bbo {
    pub bid_px: f64,
    pub bid_sz: f64,
    pub ask_px: f64,
    pub ask_sz: f64,
    pub ts_ms: u64,
}

impl Bbo {
    pub fn mid(&self) -> f64 {
        (self.bid_px + self.ask_px) / 2.0
    }

    pub fn is_crossed(&self) -> bool {
        self.bid_px >= self.ask_px
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DepthLevel {
    pub px: f64,
    pub sz: f64,
}

/// Normalized market snapshot: spot BBO, perp BBO, up to `levels_used` levels
/// of perp depth per side, and a derived OBI scalar in [-1, +1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub spot_bbo: Bbo,
    pub perp_bbo: Bbo,
    pub perp_bids: Vec<DepthLevel>,
    pub perp_asks: Vec<DepthLevel>,
    pub levels_used: usize,
    pub obi: f64,
    pub ts_ms: u64,
    /// True when this snapshot came from the single-level fallback channel.
    pub fallback: bool,
}

impl MarketSnapshot {
    /// Builds a snapshot from raw depth, computing OBI with an epsilon-guarded
    /// denominator so a one-sided or empty book yields 0.0 rather than NaN.
    /// `levels_used` shrinks to whatever is actually present on either side —
    /// the 5-level and 1-level (fallback) paths share this one code path.
    pub fn build(
        spot_bbo: Bbo,
        perp_bbo: Bbo,
        mut perp_bids: Vec<DepthLevel>,
        mut perp_asks: Vec<DepthLevel>,
        fallback: bool,
        ts_ms: u64,
    ) -> Option<Self> {
        if spot_bbo.is_crossed() || perp_bbo.is_crossed() {
            return None;
        }
        let levels_used = perp_bids.len().min(perp_asks.len()).min(DEPTH_LEVELS).max(if fallback { 1 } else { 0 });
        perp_bids.truncate(levels_used.max(1));
        perp_asks.truncate(levels_used.max(1));

        let bid_sum: f64 = perp_bids.iter().map(|l| l.sz).sum();
        let ask_sum: f64 = perp_asks.iter().map(|l| l.sz).sum();
        const EPS: f64 = 1e-9;
        let obi = if bid_sum + ask_sum <= EPS {
            0.0
        } else {
            ((bid_sum - ask_sum) / (bid_sum + ask_sum + EPS)).clamp(-1.0, 1.0)
        };

        Some(Self {
            spot_bbo,
            perp_bbo,
            perp_bids,
            perp_asks,
            levels_used,
            obi,
            ts_ms,
            fallback,
        })
    }
}

/// Funding-rate state: signed rate, last successful poll, optional next
/// settlement time. Freshness is judged against `last_update_ts`, which only
/// advances on a successful poll (spec §4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FundingState {
    pub rate: f64,
    pub last_update_ts: u64,
    pub next_settle_ts: Option<u64>,
}

/// Per-symbol-per-leg trading constraints, loaded once at startup and
/// immutable after that.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Constraints {
    pub price_tick: f64,
    pub size_step: f64,
    pub min_notional: f64,
    pub min_size: f64,
}

impl Constraints {
    pub fn round_down_price(&self, px: f64) -> f64 {
        (px / self.price_tick).floor() * self.price_tick
    }

    pub fn round_up_price(&self, px: f64) -> f64 {
        (px / self.price_tick).ceil() * self.price_tick
    }

    pub fn round_down_size(&self, sz: f64) -> f64 {
        (sz / self.size_step).floor() * self.size_step
    }
}

/// Signed base-asset inventory on each leg, maintained as a running sum of
/// fills.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub perp_pos: f64,
    pub spot_pos: f64,
}

impl Inventory {
    pub fn net(&self) -> f64 {
        self.perp_pos + self.spot_pos
    }

    pub fn unhedged_notional(&self, mid: f64) -> f64 {
        self.net().abs() * mid
    }

    pub fn apply_fill(&mut self, leg: Leg, side: Side, qty: f64) {
        let signed = match side {
            Side::Buy => qty,
            Side::Sell => -qty,
        };
        match leg {
            Leg::Perp => self.perp_pos += signed,
            Leg::Spot => self.spot_pos += signed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leg {
    Perp,
    Spot,
}

impl Leg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Leg::Perp => "perp",
            Leg::Spot => "spot",
        }
    }
}

/// Which client-order-id leg tag an order belongs to (spec §3 ClientOrderId).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderLeg {
    PerpBid,
    PerpAsk,
    SpotIoc,
    PerpUnwind,
    SpotUnwind,
}

impl OrderLeg {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderLeg::PerpBid => "perp_bid",
            OrderLeg::PerpAsk => "perp_ask",
            OrderLeg::SpotIoc => "spot_ioc",
            OrderLeg::PerpUnwind => "perp_unwind",
            OrderLeg::SpotUnwind => "spot_unwind",
        }
    }

    pub fn leg(&self) -> Leg {
        match self {
            OrderLeg::PerpBid | OrderLeg::PerpAsk | OrderLeg::PerpUnwind => Leg::Perp,
            OrderLeg::SpotIoc | OrderLeg::SpotUnwind => Leg::Spot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Quote,
    Hedge,
    Unwind,
    Flatten,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Quote => "quote",
            Intent::Hedge => "hedge",
            Intent::Unwind => "unwind",
            Intent::Flatten => "flatten",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    PostOnly,
    Ioc,
    Gtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    PendingNew,
    Live,
    Partial,
    Filled,
    Canceled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub client_id: String,
    pub leg: OrderLeg,
    pub intent: Intent,
    pub side: Side,
    pub symbol: String,
    pub price: f64,
    pub size: f64,
    pub status: OrderStatus,
    pub exch_order_id: Option<String>,
    pub created_ts: u64,
    pub last_update_ts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HedgeStatus {
    Open,
    Chasing,
    Done,
    Unwind,
}

/// Created on each perpetual fill. Invariant: `want_qty == filled_qty +
/// remain` and `remain >= 0` at all times (spec I1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeTicket {
    pub hedge_id: String,
    pub side: Side,
    pub want_qty: f64,
    pub filled_qty: f64,
    pub remain: f64,
    pub deadline_ts: u64,
    pub tries: u32,
    pub status: HedgeStatus,
}

impl HedgeTicket {
    pub fn new(hedge_id: String, side: Side, want_qty: f64, deadline_ts: u64) -> Self {
        Self {
            hedge_id,
            side,
            want_qty,
            filled_qty: 0.0,
            remain: want_qty,
            deadline_ts,
            tries: 0,
            status: HedgeStatus::Open,
        }
    }

    /// Applies a partial or full fill. Caller is responsible for clamping
    /// `qty` against `remain` upstream; this asserts the invariant holds.
    pub fn apply_fill(&mut self, qty: f64, size_step: f64) {
        let applied = qty.min(self.remain);
        self.filled_qty += applied;
        self.remain = (self.remain - applied).max(0.0);
        debug_assert!((self.want_qty - (self.filled_qty + self.remain)).abs() < 1e-6);
        if self.remain <= size_step / 2.0 {
            self.status = HedgeStatus::Done;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedFill {
    pub leg: Leg,
    pub side: Side,
    pub price: f64,
    pub qty: f64,
    pub client_id: Option<String>,
    pub exch_order_id: String,
    pub trade_id: Option<String>,
    pub fee: f64,
    pub ts_ms: u64,
}

/// Dedupe key: `(leg, trade_id)` when a trade_id is available, else a
/// composite fallback. See spec §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupeKey {
    TradeId(Leg, String),
    Composite(Leg, String, u64, u64, u64),
}

impl DedupeKey {
    pub fn from_fill(fill: &NormalizedFill) -> Self {
        match &fill.trade_id {
            Some(tid) => DedupeKey::TradeId(fill.leg, tid.clone()),
            None => DedupeKey::Composite(
                fill.leg,
                fill.exch_order_id.clone(),
                fill.ts_ms,
                fill.price.to_bits(),
                fill.qty.to_bits(),
            ),
        }
    }
}

/// Bounded FIFO set used to suppress replayed fills across reconnects.
pub struct DedupeSet {
    order: VecDeque<DedupeKey>,
    set: std::collections::HashSet<DedupeKey>,
    capacity: usize,
}

impl DedupeSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            set: std::collections::HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns true if this is the first time this key has been seen
    /// (i.e. it was NOT a duplicate) and records it.
    pub fn insert(&mut self, key: DedupeKey) -> bool {
        if self.set.contains(&key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.set.insert(key);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Idle,
    Quoting,
    Hedging,
    Cooldown,
    Halted,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Idle => "IDLE",
            Mode::Quoting => "QUOTING",
            Mode::Hedging => "HEDGING",
            Mode::Cooldown => "COOLDOWN",
            Mode::Halted => "HALTED",
        }
    }
}
