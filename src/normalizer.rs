// normalizer.rs — Market Data Normalizer (spec §4.1).
//
// Consumes BookUpdate events off the gateway's primary (N-level) and
// fallback (single-level) channels and folds them into MarketSnapshots,
// published through a single-slot mailbox: readers always get the freshest
// snapshot, missed intermediates are acceptable (spec §5).
use tokio::sync::watch;

use crate::gateway::BookUpdate;
use crate::model::{Bbo, Leg, MarketSnapshot};

pub struct Normalizer {
    symbol: String,
    spot_bbo: Option<Bbo>,
    perp_bbo: Option<Bbo>,
    perp_bids: Vec<crate::model::DepthLevel>,
    perp_asks: Vec<crate::model::DepthLevel>,
    fallback: bool,
    tx: watch::Sender<Option<MarketSnapshot>>,
}

impl Normalizer {
    pub fn new(symbol: &str) -> (Self, watch::Receiver<Option<MarketSnapshot>>) {
        let (tx, rx) = watch::channel(None);
        (
            Self {
                symbol: symbol.to_string(),
                spot_bbo: None,
                perp_bbo: None,
                perp_bids: Vec::new(),
                perp_asks: Vec::new(),
                fallback: false,
                tx,
            },
            rx,
        )
    }

    /// Folds one book update into the running per-leg state and republishes
    /// a combined snapshot whenever both legs have a BBO. A crossed book
    /// (either leg) drops the update rather than publish garbage — the
    /// orchestrator's book_stale guard will catch the resulting staleness.
    pub fn on_update(&mut self, update: BookUpdate) {
        if update.symbol != self.symbol {
            return;
        }
        let bbo = bbo_from_levels(&update.bids, &update.asks, update.ts_ms);
        match update.leg {
            Leg::Spot => self.spot_bbo = Some(bbo),
            Leg::Perp => {
                self.perp_bbo = Some(bbo);
                self.perp_bids = update.bids;
                self.perp_asks = update.asks;
                self.fallback = update.fallback;
            }
        }

        if let (Some(spot), Some(perp)) = (self.spot_bbo, self.perp_bbo) {
            if let Some(snapshot) = MarketSnapshot::build(
                spot,
                perp,
                self.perp_bids.clone(),
                self.perp_asks.clone(),
                self.fallback,
                update.ts_ms,
            ) {
                let _ = self.tx.send(Some(snapshot));
            }
        }
    }
}

fn bbo_from_levels(bids: &[crate::model::DepthLevel], asks: &[crate::model::DepthLevel], ts_ms: u64) -> Bbo {
    let (bid_px, bid_sz) = bids.first().map(|l| (l.px, l.sz)).unwrap_or((0.0, 0.0));
    let (ask_px, ask_sz) = asks.first().map(|l| (l.px, l.sz)).unwrap_or((f64::MAX, 0.0));
    Bbo { bid_px, bid_sz, ask_px, ask_sz, ts_ms }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DepthLevel;

    fn update(symbol: &str, leg: Leg, bid: f64, ask: f64, fallback: bool, ts: u64) -> BookUpdate {
        BookUpdate {
            symbol: symbol.to_string(),
            leg,
            bids: vec![DepthLevel { px: bid, sz: 10.0 }],
            asks: vec![DepthLevel { px: ask, sz: 10.0 }],
            ts_ms: ts,
            fallback,
        }
    }

    #[test]
    fn publishes_once_both_legs_seen() {
        let (mut norm, mut rx) = Normalizer::new("ETH");
        norm.on_update(update("ETH", Leg::Spot, 1000.1, 1000.3, false, 1));
        assert!(rx.borrow().is_none());
        norm.on_update(update("ETH", Leg::Perp, 1000.0, 1000.2, false, 2));
        assert!(rx.borrow_and_update().is_some());
    }

    #[test]
    fn fallback_flag_propagates_to_snapshot() {
        let (mut norm, mut rx) = Normalizer::new("ETH");
        norm.on_update(update("ETH", Leg::Spot, 1000.1, 1000.3, false, 1));
        norm.on_update(update("ETH", Leg::Perp, 1000.0, 1000.2, true, 2));
        let snap = rx.borrow_and_update().clone().unwrap();
        assert!(snap.fallback);
        assert_eq!(snap.levels_used, 1);
    }

    #[test]
    fn ignores_updates_for_other_symbols() {
        let (mut norm, rx) = Normalizer::new("ETH");
        norm.on_update(update("BTC", Leg::Perp, 50000.0, 50001.0, false, 1));
        assert!(rx.borrow().is_none());
    }
}
