// strategy.rs — quote computation (spec §4.3).
//
// Pure function: (MarketSnapshot, FundingState, Inventory, guard flags) ->
// QuotePlan. No I/O, no mutable state, so it is trivially testable and
// replaying the same inputs always yields the same plan (R2).
use crate::model::{Bbo, Constraints, FundingState, Inventory};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuotePlan {
    pub desired_bid: Option<Quote>,
    pub desired_ask: Option<Quote>,
    pub reason: &'static str,
}

impl QuotePlan {
    fn none(reason: &'static str) -> Self {
        Self { desired_bid: None, desired_ask: None, reason }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GuardFlags {
    pub any_blocking: bool,
    pub reason: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct StrategyParams {
    pub quote_qty: f64,
    pub base_half_spread_bps: f64,
    pub k_obi: f64,
    pub inventory_skew_bps: f64,
    pub funding_skew_bps: f64,
    pub min_abs_funding: f64,
}

/// Signed, proportional skew that pushes the reservation price away from
/// the side the engine is already long on. `net_inventory` in base units.
fn inventory_skew(net_inventory: f64, inventory_skew_bps: f64) -> f64 {
    // Normalized by an arbitrary notional reference isn't available here;
    // the sign alone carries the directional intent, magnitude scales with
    // the configured bps per unit of inventory.
    (inventory_skew_bps / 10_000.0) * net_inventory.signum() * net_inventory.abs().min(1.0)
}

/// Biases the quote more aggressively toward the side that collects funding.
/// Positive funding means longs pay shorts, so a positive rate widens the
/// bid-side skew (discourage adding more long exposure) — expressed here as
/// a signed contribution to the half-spread.
fn funding_skew(funding_rate: f64, funding_skew_bps: f64) -> f64 {
    (funding_skew_bps / 10_000.0) * funding_rate.signum() * funding_rate.abs().min(1.0)
}

/// `spot_bbo` is accepted for parity with the spec's input list (the spot
/// book anchors the hedge leg, not the quote prices themselves) but the
/// quote computation only consumes `perp_bbo` and `obi`.
pub fn compute_quote_plan(
    spot_bbo: &Bbo,
    perp_bbo: &Bbo,
    obi: f64,
    funding: &FundingState,
    inventory: &Inventory,
    constraints: &Constraints,
    guards: &GuardFlags,
    params: &StrategyParams,
) -> QuotePlan {
    let _ = spot_bbo;
    if guards.any_blocking {
        return QuotePlan::none(guards.reason.unwrap_or("guard_blocked"));
    }
    if funding.rate.abs() < params.min_abs_funding {
        return QuotePlan::none("funding_too_thin");
    }

    let mid = (perp_bbo.bid_px + perp_bbo.ask_px) / 2.0;
    let r = mid * (1.0 + params.k_obi * obi);

    let h = (params.base_half_spread_bps / 10_000.0)
        + inventory_skew(inventory.net(), params.inventory_skew_bps)
        + funding_skew(funding.rate, params.funding_skew_bps);

    let raw_bid = r * (1.0 - h);
    let raw_ask = r * (1.0 + h);

    let mut bid_px = constraints.round_down_price(raw_bid);
    let mut ask_px = constraints.round_up_price(raw_ask);

    // Post-only clamp: never cross the touch we measured this snapshot from.
    if bid_px > perp_bbo.bid_px {
        bid_px = perp_bbo.bid_px;
    }
    if ask_px < perp_bbo.ask_px {
        ask_px = perp_bbo.ask_px;
    }

    let qty = constraints.round_down_size(params.quote_qty);

    let desired_bid = if ask_px <= bid_px {
        None
    } else if bid_px * qty < constraints.min_notional {
        None
    } else {
        Some(Quote { price: bid_px, size: qty })
    };
    let desired_ask = if ask_px <= bid_px {
        None
    } else if ask_px * qty < constraints.min_notional {
        None
    } else {
        Some(Quote { price: ask_px, size: qty })
    };

    QuotePlan {
        desired_bid,
        desired_ask,
        reason: "ok",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbo(bid: f64, ask: f64) -> Bbo {
        Bbo { bid_px: bid, bid_sz: 10.0, ask_px: ask, ask_sz: 10.0, ts_ms: 0 }
    }

    fn default_params() -> StrategyParams {
        StrategyParams {
            quote_qty: 0.05,
            base_half_spread_bps: 5.0,
            k_obi: 0.0005,
            inventory_skew_bps: 2.0,
            funding_skew_bps: 1.0,
            min_abs_funding: 0.0001,
        }
    }

    fn default_constraints() -> Constraints {
        Constraints { price_tick: 0.1, size_step: 0.001, min_notional: 1.0, min_size: 0.001 }
    }

    #[test]
    fn s1_dry_run_quotes_both_sides_within_touch() {
        let perp = bbo(1000.0, 1000.2);
        let spot = bbo(1000.1, 1000.3);
        let funding = FundingState { rate: 0.0005, last_update_ts: 0, next_settle_ts: None };
        let inv = Inventory::default();
        let plan = compute_quote_plan(
            &spot,
            &perp,
            0.0,
            &funding,
            &inv,
            &default_constraints(),
            &GuardFlags::default(),
            &default_params(),
        );
        let bid = plan.desired_bid.expect("bid side should quote");
        let ask = plan.desired_ask.expect("ask side should quote");
        assert!(bid.price <= 1000.0);
        assert!(ask.price >= 1000.2);
    }

    #[test]
    fn guard_blocks_both_sides() {
        let perp = bbo(1000.0, 1000.2);
        let spot = bbo(1000.1, 1000.3);
        let funding = FundingState { rate: 0.0005, last_update_ts: 0, next_settle_ts: None };
        let inv = Inventory::default();
        let guards = GuardFlags { any_blocking: true, reason: Some("book_stale") };
        let plan = compute_quote_plan(
            &spot,
            &perp,
            0.0,
            &funding,
            &inv,
            &default_constraints(),
            &guards,
            &default_params(),
        );
        assert!(plan.desired_bid.is_none());
        assert!(plan.desired_ask.is_none());
        assert_eq!(plan.reason, "book_stale");
    }

    #[test]
    fn funding_too_thin_drops_both_sides() {
        let perp = bbo(1000.0, 1000.2);
        let spot = bbo(1000.1, 1000.3);
        let funding = FundingState { rate: 0.00001, last_update_ts: 0, next_settle_ts: None };
        let inv = Inventory::default();
        let plan = compute_quote_plan(
            &spot,
            &perp,
            0.0,
            &funding,
            &inv,
            &default_constraints(),
            &GuardFlags::default(),
            &default_params(),
        );
        assert_eq!(plan.reason, "funding_too_thin");
        assert!(plan.desired_bid.is_none());
    }

    #[test]
    fn min_notional_drops_side() {
        let perp = bbo(1000.0, 1000.2);
        let spot = bbo(1000.1, 1000.3);
        let funding = FundingState { rate: 0.0005, last_update_ts: 0, next_settle_ts: None };
        let inv = Inventory::default();
        let mut params = default_params();
        params.quote_qty = 0.0001;
        let mut c = default_constraints();
        c.min_notional = 1000.0;
        let plan = compute_quote_plan(
            &spot,
            &perp,
            0.0,
            &funding,
            &inv,
            &c,
            &GuardFlags::default(),
            &params,
        );
        assert!(plan.desired_bid.is_none());
        assert!(plan.desired_ask.is_none());
    }

    /// I4: no quote may cross the touch of the snapshot it was built from,
    /// even when the skew/OBI math would otherwise push it past the touch.
    #[test]
    fn i4_quotes_never_cross_the_snapshot_touch() {
        let perp = bbo(1000.0, 1000.2);
        let spot = bbo(1000.1, 1000.3);
        let funding = FundingState { rate: 0.01, last_update_ts: 0, next_settle_ts: None };
        let inv = Inventory { perp_pos: 5.0, spot_pos: -5.0 };
        let mut params = default_params();
        params.k_obi = 5.0;
        params.inventory_skew_bps = 500.0;
        params.funding_skew_bps = 500.0;
        let plan = compute_quote_plan(
            &spot,
            &perp,
            0.9,
            &funding,
            &inv,
            &default_constraints(),
            &GuardFlags::default(),
            &params,
        );
        if let Some(bid) = plan.desired_bid {
            assert!(bid.price <= perp.bid_px, "bid {} crossed perp bid {}", bid.price, perp.bid_px);
        }
        if let Some(ask) = plan.desired_ask {
            assert!(ask.price >= perp.ask_px, "ask {} crossed perp ask {}", ask.price, perp.ask_px);
        }
    }

    #[test]
    fn pure_function_same_inputs_same_output() {
        let perp = bbo(1000.0, 1000.2);
        let spot = bbo(1000.1, 1000.3);
        let funding = FundingState { rate: 0.0005, last_update_ts: 0, next_settle_ts: None };
        let inv = Inventory { perp_pos: 0.1, spot_pos: -0.1 };
        let params = default_params();
        let c = default_constraints();
        let guards = GuardFlags::default();
        let a = compute_quote_plan(&spot, &perp, 0.2, &funding, &inv, &c, &guards, &params);
        let b = compute_quote_plan(&spot, &perp, 0.2, &funding, &inv, &c, &guards, &params);
        assert_eq!(a, b);
    }
}
