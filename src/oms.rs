// oms.rs — Order Management System (spec §4.4).
//
// Owns client-id issuance, the client_id <-> exch_order_id map, quote
// reconciliation, fill normalization/dedupe, the hedge-ticket state machine,
// and the per-symbol close-exclusion flag. Everything here runs on the
// single-threaded event loop (spec §5); no internal locking.
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::GatewayError;
use crate::gateway::{Gateway, PlaceOrderRequest};
use crate::metrics::SessionStats;
use crate::model::{
    DedupeKey, DedupeSet, HedgeStatus, HedgeTicket, Intent, Inventory, Leg, NormalizedFill, OrderLeg,
    OrderRecord, OrderStatus, Side, TimeInForce,
};
use crate::strategy::QuotePlan;
use crate::telemetry::EngineEvent;

#[derive(Debug, Clone, Copy)]
pub struct HedgeConfig {
    pub hedge_slip_bps: f64,
    pub hedge_chase_sec: u64,
    pub hedge_max_tries: u32,
    pub hedge_deadline_ms: u64,
    pub chase_gain: f64,
}

/// Wraps a HedgeTicket with the bookkeeping the spec's hedge protocol needs
/// but the shared model type doesn't carry: when it opened, when it was
/// last actioned, and which symbol it belongs to.
struct TicketState {
    ticket: HedgeTicket,
    symbol: String,
    opened_ts: u64,
    last_action_ts: u64,
}

pub struct Oms {
    symbol: String,
    cycle_id: u64,
    nonce_counter: u64,
    live_bid: Option<OrderRecord>,
    live_ask: Option<OrderRecord>,
    client_to_exch: HashMap<String, String>,
    exch_to_client: HashMap<String, String>,
    exch_to_hedge: HashMap<String, String>,
    tickets: HashMap<String, TicketState>,
    dedupe: DedupeSet,
    reject_streak: u32,
    closing_symbols: HashSet<String>,
    pending_fills: VecDeque<(NormalizedFill, u64)>,
    hedge_seq: u64,
    dry_run: bool,
    /// Set when a place/cancel comes back with a structural reject (spec
    /// §7 class 3); the orchestrator observes this and halts immediately
    /// rather than waiting for `reject_streak_halt` to accumulate.
    structural_halt: bool,
    stats: SessionStats,
}

impl Oms {
    pub fn new(symbol: &str, dry_run: bool) -> Self {
        Self {
            symbol: symbol.to_string(),
            cycle_id: 0,
            nonce_counter: 0,
            live_bid: None,
            live_ask: None,
            client_to_exch: HashMap::new(),
            exch_to_client: HashMap::new(),
            exch_to_hedge: HashMap::new(),
            tickets: HashMap::new(),
            dedupe: DedupeSet::new(4096),
            reject_streak: 0,
            closing_symbols: HashSet::new(),
            pending_fills: VecDeque::new(),
            hedge_seq: 0,
            dry_run,
            structural_halt: false,
            stats: SessionStats::default(),
        }
    }

    /// Cancel/fill ratio for the life of the process (spec §10): not a
    /// guard input, just operator-visible churn tracking.
    pub fn cancel_fill_ratio(&self) -> f64 {
        self.stats.cancel_fill_ratio()
    }

    pub fn begin_cycle(&mut self) {
        self.cycle_id += 1;
    }

    pub fn reject_streak(&self) -> u32 {
        self.reject_streak
    }

    pub fn cycle_id(&self) -> u64 {
        self.cycle_id
    }

    /// Reads and clears the structural-halt flag; the orchestrator forces
    /// `Mode::Halted` when this returns true.
    pub fn take_structural_halt(&mut self) -> bool {
        std::mem::take(&mut self.structural_halt)
    }

    pub fn open_tickets_count(&self) -> usize {
        self.tickets.values().filter(|t| t.ticket.status != HedgeStatus::Done).count()
    }

    pub fn oldest_open_ticket_age_sec(&self, now_ms: u64) -> Option<u64> {
        self.tickets
            .values()
            .filter(|t| t.ticket.status != HedgeStatus::Done)
            .map(|t| now_ms.saturating_sub(t.opened_ts) / 1000)
            .max()
    }

    /// `{intent}-{leg}-{cycle}-{nonce}` (spec §3). Cycle and nonce are kept
    /// to a fixed width so the id never exceeds 36 characters.
    fn next_client_id(&mut self, intent: Intent, leg: OrderLeg) -> String {
        self.nonce_counter += 1;
        let id = format!(
            "{}-{}-{}-{}",
            intent.as_str(),
            leg.as_str(),
            self.cycle_id % 1_000_000,
            self.nonce_counter % 100_000
        );
        debug_assert!(id.len() <= 36);
        id
    }

    fn live_slot(&mut self, side: Side) -> &mut Option<OrderRecord> {
        match side {
            Side::Buy => &mut self.live_bid,
            Side::Sell => &mut self.live_ask,
        }
    }

    // ─── Quote reconciliation (spec §4.4) ──────────────────────────────

    pub async fn reconcile_quotes(
        &mut self,
        gw: &dyn Gateway,
        plan: &QuotePlan,
        mid: f64,
        replace_threshold_bps: f64,
        now_ms: u64,
    ) {
        self.reconcile_side(gw, Side::Buy, OrderLeg::PerpBid, plan.desired_bid, mid, replace_threshold_bps, now_ms)
            .await;
        self.reconcile_side(gw, Side::Sell, OrderLeg::PerpAsk, plan.desired_ask, mid, replace_threshold_bps, now_ms)
            .await;
    }

    async fn reconcile_side(
        &mut self,
        gw: &dyn Gateway,
        side: Side,
        order_leg: OrderLeg,
        desired: Option<crate::strategy::Quote>,
        mid: f64,
        replace_threshold_bps: f64,
        now_ms: u64,
    ) {
        let live = self.live_slot(side).clone();
        match (live, desired) {
            (None, None) => {}
            (Some(l), None) => {
                self.cancel_live(gw, side, &l, now_ms).await;
            }
            (None, Some(d)) => {
                self.place_quote(gw, side, order_leg, d, now_ms).await;
            }
            (Some(l), Some(d)) => {
                let price_drift = (l.price - d.price).abs();
                let threshold = replace_threshold_bps / 10_000.0 * mid;
                if price_drift >= threshold || (l.size - d.size).abs() > f64::EPSILON {
                    self.cancel_live(gw, side, &l, now_ms).await;
                    self.place_quote(gw, side, order_leg, d, now_ms).await;
                }
            }
        }
    }

    async fn cancel_live(&mut self, gw: &dyn Gateway, side: Side, record: &OrderRecord, now_ms: u64) {
        if let Some(exch_id) = &record.exch_order_id {
            match gw.cancel_order(Leg::Perp, exch_id).await {
                Ok(()) => {
                    self.stats.record_cancel();
                    EngineEvent::new("order_cancel", "oms", "QUOTING")
                        .intent(record.intent.as_str())
                        .leg(record.leg.as_str())
                        .client_id(&record.client_id)
                        .exch_order_id(exch_id)
                        .emit();
                }
                Err(GatewayError::Rejected(_)) => {
                    // Treat "already filled"-shaped rejects as an imminent
                    // fill: don't re-post on top of it.
                    EngineEvent::new("order_skip", "oms", "QUOTING")
                        .reason("cancel_raced_fill")
                        .client_id(&record.client_id)
                        .emit();
                }
                Err(GatewayError::Structural(reason)) => {
                    self.structural_halt = true;
                    log::error!("oms: structural reject canceling {}: {}", record.client_id, reason);
                    EngineEvent::new("risk", "oms", "QUOTING")
                        .reason("structural_reject")
                        .client_id(&record.client_id)
                        .emit();
                }
                Err(GatewayError::Unknown) => {
                    // Outcome unknown after a REST timeout: reconcile by
                    // client id since the cancel's effect on the venue is
                    // unconfirmed.
                    log::warn!("oms: cancel outcome unknown for {}, reconciling", record.client_id);
                    if let Err(e) = gw.cancel_by_client_id(Leg::Perp, &record.client_id).await {
                        log::warn!("oms: reconciliation cancel failed for {}: {}", record.client_id, e);
                    }
                    EngineEvent::new("order_skip", "oms", "QUOTING")
                        .reason("state_unknown_reconciled")
                        .client_id(&record.client_id)
                        .emit();
                }
                Err(e) => {
                    log::warn!("oms: cancel failed for {}: {}", record.client_id, e);
                }
            }
        }
        let _ = now_ms;
        *self.live_slot(side) = None;
    }

    async fn place_quote(
        &mut self,
        gw: &dyn Gateway,
        side: Side,
        order_leg: OrderLeg,
        quote: crate::strategy::Quote,
        now_ms: u64,
    ) {
        let client_id = self.next_client_id(Intent::Quote, order_leg);
        let req = PlaceOrderRequest {
            symbol: self.symbol.clone(),
            side,
            price: quote.price,
            size: quote.size,
            tif: TimeInForce::PostOnly,
            client_id: client_id.clone(),
            reduce_only: false,
        };
        match gw.place_order(Leg::Perp, req).await {
            Ok(ack) => {
                self.reject_streak = 0;
                self.client_to_exch.insert(client_id.clone(), ack.exch_order_id.clone());
                self.exch_to_client.insert(ack.exch_order_id.clone(), client_id.clone());
                let record = OrderRecord {
                    client_id: client_id.clone(),
                    leg: order_leg,
                    intent: Intent::Quote,
                    side,
                    symbol: self.symbol.clone(),
                    price: quote.price,
                    size: quote.size,
                    status: OrderStatus::Live,
                    exch_order_id: Some(ack.exch_order_id.clone()),
                    created_ts: now_ms,
                    last_update_ts: now_ms,
                };
                EngineEvent::new("order_new", "oms", "QUOTING")
                    .intent("quote")
                    .leg(order_leg.as_str())
                    .client_id(&client_id)
                    .exch_order_id(&ack.exch_order_id)
                    .emit();
                *self.live_slot(side) = Some(record);
            }
            Err(GatewayError::RateLimited) | Err(GatewayError::Rejected(_)) => {
                self.reject_streak += 1;
                EngineEvent::new("order_skip", "oms", "QUOTING")
                    .intent("quote")
                    .reason("rejected")
                    .client_id(&client_id)
                    .emit();
            }
            Err(GatewayError::Structural(reason)) => {
                self.structural_halt = true;
                log::error!("oms: structural reject placing {}: {}", client_id, reason);
                EngineEvent::new("risk", "oms", "QUOTING")
                    .reason("structural_reject")
                    .client_id(&client_id)
                    .emit();
            }
            Err(GatewayError::Unknown) => {
                log::warn!("oms: place outcome unknown for {}, reconciling", client_id);
                if let Err(e) = gw.cancel_by_client_id(Leg::Perp, &client_id).await {
                    log::warn!("oms: reconciliation cancel failed for {}: {}", client_id, e);
                }
                EngineEvent::new("order_skip", "oms", "QUOTING")
                    .reason("state_unknown_reconciled")
                    .client_id(&client_id)
                    .emit();
            }
            Err(e) => {
                self.reject_streak += 1;
                log::warn!("oms: place_quote error for {}: {}", client_id, e);
            }
        }
    }

    // ─── Fill handling (spec §4.4) ─────────────────────────────────────

    pub async fn on_fill(
        &mut self,
        gw: &dyn Gateway,
        fill: NormalizedFill,
        inventory: &mut Inventory,
        hedge_cfg: &HedgeConfig,
        now_ms: u64,
    ) {
        let key = DedupeKey::from_fill(&fill);
        if !self.dedupe.insert(key) {
            EngineEvent::new("order_skip", "oms", "HEDGING")
                .reason("duplicate_fill")
                .leg(fill.leg.as_str())
                .emit();
            return;
        }

        let client_id = fill
            .client_id
            .clone()
            .or_else(|| self.exch_to_client.get(&fill.exch_order_id).cloned());

        inventory.apply_fill(fill.leg, fill.side, fill.qty);
        self.stats.record_fill();
        let mut ev = EngineEvent::new("fill", "oms", "HEDGING")
            .leg(fill.leg.as_str())
            .client_id(client_id.as_deref().unwrap_or("null"))
            .trade_id(fill.trade_id.as_deref().unwrap_or(""));
        if self.dry_run {
            ev = ev.simulated(true);
        }
        ev.emit();

        match fill.leg {
            Leg::Perp => {
                self.open_hedge_ticket(gw, &fill, hedge_cfg, now_ms).await;
            }
            Leg::Spot => {
                self.apply_spot_fill(fill, now_ms);
            }
        }
    }

    /// Retries fills that arrived before their order's ack (spec §5: no
    /// cross-stream ordering guarantee between public and private
    /// streams). Entries older than 2s are dropped with a log line rather
    /// than held forever.
    pub fn retry_pending_fills(&mut self, now_ms: u64) {
        let mut remaining = VecDeque::new();
        while let Some((fill, queued_ts)) = self.pending_fills.pop_front() {
            if self.exch_to_hedge.contains_key(&fill.exch_order_id) {
                self.apply_spot_fill(fill, now_ms);
            } else if now_ms.saturating_sub(queued_ts) > 2_000 {
                log::warn!("oms: dropping pending fill with no ack after 2s: {}", fill.exch_order_id);
            } else {
                remaining.push_back((fill, queued_ts));
            }
        }
        self.pending_fills = remaining;
    }

    async fn open_hedge_ticket(&mut self, gw: &dyn Gateway, fill: &NormalizedFill, cfg: &HedgeConfig, now_ms: u64) {
        self.hedge_seq += 1;
        let hedge_id = format!("hdg-{}", self.hedge_seq);
        let hedge_side = fill.side.opposite();
        let ticket = HedgeTicket::new(hedge_id.clone(), hedge_side, fill.qty, now_ms + cfg.hedge_deadline_ms);

        let mut ev = EngineEvent::new("hedge_ticket_open", "oms", "HEDGING")
            .intent("hedge")
            .data(serde_json::json!({"hedge_id": hedge_id, "side": format!("{:?}", hedge_side), "want_qty": fill.qty}));
        if self.dry_run {
            ev = ev.simulated(true);
        }
        ev.emit();

        self.tickets.insert(
            hedge_id.clone(),
            TicketState { ticket, symbol: self.symbol.clone(), opened_ts: now_ms, last_action_ts: now_ms },
        );
        self.send_hedge_ioc(gw, &hedge_id, cfg, now_ms, fill.price, fill.price).await;
    }

    /// Places (or re-places, when chasing) the spot IOC for a ticket.
    /// `spot_bid`/`spot_ask` should come from the latest snapshot; callers
    /// without a live snapshot fall back to the triggering perp fill price.
    async fn send_hedge_ioc(
        &mut self,
        gw: &dyn Gateway,
        hedge_id: &str,
        cfg: &HedgeConfig,
        now_ms: u64,
        spot_bid: f64,
        spot_ask: f64,
    ) {
        let Some(state) = self.tickets.get(hedge_id) else { return };
        let remain = state.ticket.remain;
        if remain <= 0.0 {
            return;
        }
        let tries = state.ticket.tries;
        let slip = cfg.hedge_slip_bps / 10_000.0 * (1.0 + tries as f64 * cfg.chase_gain);
        let (side, price) = match state.ticket.side {
            Side::Buy => (Side::Buy, spot_ask * (1.0 + slip)),
            Side::Sell => (Side::Sell, spot_bid * (1.0 - slip)),
        };

        let leg_tag = OrderLeg::SpotIoc;
        let client_id = self.next_client_id(Intent::Hedge, leg_tag);
        let req = PlaceOrderRequest {
            symbol: self.symbol.clone(),
            side,
            price,
            size: remain,
            tif: TimeInForce::Ioc,
            client_id: client_id.clone(),
            reduce_only: false,
        };

        EngineEvent::new("order_new", "oms", "HEDGING")
            .intent("hedge")
            .leg("spot_ioc")
            .client_id(&client_id)
            .emit();

        match gw.place_order(Leg::Spot, req).await {
            Ok(ack) => {
                self.client_to_exch.insert(client_id.clone(), ack.exch_order_id.clone());
                self.exch_to_client.insert(ack.exch_order_id.clone(), client_id.clone());
                self.exch_to_hedge.insert(ack.exch_order_id.clone(), hedge_id.to_string());
            }
            Err(e) => {
                log::warn!("oms: hedge IOC failed for {}: {}", hedge_id, e);
            }
        }
        if let Some(state) = self.tickets.get_mut(hedge_id) {
            state.last_action_ts = now_ms;
        }
    }

    fn apply_spot_fill(&mut self, fill: NormalizedFill, now_ms: u64) {
        let hedge_id = self.exch_to_hedge.get(&fill.exch_order_id).cloned();

        let Some(hedge_id) = hedge_id else {
            if self.pending_fills.len() < 256 {
                self.pending_fills.push_back((fill, now_ms));
            }
            return;
        };
        let size_step = 0.000_1_f64.max(f64::EPSILON);
        if let Some(state) = self.tickets.get_mut(&hedge_id) {
            state.ticket.apply_fill(fill.qty, size_step);
            if state.ticket.status == HedgeStatus::Done {
                let mut ev = EngineEvent::new("hedge_ticket_done", "oms", "HEDGING")
                    .data(serde_json::json!({"hedge_id": hedge_id}));
                if self.dry_run {
                    ev = ev.simulated(true);
                }
                ev.emit();
            }
        }
    }

    /// Called once per tick: advances tickets past `hedge_chase_sec` with
    /// remaining size into CHASING, and past tries/deadline into UNWIND.
    pub async fn check_hedge_timeouts(
        &mut self,
        gw: &dyn Gateway,
        cfg: &HedgeConfig,
        now_ms: u64,
        spot_bid: f64,
        spot_ask: f64,
        perp_bid: f64,
        perp_ask: f64,
    ) {
        let due: Vec<String> = self
            .tickets
            .iter()
            .filter(|(_, s)| s.ticket.status != HedgeStatus::Done && s.ticket.remain > 0.0)
            .filter(|(_, s)| now_ms.saturating_sub(s.last_action_ts) >= cfg.hedge_chase_sec * 1000)
            .map(|(id, _)| id.clone())
            .collect();

        for hedge_id in due {
            let should_unwind = {
                let state = self.tickets.get(&hedge_id).unwrap();
                state.ticket.tries >= cfg.hedge_max_tries || now_ms > state.ticket.deadline_ts
            };
            if should_unwind {
                self.unwind_ticket(gw, &hedge_id, now_ms, perp_bid, perp_ask).await;
            } else {
                if let Some(state) = self.tickets.get_mut(&hedge_id) {
                    state.ticket.status = HedgeStatus::Chasing;
                    state.ticket.tries += 1;
                }
                self.send_hedge_ioc(gw, &hedge_id, cfg, now_ms, spot_bid, spot_ask).await;
            }
        }
    }

    /// Forces an immediate unwind of the symbol's oldest open ticket,
    /// regardless of chase timing. Used by the `unhedged_exposure` guard
    /// (spec §4.5: "cancel all quotes; trigger unwind on offending ticket").
    pub async fn force_unwind_oldest(&mut self, gw: &dyn Gateway, now_ms: u64, perp_bid: f64, perp_ask: f64) {
        let oldest = self
            .tickets
            .iter()
            .filter(|(_, s)| s.ticket.status != HedgeStatus::Done)
            .min_by_key(|(_, s)| s.opened_ts)
            .map(|(id, _)| id.clone());
        if let Some(hedge_id) = oldest {
            self.unwind_ticket(gw, &hedge_id, now_ms, perp_bid, perp_ask).await;
        }
    }

    /// Aggressive offset applied to the touch price to guarantee a
    /// reduce-only IOC is marketable; this is a flatten, not a chase, so it
    /// trades through several ticks rather than creeping up like the spot
    /// hedge's slip schedule.
    const UNWIND_SLIP: f64 = 0.05;

    async fn unwind_ticket(&mut self, gw: &dyn Gateway, hedge_id: &str, now_ms: u64, perp_bid: f64, perp_ask: f64) {
        let symbol = match self.tickets.get(hedge_id) {
            Some(s) => s.symbol.clone(),
            None => return,
        };
        if !self.try_begin_close(&symbol) {
            return;
        }
        let (remain, side) = {
            let state = self.tickets.get_mut(hedge_id).unwrap();
            state.ticket.status = HedgeStatus::Unwind;
            (state.ticket.remain, state.ticket.side)
        };

        // The unwind removes perp exposure, so it trades the *same* side as
        // the original hedge intent would have offset, on the perp leg.
        // Buy unwinds (flattening a short) must clear the ask; sell unwinds
        // (flattening a long) must clear the bid.
        let price = match side {
            Side::Buy => perp_ask * (1.0 + Self::UNWIND_SLIP),
            Side::Sell => (perp_bid * (1.0 - Self::UNWIND_SLIP)).max(0.0),
        };
        let client_id = self.next_client_id(Intent::Unwind, OrderLeg::PerpUnwind);
        let req = PlaceOrderRequest {
            symbol: symbol.clone(),
            side,
            price,
            size: remain,
            tif: TimeInForce::Ioc,
            client_id: client_id.clone(),
            reduce_only: true,
        };
        EngineEvent::new("order_new", "oms", "HEDGING")
            .intent("unwind")
            .leg("perp_unwind")
            .client_id(&client_id)
            .emit();
        match gw.place_order(Leg::Perp, req).await {
            Ok(ack) => {
                self.exch_to_hedge.insert(ack.exch_order_id.clone(), hedge_id.to_string());
            }
            Err(e) => {
                log::error!("oms: unwind failed for {}: {}", hedge_id, e);
            }
        }
        if let Some(state) = self.tickets.get_mut(hedge_id) {
            state.ticket.status = HedgeStatus::Done;
            state.last_action_ts = now_ms;
        }
        self.end_close(&symbol);
    }

    /// One-shot startup flatten: issues a single reduce-only IOC against
    /// whichever leg carries residual net exposure. Spec §6 ("Persisted
    /// state: none") requires any residual position found at startup to
    /// trigger an immediate unwind rather than waiting for the first tick's
    /// guards to notice it.
    pub async fn unwind_residual(&mut self, gw: &dyn Gateway, leg: Leg, net: f64, bid: f64, ask: f64) {
        if net.abs() <= f64::EPSILON {
            return;
        }
        let side = if net > 0.0 { Side::Sell } else { Side::Buy };
        let price = match side {
            Side::Buy => ask * (1.0 + Self::UNWIND_SLIP),
            Side::Sell => (bid * (1.0 - Self::UNWIND_SLIP)).max(0.0),
        };
        let order_leg = match leg {
            Leg::Perp => OrderLeg::PerpUnwind,
            Leg::Spot => OrderLeg::SpotUnwind,
        };
        let client_id = self.next_client_id(Intent::Unwind, order_leg);
        let req = PlaceOrderRequest {
            symbol: self.symbol.clone(),
            side,
            price,
            size: net.abs(),
            tif: TimeInForce::Ioc,
            client_id: client_id.clone(),
            reduce_only: true,
        };
        EngineEvent::new("order_new", "oms", "IDLE")
            .intent("unwind")
            .leg(order_leg.as_str())
            .client_id(&client_id)
            .emit();
        if let Err(e) = gw.place_order(leg, req).await {
            log::error!("oms: startup residual unwind failed: {}", e);
        }
    }

    /// Startup sweep (spec §6 "Persisted state: none"): cancels any order
    /// the venue still shows open whose client id carries one of this
    /// engine's deterministic intent prefixes — it can only be left over
    /// from a prior run, since a fresh process hasn't placed anything yet.
    pub async fn sweep_stale_orders(&self, gw: &dyn Gateway, symbol: &str) {
        let open = match gw.list_open_orders(symbol).await {
            Ok(open) => open,
            Err(e) => {
                log::warn!("oms: startup open-orders sweep failed: {}", e);
                return;
            }
        };
        let prefixes =
            [Intent::Quote.as_str(), Intent::Hedge.as_str(), Intent::Unwind.as_str(), Intent::Flatten.as_str()];
        for order in open {
            let recognizable =
                order.client_id.as_deref().map(|id| prefixes.iter().any(|p| id.starts_with(p))).unwrap_or(false);
            if !recognizable {
                continue;
            }
            let result = match &order.client_id {
                Some(cid) => gw.cancel_by_client_id(Leg::Perp, cid).await,
                None => gw.cancel_order(Leg::Perp, &order.exch_order_id).await,
            };
            if let Err(e) = result {
                log::warn!("oms: startup sweep cancel failed for {}: {}", order.exch_order_id, e);
            }
        }
    }

    // ─── Close exclusion (spec §4.4) ───────────────────────────────────

    pub fn try_begin_close(&mut self, symbol: &str) -> bool {
        if self.closing_symbols.contains(symbol) {
            EngineEvent::new("order_skip", "oms", "HEDGING")
                .reason("close_inflight")
                .emit();
            return false;
        }
        self.closing_symbols.insert(symbol.to_string());
        true
    }

    pub fn end_close(&mut self, symbol: &str) {
        self.closing_symbols.remove(symbol);
    }

    pub async fn cancel_all(&mut self, gw: &dyn Gateway, now_ms: u64) {
        if let Some(l) = self.live_bid.clone() {
            self.cancel_live(gw, Side::Buy, &l, now_ms).await;
        }
        if let Some(l) = self.live_ask.clone() {
            self.cancel_live(gw, Side::Sell, &l, now_ms).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SimGateway;

    fn cfg() -> HedgeConfig {
        HedgeConfig {
            hedge_slip_bps: 5.0,
            hedge_chase_sec: 3,
            hedge_max_tries: 2,
            hedge_deadline_ms: 8_000,
            chase_gain: 0.5,
        }
    }

    #[test]
    fn client_id_matches_scheme_and_length_bound() {
        let mut oms = Oms::new("ETH", false);
        oms.begin_cycle();
        let id = oms.next_client_id(Intent::Quote, OrderLeg::PerpBid);
        assert!(id.starts_with("quote-perp_bid-"));
        assert!(id.len() <= 36);
    }

    #[tokio::test]
    async fn s1_places_both_sides_once() {
        let gw = SimGateway::new(0.1, 0.001, 0.0005);
        let mut oms = Oms::new("ETH", false);
        oms.begin_cycle();
        let plan = QuotePlan {
            desired_bid: Some(crate::strategy::Quote { price: 999.9, size: 0.05 }),
            desired_ask: Some(crate::strategy::Quote { price: 1000.3, size: 0.05 }),
            reason: "ok",
        };
        oms.reconcile_quotes(&gw, &plan, 1000.0, 2.0, 0).await;
        assert_eq!(gw.placed_orders().len(), 2);
        assert!(oms.live_bid.is_some());
        assert!(oms.live_ask.is_some());
    }

    #[tokio::test]
    async fn s2_perp_fill_opens_hedge_ticket_and_places_ioc() {
        let gw = SimGateway::new(0.1, 0.001, 0.0005);
        let mut oms = Oms::new("ETH", false);
        let mut inv = Inventory::default();
        let fill = NormalizedFill {
            leg: Leg::Perp,
            side: Side::Buy,
            price: 1000.0,
            qty: 0.05,
            client_id: Some("quote-perp_bid-0-1".to_string()),
            exch_order_id: "1".to_string(),
            trade_id: Some("t1".to_string()),
            fee: 0.0,
            ts_ms: 0,
        };
        oms.on_fill(&gw, fill, &mut inv, &cfg(), 0).await;
        assert_eq!(inv.perp_pos, 0.05);
        assert_eq!(oms.tickets.len(), 1);
        let ticket = oms.tickets.values().next().unwrap();
        assert_eq!(ticket.ticket.side, Side::Sell);
        assert_eq!(ticket.ticket.want_qty, 0.05);
        assert_eq!(gw.placed_orders().len(), 1);
    }

    #[tokio::test]
    async fn s5_duplicate_fill_is_dropped() {
        let gw = SimGateway::new(0.1, 0.001, 0.0005);
        let mut oms = Oms::new("ETH", false);
        let mut inv = Inventory::default();
        let fill = NormalizedFill {
            leg: Leg::Perp,
            side: Side::Buy,
            price: 1000.0,
            qty: 0.05,
            client_id: Some("quote-perp_bid-0-1".to_string()),
            exch_order_id: "1".to_string(),
            trade_id: Some("t1".to_string()),
            fee: 0.0,
            ts_ms: 0,
        };
        oms.on_fill(&gw, fill.clone(), &mut inv, &cfg(), 0).await;
        oms.on_fill(&gw, fill, &mut inv, &cfg(), 0).await;
        assert_eq!(inv.perp_pos, 0.05);
        assert_eq!(oms.tickets.len(), 1);
    }

    #[tokio::test]
    async fn close_exclusion_rejects_concurrent_close() {
        let mut oms = Oms::new("ETH", false);
        assert!(oms.try_begin_close("ETH"));
        assert!(!oms.try_begin_close("ETH"));
        oms.end_close("ETH");
        assert!(oms.try_begin_close("ETH"));
    }
}
