// orchestrator.rs — supervisor owning the engine's child tasks (spec §4.6).
//
// Runs everything on one executor (spec §5): a market-data reader folding
// gateway book updates into the Normalizer, a private-event reader feeding
// the OMS, a funding poller, a fixed-cadence strategy ticker, and the risk
// evaluator, all driven out of one `tokio::select!` loop rather than
// independent spawned tasks — this keeps the total order over state
// mutations the concurrency model requires without needing any locking.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;

use crate::config::EngineConfig;
use crate::constraints::ConstraintsStore;
use crate::gateway::{Gateway, PrivateEvent};
use crate::metrics::LatencyAuditor;
use crate::model::{FundingState, Inventory, Leg, MarketSnapshot, Mode};
use crate::normalizer::Normalizer;
use crate::oms::{HedgeConfig, Oms};
use crate::risk::{self, GuardName, RiskConfig, RiskInputs};
use crate::strategy::{compute_quote_plan, GuardFlags, StrategyParams};
use crate::telemetry::EngineEvent;

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

pub struct Orchestrator {
    cfg: EngineConfig,
    gw: Arc<dyn Gateway>,
    constraints: ConstraintsStore,
    normalizer: Normalizer,
    book_rx: watch::Receiver<Option<MarketSnapshot>>,
    funding: FundingState,
    inventory: Inventory,
    oms: Oms,
    mode: Mode,
    private_ws_down_since: Option<u64>,
    latency: LatencyAuditor,
}

impl Orchestrator {
    pub async fn build(cfg: EngineConfig, gw: Arc<dyn Gateway>) -> Result<Self, crate::error::EngineError> {
        let mut constraints = ConstraintsStore::new();
        constraints
            .load_all(gw.as_ref(), &cfg.symbol)
            .await
            .map_err(|e| crate::error::EngineError::Startup(format!("constraints load failed: {}", e)))?;

        let expected_mode = match cfg.expected_position_mode.as_str() {
            "one_way" => crate::gateway::PositionMode::OneWay,
            "hedge" => crate::gateway::PositionMode::Hedge,
            other => {
                return Err(crate::error::EngineError::Config(format!(
                    "unknown expected_position_mode: {}",
                    other
                )))
            }
        };
        let actual_mode = gw
            .get_position_mode()
            .await
            .map_err(|e| crate::error::EngineError::Startup(format!("position mode check failed: {}", e)))?;

        // Fail-closed startup guard (spec §7 class 5), shared with the
        // per-tick guard table rather than reimplemented inline.
        if let Some(guard) = risk::check_startup(&RiskInputs {
            now_ms: now_ms(),
            constraints_loaded: true,
            book_ts_ms: now_ms(),
            funding_ts_ms: now_ms(),
            unhedged_notional: 0.0,
            oldest_open_ticket_age_sec: None,
            reject_streak: 0,
            private_ws_down_since_ms: None,
            posmode_matches: actual_mode == expected_mode,
        }) {
            match guard {
                GuardName::PosmodeMismatch if cfg.auto_set_position_mode => {
                    gw.set_position_mode(expected_mode).await.map_err(|e| {
                        crate::error::EngineError::Startup(format!("auto-set position mode failed: {}", e))
                    })?;
                }
                other => {
                    return Err(crate::error::EngineError::Startup(format!(
                        "startup guard fired: {}",
                        other.as_str()
                    )));
                }
            }
        }

        // Startup reconciliation (spec §6 "Persisted state: none"): seed
        // Inventory from a position snapshot rather than assuming a fresh
        // restart, sweep any orders left open by a prior run, and unwind
        // any residual net exposure immediately rather than waiting for
        // the first tick's unhedged_exposure guard to notice it.
        let snap = gw
            .get_position_snapshot()
            .await
            .map_err(|e| crate::error::EngineError::Startup(format!("position snapshot failed: {}", e)))?;
        let inventory = Inventory { perp_pos: snap.perp_pos, spot_pos: snap.spot_pos };

        let mut oms = Oms::new(&cfg.symbol, cfg.dry_run);
        oms.sweep_stale_orders(gw.as_ref(), &cfg.symbol).await;

        if inventory.net().abs() > f64::EPSILON {
            match gw.subscribe_public_books(&cfg.symbol, Leg::Perp).await {
                Ok(mut perp_rx) => match perp_rx.recv().await {
                    Some(update) => {
                        let bid = update.bids.first().map(|l| l.px).unwrap_or(0.0);
                        let ask = update.asks.first().map(|l| l.px).unwrap_or(0.0);
                        oms.unwind_residual(gw.as_ref(), Leg::Perp, inventory.net(), bid, ask).await;
                    }
                    None => log::warn!("orchestrator: startup residual unwind skipped, no book update received"),
                },
                Err(e) => log::warn!("orchestrator: startup residual unwind skipped, book subscribe failed: {}", e),
            }
        }

        let (normalizer, book_rx) = Normalizer::new(&cfg.symbol);

        Ok(Self {
            oms,
            constraints,
            normalizer,
            book_rx,
            funding: FundingState { rate: 0.0, last_update_ts: 0, next_settle_ts: None },
            inventory,
            mode: Mode::Idle,
            private_ws_down_since: None,
            latency: LatencyAuditor::default(),
            cfg,
            gw,
        })
    }

    fn hedge_cfg(&self) -> HedgeConfig {
        HedgeConfig {
            hedge_slip_bps: self.cfg.hedge_slip_bps,
            hedge_chase_sec: self.cfg.hedge_chase_sec,
            hedge_max_tries: self.cfg.hedge_max_tries,
            hedge_deadline_ms: self.cfg.hedge_deadline_ms,
            chase_gain: self.cfg.chase_gain,
        }
    }

    fn risk_cfg(&self) -> RiskConfig {
        RiskConfig {
            book_stale_sec: self.cfg.book_stale_sec,
            funding_stale_sec: self.cfg.funding_stale_sec,
            max_unhedged_notional: self.cfg.max_unhedged_notional,
            max_unhedged_sec: self.cfg.max_unhedged_sec,
            reject_streak_halt: self.cfg.reject_streak_halt,
            controlled_reconnect_grace_sec: self.cfg.controlled_reconnect_grace_sec,
        }
    }

    /// Runs until a terminal failure, then performs cancel-all -> HALTED
    /// -> returns (spec §4.6). The caller (main) exits non-zero on error.
    pub async fn run(mut self) -> Result<(), crate::error::EngineError> {
        let mut perp_rx = self
            .gw
            .subscribe_public_books(&self.cfg.symbol, Leg::Perp)
            .await
            .map_err(crate::error::EngineError::Gateway)?;
        let mut spot_rx = self
            .gw
            .subscribe_public_books(&self.cfg.symbol, Leg::Spot)
            .await
            .map_err(crate::error::EngineError::Gateway)?;
        let mut private_rx = self
            .gw
            .subscribe_private()
            .await
            .map_err(crate::error::EngineError::Gateway)?;

        let (funding_tx, funding_rx_watch) = watch::channel(self.funding);
        let funding_monitor = crate::funding::FundingMonitor::new(&self.cfg.symbol, self.cfg.funding_poll_sec);
        tokio::spawn(funding_monitor.run(self.gw.clone(), funding_tx));
        let mut funding_rx = funding_rx_watch;

        let mut ticker = interval(Duration::from_secs_f64(self.cfg.tick_sec));

        loop {
            tokio::select! {
                Some(update) = perp_rx.recv() => {
                    self.normalizer.on_update(update);
                }
                Some(update) = spot_rx.recv() => {
                    self.normalizer.on_update(update);
                }
                Some(event) = private_rx.recv() => {
                    self.handle_private_event(event).await;
                }
                _ = funding_rx.changed() => {
                    self.funding = *funding_rx.borrow_and_update();
                }
                _ = ticker.tick() => {
                    if self.tick().await.is_err() {
                        self.shut_down().await;
                        return Ok(());
                    }
                    if self.mode == Mode::Halted {
                        self.shut_down().await;
                        return Ok(());
                    }
                }
                else => {
                    self.shut_down().await;
                    return Ok(());
                }
            }
        }
    }

    async fn handle_private_event(&mut self, event: PrivateEvent) {
        match event {
            PrivateEvent::Fill(fill) => {
                let hedge_cfg = self.hedge_cfg();
                self.oms.on_fill(self.gw.as_ref(), fill, &mut self.inventory, &hedge_cfg, now_ms()).await;
            }
            PrivateEvent::Ack { .. } => {}
            PrivateEvent::Reject { client_id, reason } => {
                EngineEvent::new("order_skip", "orchestrator", self.mode.as_str())
                    .reason("rejected")
                    .client_id(&client_id)
                    .data(serde_json::json!({"detail": reason}))
                    .emit();
            }
            PrivateEvent::ConnectionLost => {
                self.private_ws_down_since = Some(now_ms());
            }
            PrivateEvent::ConnectionRestored => {
                self.private_ws_down_since = None;
            }
        }
    }

    async fn tick(&mut self) -> Result<(), crate::error::EngineError> {
        let started_at = std::time::Instant::now();
        self.oms.begin_cycle();
        let now = now_ms();
        self.oms.retry_pending_fills(now);

        EngineEvent::new("tick", "orchestrator", self.mode.as_str())
            .cycle_id(self.oms.cycle_id())
            .emit();

        let snapshot = self.book_rx.borrow().clone();

        let guard_inputs = RiskInputs {
            now_ms: now,
            constraints_loaded: self.constraints.is_loaded(&self.cfg.symbol),
            book_ts_ms: snapshot.as_ref().map(|s| s.ts_ms).unwrap_or(0),
            funding_ts_ms: self.funding.last_update_ts,
            unhedged_notional: snapshot
                .as_ref()
                .map(|s| self.inventory.unhedged_notional(s.perp_bbo.mid()))
                .unwrap_or(0.0),
            oldest_open_ticket_age_sec: self.oms.oldest_open_ticket_age_sec(now),
            reject_streak: self.oms.reject_streak(),
            private_ws_down_since_ms: self.private_ws_down_since,
            posmode_matches: true,
        };
        let outcome = risk::evaluate(&self.risk_cfg(), &guard_inputs);
        if !outcome.fired.is_empty() {
            EngineEvent::new("risk", "orchestrator", self.mode.as_str())
                .reason(outcome.reason().unwrap_or("guard_fired"))
                .data(serde_json::json!({"fired": outcome.fired.iter().map(|g| g.as_str()).collect::<Vec<_>>()}))
                .emit();
        }
        let hedging_active = self.oms.open_tickets_count() > 0;
        let next = risk::next_mode(self.mode, &outcome, hedging_active);
        if next != self.mode {
            EngineEvent::new("mode_change", "orchestrator", next.as_str())
                .reason(outcome.reason().unwrap_or("tick"))
                .emit();
        }
        self.mode = next;

        if self.oms.take_structural_halt() {
            self.mode = Mode::Halted;
            EngineEvent::new("mode_change", "orchestrator", "HALTED").reason("structural_reject").emit();
        }

        if outcome.cancel_all || self.mode == Mode::Halted {
            self.oms.cancel_all(self.gw.as_ref(), now).await;
        }
        if self.mode == Mode::Halted {
            self.latency.record(started_at.elapsed().as_micros() as u64);
            return Ok(());
        }

        let Some(snapshot) = snapshot else {
            self.latency.record(started_at.elapsed().as_micros() as u64);
            return Ok(());
        };

        if outcome.trigger_unwind {
            self.oms
                .force_unwind_oldest(self.gw.as_ref(), now, snapshot.perp_bbo.bid_px, snapshot.perp_bbo.ask_px)
                .await;
        }

        if !outcome.cancel_all && !outcome.do_not_quote {
            if let (Some(perp_c), Some(_spot_c)) = (
                self.constraints.get(&self.cfg.symbol, Leg::Perp).copied(),
                self.constraints.get(&self.cfg.symbol, Leg::Spot).copied(),
            ) {
                let guards = GuardFlags { any_blocking: outcome.do_not_quote, reason: outcome.reason() };
                let params = StrategyParams {
                    quote_qty: self.cfg.quote_qty,
                    base_half_spread_bps: self.cfg.base_half_spread_bps,
                    k_obi: self.cfg.k_obi,
                    inventory_skew_bps: self.cfg.inventory_skew_bps,
                    funding_skew_bps: self.cfg.funding_skew_bps,
                    min_abs_funding: self.cfg.min_abs_funding,
                };
                let plan = compute_quote_plan(
                    &snapshot.spot_bbo,
                    &snapshot.perp_bbo,
                    snapshot.obi,
                    &self.funding,
                    &self.inventory,
                    &perp_c,
                    &guards,
                    &params,
                );
                self.oms
                    .reconcile_quotes(self.gw.as_ref(), &plan, snapshot.perp_bbo.mid(), self.cfg.replace_threshold_bps, now)
                    .await;
            }
        }

        self.oms
            .check_hedge_timeouts(
                self.gw.as_ref(),
                &self.hedge_cfg(),
                now,
                snapshot.spot_bbo.bid_px,
                snapshot.spot_bbo.ask_px,
                snapshot.perp_bbo.bid_px,
                snapshot.perp_bbo.ask_px,
            )
            .await;

        self.latency.record(started_at.elapsed().as_micros() as u64);

        EngineEvent::new("state", "orchestrator", self.mode.as_str())
            .data(serde_json::json!({
                "perp_pos": self.inventory.perp_pos,
                "spot_pos": self.inventory.spot_pos,
                "net": self.inventory.net(),
                "open_tickets": self.oms.open_tickets_count(),
                "cancel_fill_ratio": self.oms.cancel_fill_ratio(),
                "tick_latency_p95_us": self.latency.p95_us(),
            }))
            .emit();

        Ok(())
    }

    async fn shut_down(&mut self) {
        self.oms.cancel_all(self.gw.as_ref(), now_ms()).await;
        self.mode = Mode::Halted;
        EngineEvent::new("mode_change", "orchestrator", "HALTED").reason("shutdown").emit();
    }
}
