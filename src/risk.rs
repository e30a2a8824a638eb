// risk.rs — guard predicate table and Mode state machine (spec §4.5).
//
// Evaluated once per tick against a cheap snapshot of engine state
// (`RiskInputs`). Guards never mutate state themselves; the orchestrator
// acts on the returned `GuardOutcome`.
use crate::model::Mode;

#[derive(Debug, Clone, Copy)]
pub struct RiskConfig {
    pub book_stale_sec: u64,
    pub funding_stale_sec: u64,
    pub max_unhedged_notional: f64,
    pub max_unhedged_sec: u64,
    pub reject_streak_halt: u32,
    pub controlled_reconnect_grace_sec: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RiskInputs {
    pub now_ms: u64,
    pub constraints_loaded: bool,
    pub book_ts_ms: u64,
    pub funding_ts_ms: u64,
    pub unhedged_notional: f64,
    pub oldest_open_ticket_age_sec: Option<u64>,
    pub reject_streak: u32,
    pub private_ws_down_since_ms: Option<u64>,
    pub posmode_matches: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardName {
    ConstraintsMissing,
    BookStale,
    FundingStale,
    UnhedgedExposure,
    RejectStreak,
    PrivateWsDown,
    PosmodeMismatch,
}

impl GuardName {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardName::ConstraintsMissing => "constraints_missing",
            GuardName::BookStale => "book_stale",
            GuardName::FundingStale => "funding_stale",
            GuardName::UnhedgedExposure => "unhedged_exposure",
            GuardName::RejectStreak => "reject_streak",
            GuardName::PrivateWsDown => "private_ws_down",
            GuardName::PosmodeMismatch => "posmode_mismatch",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GuardOutcome {
    pub fired: Vec<GuardName>,
    pub do_not_quote: bool,
    pub cancel_all: bool,
    pub target_mode: Option<Mode>,
    pub trigger_unwind: bool,
}

impl GuardOutcome {
    pub fn reason(&self) -> Option<&'static str> {
        self.fired.first().map(|g| g.as_str())
    }
}

/// Checked once at startup; fail-closed (spec §7 class 5).
pub fn check_startup(inputs: &RiskInputs) -> Option<GuardName> {
    if !inputs.posmode_matches {
        return Some(GuardName::PosmodeMismatch);
    }
    None
}

pub fn evaluate(cfg: &RiskConfig, inputs: &RiskInputs) -> GuardOutcome {
    let mut out = GuardOutcome::default();

    if !inputs.constraints_loaded {
        out.fired.push(GuardName::ConstraintsMissing);
        out.do_not_quote = true;
    }

    if inputs.now_ms.saturating_sub(inputs.book_ts_ms) > cfg.book_stale_sec * 1000 {
        out.fired.push(GuardName::BookStale);
        out.cancel_all = true;
        out.target_mode = Some(Mode::Cooldown);
    }

    if inputs.now_ms.saturating_sub(inputs.funding_ts_ms) > cfg.funding_stale_sec * 1000 {
        out.fired.push(GuardName::FundingStale);
        out.cancel_all = true;
    }

    let ticket_too_old = inputs
        .oldest_open_ticket_age_sec
        .map(|age| age > cfg.max_unhedged_sec)
        .unwrap_or(false);
    if inputs.unhedged_notional > cfg.max_unhedged_notional || ticket_too_old {
        out.fired.push(GuardName::UnhedgedExposure);
        out.cancel_all = true;
        out.trigger_unwind = true;
    }

    if inputs.reject_streak >= cfg.reject_streak_halt {
        out.fired.push(GuardName::RejectStreak);
        out.target_mode = Some(Mode::Halted);
    }

    if let Some(since) = inputs.private_ws_down_since_ms {
        if inputs.now_ms.saturating_sub(since) > cfg.controlled_reconnect_grace_sec * 1000 {
            out.fired.push(GuardName::PrivateWsDown);
            out.cancel_all = true;
            out.target_mode = Some(Mode::Halted);
        }
    }

    out
}

/// Applies a guard outcome to the current mode, respecting HALTED as
/// absorbing (I6: no order placement ever resumes once HALTED).
pub fn next_mode(current: Mode, outcome: &GuardOutcome, hedging_active: bool) -> Mode {
    if current == Mode::Halted {
        return Mode::Halted;
    }
    if let Some(target) = outcome.target_mode {
        return target;
    }
    if outcome.cancel_all {
        return Mode::Cooldown;
    }
    if hedging_active {
        return Mode::Hedging;
    }
    if !outcome.do_not_quote {
        return Mode::Quoting;
    }
    Mode::Idle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RiskConfig {
        RiskConfig {
            book_stale_sec: 5,
            funding_stale_sec: 120,
            max_unhedged_notional: 500.0,
            max_unhedged_sec: 10,
            reject_streak_halt: 5,
            controlled_reconnect_grace_sec: 15,
        }
    }

    fn fresh_inputs(now_ms: u64) -> RiskInputs {
        RiskInputs {
            now_ms,
            constraints_loaded: true,
            book_ts_ms: now_ms,
            funding_ts_ms: now_ms,
            unhedged_notional: 0.0,
            oldest_open_ticket_age_sec: None,
            reject_streak: 0,
            private_ws_down_since_ms: None,
            posmode_matches: true,
        }
    }

    #[test]
    fn s6_book_stale_forces_cooldown() {
        let inputs = RiskInputs { book_ts_ms: 0, ..fresh_inputs(10_000) };
        let outcome = evaluate(&cfg(), &inputs);
        assert!(outcome.fired.contains(&GuardName::BookStale));
        assert!(outcome.cancel_all);
        assert_eq!(next_mode(Mode::Quoting, &outcome, false), Mode::Cooldown);
    }

    #[test]
    fn halted_is_absorbing() {
        let outcome = evaluate(&cfg(), &fresh_inputs(1000));
        assert_eq!(next_mode(Mode::Halted, &outcome, false), Mode::Halted);
    }

    #[test]
    fn reject_streak_halts() {
        let inputs = RiskInputs { reject_streak: 5, ..fresh_inputs(1000) };
        let outcome = evaluate(&cfg(), &inputs);
        assert_eq!(next_mode(Mode::Quoting, &outcome, false), Mode::Halted);
    }

    #[test]
    fn unhedged_exposure_triggers_unwind() {
        let inputs = RiskInputs { unhedged_notional: 1000.0, ..fresh_inputs(1000) };
        let outcome = evaluate(&cfg(), &inputs);
        assert!(outcome.trigger_unwind);
        assert!(outcome.fired.contains(&GuardName::UnhedgedExposure));
    }

    #[test]
    fn posmode_mismatch_refuses_start() {
        let inputs = RiskInputs { posmode_matches: false, ..fresh_inputs(1000) };
        assert_eq!(check_startup(&inputs), Some(GuardName::PosmodeMismatch));
    }

    #[test]
    fn clean_tick_enters_quoting() {
        let outcome = evaluate(&cfg(), &fresh_inputs(1000));
        assert!(outcome.fired.is_empty());
        assert_eq!(next_mode(Mode::Idle, &outcome, false), Mode::Quoting);
    }
}
