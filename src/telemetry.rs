// telemetry.rs — structured JSONL event log (spec §6 Logger collaborator).
//
// Keeps the teacher's `log`/`env_logger` pair as the actual sink (stdout by
// default, level via RUST_LOG) but wraps every domain event in a fixed-shape
// struct before handing it to `log::info!`, so a downstream JSONL consumer
// always finds the same field set regardless of event type.
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct EngineEvent<'a> {
    pub ts: i64,
    pub event: &'a str,
    pub intent: Option<&'a str>,
    pub source: &'a str,
    pub mode: &'a str,
    pub reason: Option<&'a str>,
    pub leg: Option<&'a str>,
    pub cycle_id: Option<u64>,
    pub client_id: Option<&'a str>,
    pub exch_order_id: Option<&'a str>,
    pub trade_id: Option<&'a str>,
    pub data: Option<Value>,
    pub res: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated: Option<bool>,
}

impl<'a> EngineEvent<'a> {
    pub fn new(event: &'a str, source: &'a str, mode: &'a str) -> Self {
        Self {
            ts: Utc::now().timestamp_millis(),
            event,
            intent: None,
            source,
            mode,
            reason: None,
            leg: None,
            cycle_id: None,
            client_id: None,
            exch_order_id: None,
            trade_id: None,
            data: None,
            res: None,
            simulated: None,
        }
    }

    pub fn intent(mut self, v: &'a str) -> Self {
        self.intent = Some(v);
        self
    }
    pub fn reason(mut self, v: &'a str) -> Self {
        self.reason = Some(v);
        self
    }
    pub fn leg(mut self, v: &'a str) -> Self {
        self.leg = Some(v);
        self
    }
    pub fn cycle_id(mut self, v: u64) -> Self {
        self.cycle_id = Some(v);
        self
    }
    pub fn client_id(mut self, v: &'a str) -> Self {
        self.client_id = Some(v);
        self
    }
    pub fn exch_order_id(mut self, v: &'a str) -> Self {
        self.exch_order_id = Some(v);
        self
    }
    pub fn trade_id(mut self, v: &'a str) -> Self {
        self.trade_id = Some(v);
        self
    }
    pub fn data(mut self, v: Value) -> Self {
        self.data = Some(v);
        self
    }
    pub fn res(mut self, v: &'a str) -> Self {
        self.res = Some(v);
        self
    }
    pub fn simulated(mut self, v: bool) -> Self {
        self.simulated = Some(v);
        self
    }

    /// Emits the event as a single JSONL line through `log::info!`.
    pub fn emit(self) {
        match serde_json::to_string(&self) {
            Ok(line) => log::info!("{}", line),
            Err(e) => log::error!("telemetry serialize failed: {}", e),
        }
    }
}
