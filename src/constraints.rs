// constraints.rs — Constraints Store (spec §4, "Constraints Store" row).
//
// Loaded once at startup per symbol/leg via the Gateway, then immutable.
// Queried by the OMS for rounding and min-notional validation.
use std::collections::HashMap;

use crate::gateway::Gateway;
use crate::model::{Constraints, Leg};
use crate::telemetry::EngineEvent;

#[derive(Default)]
pub struct ConstraintsStore {
    inner: HashMap<(String, Leg), Constraints>,
}

impl ConstraintsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_all(&mut self, gw: &dyn Gateway, symbol: &str) -> Result<(), crate::error::GatewayError> {
        for leg in [Leg::Perp, Leg::Spot] {
            let c = gw.load_constraints(symbol, leg).await?;
            self.inner.insert((symbol.to_string(), leg), c);
            EngineEvent::new("constraints_loaded", "constraints", "IDLE")
                .leg(leg.as_str())
                .data(serde_json::json!({
                    "symbol": symbol,
                    "price_tick": c.price_tick,
                    "size_step": c.size_step,
                    "min_notional": c.min_notional,
                    "min_size": c.min_size,
                }))
                .emit();
        }
        Ok(())
    }

    pub fn get(&self, symbol: &str, leg: Leg) -> Option<&Constraints> {
        self.inner.get(&(symbol.to_string(), leg))
    }

    pub fn is_loaded(&self, symbol: &str) -> bool {
        self.inner.contains_key(&(symbol.to_string(), Leg::Perp))
            && self.inner.contains_key(&(symbol.to_string(), Leg::Spot))
    }
}
