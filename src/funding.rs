// funding.rs — Funding Monitor (spec §4.2).
//
// Polls the gateway's funding-rate endpoint on a fixed interval. On error,
// the previous rate is retained and `last_update_ts` is left untouched —
// that's what makes the funding_stale guard meaningful.
use std::time::Duration;

use crate::gateway::Gateway;
use crate::model::FundingState;

pub struct FundingMonitor {
    symbol: String,
    poll_interval: Duration,
    state: FundingState,
}

impl FundingMonitor {
    pub fn new(symbol: &str, funding_poll_sec: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            poll_interval: Duration::from_secs(funding_poll_sec),
            state: FundingState { rate: 0.0, last_update_ts: 0, next_settle_ts: None },
        }
    }

    pub fn state(&self) -> FundingState {
        self.state
    }

    /// Polls once. Returns true if the state advanced (success), false if
    /// the previous value was retained after a failure.
    pub async fn poll_once(&mut self, gw: &dyn Gateway) -> bool {
        match gw.get_funding_rate(&self.symbol).await {
            Ok((rate, ts)) => {
                self.state = FundingState { rate, last_update_ts: ts, next_settle_ts: None };
                true
            }
            Err(e) => {
                log::warn!("funding: poll failed for {}: {}", self.symbol, e);
                false
            }
        }
    }

    /// Runs the poll loop forever, publishing into the watch channel.
    pub async fn run(mut self, gw: std::sync::Arc<dyn Gateway>, tx: tokio::sync::watch::Sender<FundingState>) {
        loop {
            self.poll_once(gw.as_ref()).await;
            let _ = tx.send(self.state);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SimGateway;

    #[tokio::test]
    async fn successful_poll_advances_state() {
        let gw = SimGateway::new(0.1, 0.001, 0.0007);
        let mut monitor = FundingMonitor::new("ETH", 30);
        assert_eq!(monitor.state().last_update_ts, 0);
        let advanced = monitor.poll_once(&gw).await;
        assert!(advanced);
        assert_eq!(monitor.state().rate, 0.0007);
    }
}
