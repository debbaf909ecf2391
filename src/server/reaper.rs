//! Idle timeout for logged-in users

use super::ServerState;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// How often the reaper looks for idle users
pub const REAP_INTERVAL: Duration = Duration::from_secs(30);

/// Written to a user removed for idling
pub const IDLE_TIMEOUT: &str = "\n\n*** Idle time out ***\n\n";

/// Disconnect logged-in users idle for `limit` or longer, forever
pub async fn idle_reaper(state: Arc<ServerState>, limit: Duration) {
    let mut ticker = tokio::time::interval(REAP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let reaped = reap_idle(&state, limit);
        if reaped > 0 {
            tracing::info!("reaped {} idle users", reaped);
        }
    }
}

/// One pass of the reaper. Returns how many users were disconnected.
///
/// The idle check and the departure are one step, so a user whose input
/// lands during the pass is not removed.
pub fn reap_idle(state: &ServerState, limit: Duration) -> usize {
    let mut reaped = 0;
    for session in state.registry.snapshot() {
        let departure =
            session.depart_if(|stage, idle| stage.is_logged_in() && idle >= limit);
        if let Some(departure) = departure {
            session.write(IDLE_TIMEOUT);
            state.teardown(&session, departure);
            reaped += 1;
        }
    }
    reaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Harness;
    use crate::transport::Transport;

    #[tokio::test(start_paused = true)]
    async fn test_reaps_only_idle_users() {
        let harness = Harness::new();
        let (alice, alice_out) = harness.user("alice");
        let (bob, bob_out) = harness.user("bob");

        tokio::time::advance(Duration::from_secs(90)).await;
        bob.touch();

        assert_eq!(reap_idle(&harness.state, Duration::from_secs(60)), 1);
        assert!(alice_out.output().contains("*** Idle time out ***"));
        assert!(alice_out.is_closed());
        assert!(!harness.state.registry.contains(&alice));

        assert!(!bob_out.is_closed());
        assert!(bob_out.output().contains("[Leaving is: alice]"));
        assert_eq!(harness.state.counters.online(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_skips_departed_users() {
        let harness = Harness::new();
        let (alice, alice_out) = harness.user("alice");
        let (_bob, bob_out) = harness.user("bob");

        tokio::time::advance(Duration::from_secs(90)).await;
        alice.depart();

        assert_eq!(reap_idle(&harness.state, Duration::from_secs(60)), 1);
        assert!(!alice_out.output().contains("*** Idle time out ***"));
        assert!(bob_out.output().contains("*** Idle time out ***"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_reaper_runs_on_interval() {
        let harness = Harness::new();
        let (_alice, alice_out) = harness.user("alice");

        let reaper = tokio::spawn(idle_reaper(harness.shared(), Duration::from_secs(60)));
        tokio::time::sleep(Duration::from_secs(95)).await;

        assert!(alice_out.is_closed());
        assert!(harness.state.registry.is_empty());
        reaper.abort();
    }
}
