//! Per-connection lifecycle: admission, login timer, read loop

use super::ServerState;
use crate::commands::{self, CommandResult};
use crate::login;
use crate::motd::MotdStage;
use crate::registry::Refusal;
use crate::session::{LoginStage, Session};
use crate::transport::{LineReceiver, Transport};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

/// Written when the pre-login MOTD pool is empty
pub const MISSING_PRE_LOGIN: &str =
    "Welcome to here!\n\nSorry, but the login screen appears to be missing at this time.\n";

/// Written when a session sits at the name prompt too long
pub const LOGIN_TIMEOUT: &str = "\n\n*** Time out ***\n\n";

const LOGINS_STOPPED: &str =
    "\n\rSorry, but no connections can be made at the moment.\n\rPlease try later\n\n\r";
const SERVER_FULL: &str =
    "\n\rSorry, but we cannot accept any more connections at this moment.\n\rPlease try again later\n\n\r";

/// Take a freshly accepted connection from greeting to teardown
pub async fn handle_connection(
    state: Arc<ServerState>,
    transport: Arc<dyn Transport>,
    lines: Box<dyn LineReceiver>,
) {
    let session = Arc::new(Session::new(transport, state.colors.clone()));
    tracing::info!(
        session = %session.id(),
        peer = %session.peer(),
        kind = %session.transport_kind(),
        "client connected"
    );

    match state.motd.pick(MotdStage::PreLogin) {
        Some(motd) => session.write(&motd),
        None => session.write(MISSING_PRE_LOGIN),
    }

    let admitted = state
        .counters
        .try_admit(state.config.max_users, state.config.stop_logins);
    if let Err(refusal) = admitted {
        tracing::info!(session = %session.id(), peer = %session.peer(), "refused: {}", refusal);
        session.write(match refusal {
            Refusal::LoginsStopped => LOGINS_STOPPED,
            Refusal::Full => SERVER_FULL,
        });
        state.disconnect(&session);
        return;
    }
    session.mark_admitted();

    run_session(state, session, lines).await;
}

/// Drive an admitted session until it quits or its connection drops
pub async fn run_session(
    state: Arc<ServerState>,
    session: Arc<Session>,
    mut lines: Box<dyn LineReceiver>,
) {
    session.touch();
    login::advance(&state, &session, "");

    let timer = spawn_login_timer(&state, &session);

    loop {
        let line = match lines.receive_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(session = %session.id(), "read ended: {}", e);
                state.disconnect(&session);
                break;
            }
        };
        session.touch();

        let line = line.trim();
        tracing::debug!(session = %session.id(), "client input: {:?}", line);

        if !session.is_logged_in() {
            login::advance(&state, &session, line);
            continue;
        }
        if commands::dispatch(&state, &session, line) == CommandResult::Exit {
            break;
        }
    }

    if let Some(timer) = timer {
        timer.abort();
    }
}

/// Arm the one-shot login idle check. Returns `None` when it is disabled.
fn spawn_login_timer(state: &Arc<ServerState>, session: &Arc<Session>) -> Option<JoinHandle<()>> {
    let limit = state.config.login_idle_timeout();
    if limit.is_zero() {
        return None;
    }

    let state = Arc::clone(state);
    let session: Weak<Session> = Arc::downgrade(session);
    Some(tokio::spawn(async move {
        tokio::time::sleep(limit).await;
        let Some(session) = session.upgrade() else {
            return;
        };
        let expired =
            session.depart_if(|stage, idle| stage == LoginStage::NeedName && idle >= limit);
        if let Some(departure) = expired {
            tracing::info!(session = %session.id(), peer = %session.peer(), "login timed out");
            session.write(LOGIN_TIMEOUT);
            state.teardown(&session, departure);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::Harness;
    use crate::config::Config;
    use crate::transport::memory;
    use std::time::Duration;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_full_session_over_memory_transport() {
        let harness = Harness::new();
        let state = harness.shared();
        let (transport, receiver, input) = memory::pair("127.0.0.1:4100");

        let task = tokio::spawn(handle_connection(
            state.clone(),
            transport.clone(),
            Box::new(receiver),
        ));

        for line in ["bob", "yes", ".desc waves hello", ".quit"] {
            input.send(line.to_string()).unwrap();
        }
        task.await.unwrap();

        let output = transport.output();
        assert!(output.starts_with(MISSING_PRE_LOGIN));
        assert!(output.contains("Give me a name"));
        assert!(output.contains("Description set."));
        assert!(output.contains("You were logged on from site 127.0.0.1:4100"));
        assert!(transport.is_closed());

        assert!(state.registry.is_empty());
        assert_eq!(state.counters.online(), 0);
        assert_eq!(state.counters.logins_in_progress(), 0);
        assert_eq!(state.store.load("bob").unwrap().description, "waves hello");
    }

    #[tokio::test]
    async fn test_refused_when_full() {
        let harness = Harness::with_config(Config {
            max_users: 0,
            ..Config::default()
        });
        let state = harness.shared();
        let (transport, receiver, _input) = memory::pair("peer");

        handle_connection(state.clone(), transport.clone(), Box::new(receiver)).await;

        assert!(transport.output().contains("cannot accept any more connections"));
        assert!(transport.is_closed());
        assert!(state.registry.is_empty());
        assert_eq!(state.counters.logins_in_progress(), 0);
    }

    #[tokio::test]
    async fn test_refused_when_logins_stopped() {
        let harness = Harness::with_config(Config {
            stop_logins: true,
            ..Config::default()
        });
        let state = harness.shared();
        let (transport, receiver, _input) = memory::pair("peer");

        handle_connection(state.clone(), transport.clone(), Box::new(receiver)).await;

        assert!(transport.output().contains("no connections can be made"));
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_dropped_connection_mid_login_frees_slot() {
        let harness = Harness::new();
        let state = harness.shared();
        let (transport, receiver, input) = memory::pair("peer");

        input.send("carol".to_string()).unwrap();
        drop(input);
        handle_connection(state.clone(), transport.clone(), Box::new(receiver)).await;

        assert!(transport.is_closed());
        assert_eq!(state.counters.logins_in_progress(), 0);
        assert_eq!(state.counters.online(), 0);
        assert!(!state.store.exists("carol"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_timer_disconnects_idle_name_prompt() {
        let harness = Harness::with_config(Config {
            login_idle_time: 1,
            ..Config::default()
        });
        let state = harness.shared();
        let (transport, receiver, _input) = memory::pair("peer");

        let task = tokio::spawn(handle_connection(
            state.clone(),
            transport.clone(),
            Box::new(receiver),
        ));
        settle().await;
        assert!(!transport.is_closed());

        tokio::time::advance(Duration::from_secs(61)).await;
        settle().await;
        task.await.unwrap();

        assert!(transport.output().contains("*** Time out ***"));
        assert!(transport.is_closed());
        assert_eq!(state.counters.logins_in_progress(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_timer_fires_once() {
        let harness = Harness::with_config(Config {
            login_idle_time: 1,
            ..Config::default()
        });
        let state = harness.shared();
        let (transport, receiver, input) = memory::pair("peer");

        let task = tokio::spawn(handle_connection(
            state.clone(),
            transport.clone(),
            Box::new(receiver),
        ));
        settle().await;

        tokio::time::advance(Duration::from_secs(50)).await;
        input.send("al".to_string()).unwrap();
        settle().await;

        // At expiry the session has been idle 10s, so it survives
        tokio::time::advance(Duration::from_secs(15)).await;
        settle().await;
        assert!(!transport.is_closed());

        // The check is not rearmed
        tokio::time::advance(Duration::from_secs(600)).await;
        settle().await;
        assert!(!transport.output().contains("*** Time out ***"));
        assert!(!transport.is_closed());
        assert_eq!(state.counters.logins_in_progress(), 1);

        drop(input);
        task.await.unwrap();
        assert_eq!(state.counters.logins_in_progress(), 0);
    }

    #[tokio::test]
    async fn test_teardown_before_login_completes() {
        let harness = Harness::new();
        let state = harness.shared();
        let (transport, _receiver, _input) = memory::pair("peer");
        let session = Arc::new(Session::new(transport.clone(), state.colors.clone()));
        state.counters.try_admit(10, false).unwrap();
        session.mark_admitted();

        login::advance(&state, &session, "hank");
        state.disconnect(&session);
        login::advance(&state, &session, "");
        login::advance(&state, &session, "");

        assert!(transport.is_closed());
        assert!(!session.is_logged_in());
        assert!(state.registry.is_empty());
        assert_eq!(state.counters.online(), 0);
        assert_eq!(state.counters.logins_in_progress(), 0);
        assert!(!transport.output().contains("[Entering is: "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_timer_spares_logged_in_users() {
        let harness = Harness::with_config(Config {
            login_idle_time: 1,
            ..Config::default()
        });
        let state = harness.shared();
        let (transport, receiver, input) = memory::pair("peer");

        let task = tokio::spawn(handle_connection(
            state.clone(),
            transport.clone(),
            Box::new(receiver),
        ));
        input.send("dave".to_string()).unwrap();
        input.send("".to_string()).unwrap();
        settle().await;

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;

        assert!(!transport.output().contains("*** Time out ***"));
        assert!(!transport.is_closed());
        assert_eq!(state.counters.online(), 1);

        drop(input);
        task.await.unwrap();
        assert_eq!(state.counters.online(), 0);
    }
}
