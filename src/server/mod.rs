//! Server module - listeners, connection lifecycle and shared state

mod connection;
mod listener;
mod reaper;
mod state;

pub use connection::{handle_connection, run_session, LOGIN_TIMEOUT, MISSING_PRE_LOGIN};
pub use listener::{ServerListener, SHUTDOWN_NOTICE};
pub use reaper::{idle_reaper, reap_idle, IDLE_TIMEOUT, REAP_INTERVAL};
pub use state::ServerState;
