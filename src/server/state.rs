//! Server state shared across connections

use crate::color::ColorTable;
use crate::commands::CommandTable;
use crate::config::Config;
use crate::motd::{DirMotdProvider, MotdProvider};
use crate::registry::{Counters, Registry};
use crate::session::{Departure, Session};
use crate::store::{JsonProfileStore, ProfileStore};
use anyhow::Result;
use std::sync::Arc;

/// Everything a connection needs, passed explicitly to each task
pub struct ServerState {
    pub config: Config,
    pub registry: Registry,
    pub counters: Counters,
    pub colors: Arc<ColorTable>,
    pub commands: CommandTable,
    pub store: Arc<dyn ProfileStore>,
    pub motd: Arc<dyn MotdProvider>,
}

impl ServerState {
    pub fn new(
        config: Config,
        colors: Arc<ColorTable>,
        store: Arc<dyn ProfileStore>,
        motd: Arc<dyn MotdProvider>,
    ) -> Self {
        Self {
            config,
            registry: Registry::new(),
            counters: Counters::new(),
            colors,
            commands: CommandTable::standard(),
            store,
            motd,
        }
    }

    /// Build the state from the data files named in `config`
    pub fn from_config(config: Config) -> Result<Self> {
        let colors = match ColorTable::load(&config.paths.color_codes) {
            Ok(colors) => colors,
            Err(e) => {
                tracing::warn!("unable to read color codes ({:#}), using built-in table", e);
                ColorTable::default()
            }
        };
        let colors = Arc::new(colors);

        let motd = DirMotdProvider::load(&config.paths.motds)?;
        let (pre_login, post_login) = motd.counts();
        tracing::info!(
            "There are {} login motds and {} post-login motds",
            pre_login,
            post_login
        );

        let store = JsonProfileStore::new(config.paths.users.clone());

        Ok(Self::new(config, colors, Arc::new(store), Arc::new(motd)))
    }

    /// Tear a session down: farewell, close, persist, unregister, uncount.
    ///
    /// Only the first call for a session does anything, so the read loop,
    /// `quit` and the idle timers can all call this freely.
    pub fn disconnect(&self, session: &Arc<Session>) {
        if let Some(departure) = session.depart() {
            self.teardown(session, departure);
        }
    }

    /// Finish a departure that the caller has already claimed with
    /// [`Session::depart`] or [`Session::depart_if`]
    pub(crate) fn teardown(&self, session: &Arc<Session>, departure: Departure) {
        let logged_in = departure.stage.is_logged_in();

        if logged_in {
            session.write("\nYou are removed from this reality...\n\n");
            session.write(&format!(
                "You were logged on from site {}\n",
                session.peer()
            ));
            self.registry
                .broadcast(&format!("[Leaving is: {}]\n", session.recap()));
        }

        session.close();

        if logged_in {
            if let Err(e) = self.store.save(&session.profile()) {
                tracing::error!(user = %session.name(), "unable to save user file: {}", e);
            }
        }

        self.registry.remove(session);

        if logged_in {
            self.counters.user_left();
        } else if departure.admitted {
            self.counters.login_abandoned();
        }

        tracing::info!(
            session = %session.id(),
            peer = %session.peer(),
            user = %session.name(),
            stage = %departure.stage,
            "session disconnected"
        );
    }

    /// Disconnect every logged-in session, e.g. at shutdown
    pub fn disconnect_all(&self, message: &str) {
        for session in self.registry.snapshot() {
            session.write(message);
            self.disconnect(&session);
        }
    }
}
