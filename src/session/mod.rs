//! Sessions - one per connected client
//!
//! A [`Session`] owns the outbound half of its connection and guards every
//! mutable field behind its own lock. Nothing outside this module touches
//! those fields directly; callers go through the accessors below.

mod stage;

pub use stage::LoginStage;

use crate::color::ColorTable;
use crate::store::Profile;
use crate::transport::{Transport, TransportKind};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Shortest accepted login name
pub const NAME_MIN_LEN: usize = 3;

/// Longest accepted login name
pub const NAME_MAX_LEN: usize = 16;

/// Longest description, in characters
pub const DESCRIPTION_MAX_LEN: usize = 40;

/// Longest display name including its color markup
pub const RECAP_MAX_LEN: usize = NAME_MAX_LEN * 4;

/// Description given to new users
pub const DEFAULT_DESCRIPTION: &str = "is a newbie.";

/// One entry in a session's tell history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TellRecord {
    /// Name of the other party
    pub peer_name: String,

    /// When the tell happened
    pub at: DateTime<Utc>,

    /// The line as this session saw it
    pub text: String,
}

/// Mutable session fields, only reachable through the session lock
struct SessionState {
    recap: String,
    description: String,
    stage: LoginStage,
    last_input: Instant,
    last_login: Option<DateTime<Utc>>,
    past_tells: Vec<TellRecord>,
    admitted: bool,
    departed: bool,
}

/// What [`Session::depart`] found when it marked the session as leaving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub stage: LoginStage,
    pub admitted: bool,
}

/// A connected client
pub struct Session {
    /// Stable identity, also used to order lock acquisition
    id: Uuid,

    /// Login name, fixed once chosen
    name: OnceLock<String>,

    transport: Arc<dyn Transport>,
    colors: Arc<ColorTable>,
    state: Mutex<SessionState>,
}

impl Session {
    /// Create a session at the start of the login handshake
    pub fn new(transport: Arc<dyn Transport>, colors: Arc<ColorTable>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: OnceLock::new(),
            transport,
            colors,
            state: Mutex::new(SessionState {
                recap: String::new(),
                description: String::new(),
                stage: LoginStage::NeedName,
                last_input: Instant::now(),
                last_login: None,
                past_tells: Vec::new(),
                admitted: false,
                departed: false,
            }),
        }
    }

    /// Get the session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Login name, empty until one has been accepted
    pub fn name(&self) -> &str {
        self.name.get().map(String::as_str).unwrap_or("")
    }

    /// Fix the login name. The display name starts out equal to it.
    ///
    /// Returns false if a name was already set.
    pub fn set_name(&self, name: &str) -> bool {
        if self.name.set(name.to_string()).is_err() {
            return false;
        }
        self.state.lock().recap = name.to_string();
        true
    }

    /// Remote address of the connection
    pub fn peer(&self) -> &str {
        self.transport.peer()
    }

    /// Which listener the connection came in on
    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Display name ("recap"), rendered wherever the name is shown
    pub fn recap(&self) -> String {
        self.state.lock().recap.clone()
    }

    /// Replace the display name. Callers validate it first.
    pub fn set_recap(&self, recap: String) {
        self.state.lock().recap = recap;
    }

    /// Text shown after the name in `who` and announcements
    pub fn description(&self) -> String {
        self.state.lock().description.clone()
    }

    /// Set the description
    pub fn set_description(&self, description: impl Into<String>) {
        self.state.lock().description = description.into();
    }

    /// Current login stage
    pub fn stage(&self) -> LoginStage {
        self.state.lock().stage
    }

    /// Move to a pre-login stage. Use [`Session::activate`] to log in.
    pub fn set_stage(&self, stage: LoginStage) {
        self.state.lock().stage = stage;
    }

    /// Whether login has completed
    pub fn is_logged_in(&self) -> bool {
        self.stage().is_logged_in()
    }

    /// Record that a line of input just arrived
    pub fn touch(&self) {
        self.state.lock().last_input = Instant::now();
    }

    /// Time since the last line of input
    pub fn idle(&self) -> Duration {
        self.state.lock().last_input.elapsed()
    }

    /// When this user last completed a login, if ever
    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_login
    }

    /// Record a completed login
    pub fn set_last_login(&self, at: DateTime<Utc>) {
        self.state.lock().last_login = Some(at);
    }

    /// Mark the session as holding a login slot in the admission counters
    pub fn mark_admitted(&self) {
        self.state.lock().admitted = true;
    }

    /// Tell history, oldest first
    pub fn past_tells(&self) -> Vec<TellRecord> {
        self.state.lock().past_tells.clone()
    }

    /// Take on the fields of a stored profile
    pub fn apply_profile(&self, profile: &Profile) {
        let mut state = self.state.lock();
        if !profile.recap.is_empty() {
            state.recap = profile.recap.clone();
        }
        state.description = profile.description.clone();
        state.last_login = profile.last_login;
    }

    /// Snapshot of the fields that get persisted
    pub fn profile(&self) -> Profile {
        let state = self.state.lock();
        Profile {
            name: self.name().to_string(),
            recap: state.recap.clone(),
            description: state.description.clone(),
            last_login: state.last_login,
        }
    }

    /// Render color markup and send the result as one write
    pub fn write(&self, text: &str) {
        let rendered = self.colors.render(text);
        let _state = self.state.lock();
        if let Err(e) = self.transport.send(Bytes::from(rendered)) {
            tracing::debug!(session = %self.id, "dropped write: {}", e);
        }
    }

    /// Close the transport. Safe to call any number of times.
    pub fn close(&self) {
        let _state = self.state.lock();
        self.transport.close();
    }

    /// Whether teardown has started
    pub fn has_departed(&self) -> bool {
        self.state.lock().departed
    }

    /// Mark the session as leaving.
    ///
    /// Returns `None` if it was already marked, so teardown runs once.
    pub fn depart(&self) -> Option<Departure> {
        self.depart_if(|_, _| true)
    }

    /// Mark the session as leaving if `check(stage, idle)` holds.
    ///
    /// The check and the mark happen under one lock, so input or login
    /// progress cannot slip in between.
    pub fn depart_if(
        &self,
        check: impl FnOnce(LoginStage, Duration) -> bool,
    ) -> Option<Departure> {
        let mut state = self.state.lock();
        if state.departed || !check(state.stage, state.last_input.elapsed()) {
            return None;
        }
        state.departed = true;
        Some(Departure {
            stage: state.stage,
            admitted: state.admitted,
        })
    }

    /// Run `claim` under the session lock unless the session has departed.
    ///
    /// Returns false when departed or when `claim` does. `claim` must not
    /// touch this session.
    pub fn claim_while_present(&self, claim: impl FnOnce() -> bool) -> bool {
        let state = self.state.lock();
        !state.departed && claim()
    }

    /// Complete login: become [`LoginStage::Active`] and run `publish`.
    ///
    /// Both happen under the session lock, and only if the session has not
    /// departed, so a concurrent [`Session::depart`] sees either a session
    /// that never logged in or one that is fully published. `publish` must
    /// not touch this session.
    pub fn activate(&self, publish: impl FnOnce()) -> bool {
        let mut state = self.state.lock();
        if state.departed {
            return false;
        }
        state.stage = LoginStage::Active;
        publish();
        true
    }

    /// Send a private message from this session to `to`.
    ///
    /// Both histories are updated while holding both locks; the writes go
    /// out afterwards. A session telling itself is ignored.
    pub fn tell(&self, to: &Session, message: &str) {
        if self.id == to.id {
            return;
        }

        let (received, sent) = {
            let (mut from_state, mut to_state) = lock_pair(self, to);
            let now = Utc::now();
            let received = format!("{} tells you~RS: {}\n", from_state.recap, message);
            let sent = format!("you tell {}~RS: {}\n", to_state.recap, message);

            from_state.past_tells.push(TellRecord {
                peer_name: to.name().to_string(),
                at: now,
                text: sent.clone(),
            });
            to_state.past_tells.push(TellRecord {
                peer_name: self.name().to_string(),
                at: now,
                text: received.clone(),
            });
            (received, sent)
        };

        to.write(&received);
        self.write(&sent);
    }
}

/// Lock two distinct sessions in id order, returning the guards as `(a, b)`
fn lock_pair<'a>(
    a: &'a Session,
    b: &'a Session,
) -> (MutexGuard<'a, SessionState>, MutexGuard<'a, SessionState>) {
    if a.id < b.id {
        let first = a.state.lock();
        let second = b.state.lock();
        (first, second)
    } else {
        let first = b.state.lock();
        let second = a.state.lock();
        (second, first)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("peer", &self.peer())
            .finish()
    }
}
