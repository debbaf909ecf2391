//! Login handshake
//!
//! Every line a session sends before it reaches [`LoginStage::Active`] goes
//! through [`advance`], which looks up the handler for the current stage.
//! Handlers write their own prompts and move the session on.

use crate::motd::MotdStage;
use crate::server::ServerState;
use crate::session::{LoginStage, Session, DEFAULT_DESCRIPTION, NAME_MAX_LEN, NAME_MIN_LEN};
use chrono::Utc;
use std::sync::Arc;

/// Written when the post-login MOTD pool is empty
pub const MISSING_POST_LOGIN: &str =
    "Welcome to here!\n\nSorry, but the post login screen appears to be missing at this time.\n";

const NAME_PROMPT: &str = "\nGive me a name: ";
const PASSWORD_PROMPT: &str = "\nPassword: ";
const CONTINUE_PROMPT: &str = "\n\nPress return to continue: \n\n";

/// Handles one line of input for a login stage
type StageHandler = fn(&ServerState, &Arc<Session>, &str);

fn handler_for(stage: LoginStage) -> Option<StageHandler> {
    match stage {
        LoginStage::NeedName => Some(need_name),
        LoginStage::NeedPassword => Some(need_password),
        LoginStage::NeedConfirmNewUser => Some(need_confirm),
        LoginStage::NeedPrompt => Some(need_prompt),
        LoginStage::Active => None,
    }
}

/// Feed one line of input to the handshake
///
/// Input for a session that has already started teardown is dropped.
pub fn advance(state: &ServerState, session: &Arc<Session>, input: &str) {
    if session.has_departed() {
        tracing::debug!(session = %session.id(), "login input after departure");
        return;
    }
    let stage = session.stage();
    match handler_for(stage) {
        Some(handler) => handler(state, session, input),
        None => tracing::warn!(session = %session.id(), "login input for an active session"),
    }
}

fn need_name(state: &ServerState, session: &Arc<Session>, input: &str) {
    if input.is_empty() {
        session.write(NAME_PROMPT);
        return;
    }
    if let Some(problem) = check_name(input) {
        session.write(problem);
        session.write(NAME_PROMPT);
        return;
    }

    let id = session.id();
    if !session.claim_while_present(|| state.registry.claim_name(input, id)) {
        if session.has_departed() {
            return;
        }
        session.write("\nThat name is already logged on.\n\n");
        session.write(NAME_PROMPT);
        return;
    }
    session.set_name(input);
    if state.store.exists(input) {
        match state.store.load(input) {
            Ok(profile) => session.apply_profile(&profile),
            Err(e) => tracing::warn!(user = %input, "unable to load user file: {}", e),
        }
        session.set_stage(LoginStage::NeedPassword);
    } else {
        session.write("new user...\n");
        session.set_stage(LoginStage::NeedConfirmNewUser);
    }
    tracing::debug!(session = %session.id(), user = %input, stage = %session.stage(), "name accepted");
    session.write(PASSWORD_PROMPT);
}

/// Why `name` is malformed, if it is
fn check_name(name: &str) -> Option<&'static str> {
    let len = name.chars().count();
    if len < NAME_MIN_LEN {
        return Some("\nName too short.\n\n");
    }
    if len > NAME_MAX_LEN {
        return Some("\nName too long.\n\n");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Some("\nOnly letters and digits are allowed in a name.\n\n");
    }
    None
}

fn need_password(state: &ServerState, session: &Arc<Session>, _input: &str) {
    // No verification: any password is accepted
    session.set_stage(LoginStage::NeedPrompt);
    session.write(CONTINUE_PROMPT);
    need_prompt(state, session, "");
}

fn need_confirm(state: &ServerState, session: &Arc<Session>, _input: &str) {
    session.set_description(DEFAULT_DESCRIPTION);
    if let Err(e) = state.store.save(&session.profile()) {
        tracing::error!(user = %session.name(), "unable to save new user file: {}", e);
    }
    session.set_stage(LoginStage::NeedPrompt);
    session.write(CONTINUE_PROMPT);
    need_prompt(state, session, "");
}

fn need_prompt(state: &ServerState, session: &Arc<Session>, _input: &str) {
    match state.motd.pick(MotdStage::PostLogin) {
        Some(motd) => session.write(&format!("\n{}", motd)),
        None => session.write(MISSING_POST_LOGIN),
    }
    if let Some(previous) = session.last_login() {
        session.write(&format!(
            "\nYou were last logged in on {}\n",
            previous.format("%a %b %e %H:%M:%S %Y UTC")
        ));
    }

    session.set_last_login(Utc::now());
    session.write("\n\n");

    let published = session.activate(|| {
        state.registry.add(session.clone());
        state.counters.login_completed();
    });
    if !published {
        tracing::debug!(session = %session.id(), "left before login completed");
        return;
    }
    tracing::info!(session = %session.id(), user = %session.name(), peer = %session.peer(), "user logged in");

    state.registry.broadcast(&format!(
        "~OL[Entering is: ~RS{}~RS {}~RS~OL]\n",
        session.recap(),
        session.description()
    ));
}
