//! Talking: say, think, tell, revtell

use super::CommandResult;
use crate::server::ServerState;
use crate::session::Session;
use std::sync::Arc;

/// Reply when a tell names nobody online
pub const NOT_LOGGED_ON: &str = "There is no one of that name logged on.\n";

const TELL_USAGE: &str = "Usage: tell <user> <text>\n";

/// `say <text>`: broadcast to everyone, sender included
pub fn say(state: &ServerState, session: &Arc<Session>, arg: &str) -> CommandResult {
    if !arg.is_empty() {
        state
            .registry
            .broadcast(&format!("{} says: {}\n", session.recap(), arg));
    }
    CommandResult::Continue
}

pub fn think(state: &ServerState, session: &Arc<Session>, arg: &str) -> CommandResult {
    let recap = session.recap();
    let line = if arg.is_empty() {
        format!("{} thinks nothing--now that is just typical!\n", recap)
    } else {
        format!("{} thinks . o O ( {} )\n", recap, arg)
    };
    state.registry.broadcast(&line);
    CommandResult::Continue
}

/// `tell <user> <text>`: private message, recorded for both parties
pub fn tell(state: &ServerState, session: &Arc<Session>, arg: &str) -> CommandResult {
    let Some((target, message)) = arg.split_once(char::is_whitespace) else {
        session.write(TELL_USAGE);
        return CommandResult::Continue;
    };
    let message = message.trim_start();
    if target.is_empty() || message.is_empty() {
        session.write(TELL_USAGE);
        return CommandResult::Continue;
    }

    let Some(other) = state.registry.find_by_name(target) else {
        session.write(NOT_LOGGED_ON);
        return CommandResult::Continue;
    };
    if other.id() == session.id() {
        session.write("Talking to yourself is the first sign of madness\n");
        return CommandResult::Continue;
    }

    session.tell(&other, message);
    CommandResult::Continue
}

/// `revtell`: replay this session's tell history
pub fn revtell(_state: &ServerState, session: &Arc<Session>, _arg: &str) -> CommandResult {
    let history = session.past_tells();
    session.write("\n~BB~FG*** Your Tell buffer ***\n");
    if history.is_empty() {
        session.write("Revtell buffer is empty.\n");
        return CommandResult::Continue;
    }

    let lines: String = history.iter().map(|record| record.text.as_str()).collect();
    session.write(&lines);
    session.write("\n~BB~FG*** End ***\n\n");
    CommandResult::Continue
}
