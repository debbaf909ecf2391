//! Command handling for logged-in users
//!
//! Input starting with `.` names a command: `.tell bob hi` runs `tell` with
//! `bob hi`. Anything else is said to the room.

mod chat;
mod info;
mod profile;

use crate::server::ServerState;
use crate::session::Session;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Marks the start of a command
pub const COMMAND_PREFIX: char = '.';

/// Command run for input without the prefix
pub const DEFAULT_COMMAND: &str = "say";

/// Reply for verbs not in the table
pub const UNKNOWN_COMMAND: &str = "unknown command\n";

/// Whether the read loop keeps going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    Exit,
}

/// A command implementation: session, argument text
pub type Handler = fn(&ServerState, &Arc<Session>, &str) -> CommandResult;

/// Verb to handler map. Verbs are case-sensitive.
#[derive(Clone)]
pub struct CommandTable {
    handlers: BTreeMap<&'static str, Handler>,
}

impl CommandTable {
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// The talker's full command set
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register("desc", profile::desc);
        table.register("help", info::help);
        table.register("quit", quit);
        table.register("revtell", chat::revtell);
        table.register("say", chat::say);
        table.register("set", profile::set);
        table.register("tell", chat::tell);
        table.register("think", chat::think);
        table.register("who", info::who);
        table
    }

    /// Add or replace the handler for `verb`
    pub fn register(&mut self, verb: &'static str, handler: Handler) {
        self.handlers.insert(verb, handler);
    }

    /// Look up an exact verb. Verbs are case-sensitive.
    pub fn get(&self, verb: &str) -> Option<Handler> {
        self.handlers.get(verb).copied()
    }

    /// Registered verbs in sorted order
    pub fn verbs(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.verbs()).finish()
    }
}

/// Split an input line into `(verb, argument)`
pub fn parse_input(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.strip_prefix(COMMAND_PREFIX) {
        Some(rest) => rest.split_once(char::is_whitespace).unwrap_or((rest, "")),
        None => (DEFAULT_COMMAND, line),
    }
}

/// Parse `line` and run the matching command
pub fn dispatch(state: &ServerState, session: &Arc<Session>, line: &str) -> CommandResult {
    let (verb, arg) = parse_input(line);
    match state.commands.get(verb) {
        Some(handler) => handler(state, session, arg),
        None => {
            session.write(UNKNOWN_COMMAND);
            CommandResult::Continue
        }
    }
}

fn quit(state: &ServerState, session: &Arc<Session>, _arg: &str) -> CommandResult {
    state.disconnect(session);
    CommandResult::Exit
}
