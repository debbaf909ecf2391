//! Changing how you appear: desc, set recap

use super::CommandResult;
use crate::server::ServerState;
use crate::session::{Session, DESCRIPTION_MAX_LEN, NAME_MAX_LEN, RECAP_MAX_LEN};
use std::sync::Arc;

const RECAP_USAGE: &str = "Usage: set recap <name as you would like it>\n";

/// `desc [text]`: show or set the description
pub fn desc(_state: &ServerState, session: &Arc<Session>, arg: &str) -> CommandResult {
    if arg.is_empty() {
        session.write(&format!(
            "Your current description is: {}\n",
            session.description()
        ));
        return CommandResult::Continue;
    }
    if arg.chars().count() > DESCRIPTION_MAX_LEN {
        session.write("Description too long.\n");
        return CommandResult::Continue;
    }
    session.set_description(arg);
    session.write("Description set.\n");
    CommandResult::Continue
}

pub fn set(state: &ServerState, session: &Arc<Session>, arg: &str) -> CommandResult {
    let (option, value) = arg.split_once(' ').unwrap_or((arg, ""));
    match option {
        "recap" => set_recap(state, session, value.trim()),
        _ => session.write(RECAP_USAGE),
    }
    CommandResult::Continue
}

fn set_recap(state: &ServerState, session: &Session, value: &str) {
    if value.is_empty() {
        session.write(RECAP_USAGE);
        return;
    }
    if value.len() > RECAP_MAX_LEN {
        session.write("The recapped name length is too long - try using fewer color codes\n");
        return;
    }

    let plain = state.colors.strip(value);
    if plain.chars().count() > NAME_MAX_LEN || plain.to_lowercase() != session.name().to_lowercase()
    {
        session.write("The recapped name still has to match your proper name.\n");
        return;
    }

    session.set_recap(format!("{}~RS", value));
    session.write(&format!(
        "Your name will now appear as '{}~RS' on the 'who', 'examine', tells, etc\n",
        value
    ));
}
