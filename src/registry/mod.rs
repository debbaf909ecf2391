//! Registry of logged-in sessions and the admission counters
//!
//! Lock order: a session lock may be held while a registry lock is taken,
//! never the reverse. Anything that needs session fields takes a
//! [`Registry::snapshot`] first and reads the sessions after the registry
//! lock is released.
//!
//! Names are claimed at the name prompt, before login completes, so two
//! connections cannot race each other to the same name.

mod counters;

pub use counters::{Counters, Refusal};

use crate::session::Session;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Sessions that have completed login, in the order they arrived
#[derive(Default)]
pub struct Registry {
    sessions: Mutex<Vec<Arc<Session>>>,
    /// Lowercased name to the session holding it
    claims: Mutex<HashMap<String, Uuid>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name` for session `id`, ignoring case.
    ///
    /// Returns false if another session holds it. Claiming a name the
    /// session already holds succeeds.
    pub fn claim_name(&self, name: &str, id: Uuid) -> bool {
        let mut claims = self.claims.lock();
        match claims.get(&name.to_lowercase()) {
            Some(holder) => *holder == id,
            None => {
                claims.insert(name.to_lowercase(), id);
                true
            }
        }
    }

    /// Add a session and claim its name.
    ///
    /// Adding one that is already present does nothing.
    pub fn add(&self, session: Arc<Session>) -> bool {
        if !session.name().is_empty() {
            self.claim_name(session.name(), session.id());
        }
        let mut sessions = self.sessions.lock();
        if sessions.iter().any(|s| Arc::ptr_eq(s, &session)) {
            return false;
        }
        sessions.push(session);
        true
    }

    /// Remove a session by identity and release its name.
    ///
    /// Returns false if it was not a member.
    pub fn remove(&self, session: &Session) -> bool {
        self.claims.lock().retain(|_, holder| *holder != session.id());
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|s| s.id() != session.id());
        sessions.len() != before
    }

    /// Find a logged-in session by login name, ignoring case
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Session>> {
        let wanted = name.to_lowercase();
        // Names are fixed once set, so this needs no session locks
        self.sessions
            .lock()
            .iter()
            .find(|s| s.name().to_lowercase() == wanted)
            .cloned()
    }

    /// Whether `session` is a member
    pub fn contains(&self, session: &Session) -> bool {
        self.sessions.lock().iter().any(|s| s.id() == session.id())
    }

    /// Copy of the current membership, in arrival order
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Write `text` to every member
    pub fn broadcast(&self, text: &str) {
        for session in self.snapshot() {
            session.write(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorTable;
    use crate::transport::memory;
    use std::collections::HashSet;

    fn session(name: &str) -> Arc<Session> {
        let (transport, _receiver, _input) = memory::pair(name);
        let session = Session::new(transport, Arc::new(ColorTable::default()));
        session.set_name(name);
        Arc::new(session)
    }

    #[test]
    fn test_add_find_remove() {
        let registry = Registry::new();
        let alice = session("alice");
        let bob = session("bob");

        assert!(registry.add(alice.clone()));
        assert!(registry.add(bob.clone()));
        assert!(!registry.add(alice.clone()));
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.find_by_name("bob").unwrap().id(), bob.id());
        assert_eq!(registry.find_by_name("Bob").unwrap().id(), bob.id());
        assert!(registry.find_by_name("carol").is_none());

        assert!(registry.remove(&alice));
        assert!(!registry.remove(&alice));
        assert!(registry.find_by_name("alice").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_name_claims() {
        let registry = Registry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(registry.claim_name("alice", first));
        assert!(registry.claim_name("alice", first));
        assert!(!registry.claim_name("ALICE", second));

        let bob = session("bob");
        registry.add(bob.clone());
        assert!(!registry.claim_name("bob", second));

        registry.remove(&bob);
        assert!(registry.claim_name("bob", second));
    }

    #[test]
    fn test_remove_releases_claim_of_non_member() {
        let registry = Registry::new();
        let carol = session("carol");
        assert!(registry.claim_name("carol", carol.id()));

        assert!(!registry.remove(&carol));
        assert!(registry.claim_name("carol", Uuid::new_v4()));
    }

    #[test]
    fn test_snapshot_keeps_arrival_order() {
        let registry = Registry::new();
        for name in ["carol", "alice", "bob"] {
            registry.add(session(name));
        }
        let names: Vec<_> = registry
            .snapshot()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn test_concurrent_add_and_remove() {
        let registry = Arc::new(Registry::new());
        let threads = 16;
        let per_thread = 50;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let mut kept = Vec::new();
                    for i in 0..per_thread {
                        let s = session(&format!("u{}_{}", t, i));
                        registry.add(s.clone());
                        if i % 2 == 0 {
                            registry.remove(&s);
                        } else {
                            kept.push(s.id());
                        }
                    }
                    kept
                })
            })
            .collect();

        let mut expected = HashSet::new();
        for handle in handles {
            expected.extend(handle.join().unwrap());
        }

        let actual: Vec<_> = registry.snapshot().iter().map(|s| s.id()).collect();
        let unique: HashSet<_> = actual.iter().copied().collect();
        assert_eq!(actual.len(), unique.len(), "no duplicates");
        assert_eq!(unique, expected);
        assert_eq!(registry.len(), threads * per_thread / 2);
    }
}
