//! Admission-control counters

use parking_lot::Mutex;
use thiserror::Error;

/// Why a new connection was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Refusal {
    /// Logins are switched off in the config
    #[error("logins are stopped")]
    LoginsStopped,
    /// Online plus logging-in users reached the limit
    #[error("server is full")]
    Full,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counts {
    online: usize,
    logging_in: usize,
}

/// Users online and logins in progress, guarded by their own lock
#[derive(Debug, Default)]
pub struct Counters {
    counts: Mutex<Counts>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the limits and, if there is room, claim a login slot.
    ///
    /// The check and the claim happen under one lock acquisition.
    pub fn try_admit(&self, max_users: usize, stop_logins: bool) -> Result<(), Refusal> {
        if stop_logins {
            return Err(Refusal::LoginsStopped);
        }
        let mut counts = self.counts.lock();
        if counts.online + counts.logging_in >= max_users {
            return Err(Refusal::Full);
        }
        counts.logging_in += 1;
        Ok(())
    }

    /// A login slot became an online user
    pub fn login_completed(&self) {
        let mut counts = self.counts.lock();
        counts.logging_in = counts.logging_in.saturating_sub(1);
        counts.online += 1;
    }

    /// A session left before finishing login
    pub fn login_abandoned(&self) {
        let mut counts = self.counts.lock();
        counts.logging_in = counts.logging_in.saturating_sub(1);
    }

    /// An online user left
    pub fn user_left(&self) {
        let mut counts = self.counts.lock();
        counts.online = counts.online.saturating_sub(1);
    }

    /// Sessions that completed login and have not left
    pub fn online(&self) -> usize {
        self.counts.lock().online
    }

    /// Admitted sessions still in the handshake
    pub fn logins_in_progress(&self) -> usize {
        self.counts.lock().logging_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_admission_limits() {
        let counters = Counters::new();
        assert_eq!(counters.try_admit(0, false), Err(Refusal::Full));
        assert_eq!(counters.try_admit(10, true), Err(Refusal::LoginsStopped));

        assert!(counters.try_admit(2, false).is_ok());
        assert!(counters.try_admit(2, false).is_ok());
        assert_eq!(counters.try_admit(2, false), Err(Refusal::Full));

        counters.login_completed();
        assert_eq!(counters.online(), 1);
        assert_eq!(counters.logins_in_progress(), 1);
        assert_eq!(counters.try_admit(2, false), Err(Refusal::Full));

        counters.login_abandoned();
        counters.user_left();
        assert_eq!(counters.online(), 0);
        assert_eq!(counters.logins_in_progress(), 0);
    }

    #[test]
    fn test_concurrent_admission_never_exceeds_limit() {
        let counters = Arc::new(Counters::new());
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let counters = counters.clone();
                std::thread::spawn(move || counters.try_admit(10, false).is_ok())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 10);
        assert_eq!(counters.logins_in_progress(), 10);
    }
}
