//! Progress notice board
//!
//! Holds the single user-facing progress/failure notice. Finished and failed
//! notices carry an expiry; in-progress notices stay until replaced.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::ProgressNotice;

pub struct NoticeBoard {
    current: Option<ProgressNotice>,
    expires_at: Option<Instant>,
    success_ttl: Duration,
    failure_ttl: Duration,
}

impl NoticeBoard {
    pub fn new(success_ttl: Duration, failure_ttl: Duration) -> Self {
        Self {
            current: None,
            expires_at: None,
            success_ttl,
            failure_ttl,
        }
    }

    pub fn current(&self) -> Option<&ProgressNotice> {
        self.current.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Show `notice`, replacing whatever is displayed
    pub fn post(&mut self, notice: ProgressNotice, now: Instant) {
        self.expires_at = if notice.is_failure() {
            Some(now + self.failure_ttl)
        } else if notice.is_complete() {
            Some(now + self.success_ttl)
        } else {
            None
        };
        self.current = Some(notice);
    }

    /// Drop the notice if it has expired; returns true when one was dismissed
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) if deadline <= now => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.expires_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> NoticeBoard {
        NoticeBoard::new(Duration::from_secs(2), Duration::from_secs(5))
    }

    #[test]
    fn test_failure_dismissed_after_ttl() {
        let mut board = board();
        let now = Instant::now();
        board.post(ProgressNotice::failure("Separation failed"), now);

        assert_eq!(board.deadline(), Some(now + Duration::from_secs(5)));
        assert!(!board.expire(now + Duration::from_secs(4)));
        assert!(board.expire(now + Duration::from_secs(5)));
        assert!(board.current().is_none());
    }

    #[test]
    fn test_progress_stays_until_replaced() {
        let mut board = board();
        let now = Instant::now();
        board.post(ProgressNotice::new(2, "Separating stems", 40.0), now);
        assert!(board.deadline().is_none());
        assert!(!board.expire(now + Duration::from_secs(60)));

        board.post(ProgressNotice::new(6, "Done", 100.0), now);
        assert_eq!(board.deadline(), Some(now + Duration::from_secs(2)));
    }

    #[test]
    fn test_history_loaded_notice_uses_success_ttl() {
        let mut board = board();
        let now = Instant::now();
        board.post(ProgressNotice::new(7, "Loaded from history", 100.0), now);
        assert!(!board.expire(now + Duration::from_secs(1)));
        assert!(board.expire(now + Duration::from_secs(2)));
        assert!(board.current().is_none());
    }
}
