//! Logical session state, surviving physical reconnects when resumable.

use wstether_core::protocol::Intents;

/// State of one logical session.
///
/// Created empty; populated from the Ready dispatch; carried across
/// physical connections until a non-resumable verdict clears it.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session ID from Ready, required for a resume.
    pub session_id: Option<String>,
    /// Resume URL the server announced in Ready, when any.
    pub resume_url: Option<String>,
    /// Highest sequence number seen on this session.
    sequence: Option<u64>,
    /// Shard `(index, count)` for this instance.
    pub shard: Option<(u32, u32)>,
    /// Intents this session was identified with.
    pub intents: Intents,
}

impl Session {
    pub fn new(intents: Intents, shard: Option<(u32, u32)>) -> Self {
        Self {
            session_id: None,
            resume_url: None,
            sequence: None,
            shard,
            intents,
        }
    }

    /// Record a dispatch sequence number. Monotonic: a stale value never
    /// lowers the stored sequence.
    pub fn observe_seq(&mut self, seq: u64) {
        match self.sequence {
            Some(cur) if cur >= seq => {}
            _ => self.sequence = Some(seq),
        }
    }

    /// Highest sequence seen, if any dispatch arrived yet.
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    /// Populate from a Ready dispatch.
    pub fn established(&mut self, session_id: String, resume_url: Option<String>) {
        self.session_id = Some(session_id);
        self.resume_url = resume_url;
    }

    /// Forget the session entirely after a non-resumable verdict.
    pub fn clear(&mut self) {
        self.session_id = None;
        self.resume_url = None;
        self.sequence = None;
    }

    /// True when a resume can be attempted on the next connection.
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(Intents::GUILDS, None)
    }

    #[test]
    fn starts_empty() {
        let s = session();
        assert!(s.session_id.is_none());
        assert!(s.resume_url.is_none());
        assert!(s.sequence().is_none());
        assert!(!s.can_resume());
    }

    #[test]
    fn sequence_is_monotonic() {
        let mut s = session();
        for seq in [1u64, 2, 3, 2, 1, 7, 5] {
            s.observe_seq(seq);
        }
        assert_eq!(s.sequence(), Some(7));
    }

    #[test]
    fn established_enables_resume() {
        let mut s = session();
        s.established("abc123".into(), Some("wss://resume.example".into()));
        assert!(s.can_resume());
        assert_eq!(s.resume_url.as_deref(), Some("wss://resume.example"));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut s = session();
        s.established("abc123".into(), None);
        s.observe_seq(9);
        s.clear();
        assert!(!s.can_resume());
        assert!(s.sequence().is_none());
        assert!(s.resume_url.is_none());
    }
}
