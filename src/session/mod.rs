//! Session management - ephemeral per-connection presence state
//!
//! The registry owns every live session: created on join, mutated on
//! cursor/selection updates, destroyed on leave/disconnect/expiry. All
//! operations are total over absent state - callers treat `None` as
//! "not joined", never as an error.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Time source, injectable so expiry is testable without waiting an hour
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Default window after which a joined session is considered stale
pub const DEFAULT_EXPIRY_MINUTES: i64 = 60;

/// Ephemeral presence record for one live connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub connection_id: Uuid,
    pub board_id: Uuid,
    pub display_name: String,
    pub cursor_x: f64,
    pub cursor_y: f64,
    pub selected_ids: Vec<Uuid>,
    pub selection_updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub joined_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Default)]
struct Inner {
    /// All sessions by connection id
    sessions: HashMap<Uuid, Session>,
    /// Connection ids per board
    boards: HashMap<Uuid, HashSet<Uuid>>,
}

/// Concurrent store of live sessions, indexed by connection and by board.
///
/// Interior locking gives per-call atomicity; there are no cross-key
/// transactions.
pub struct SessionRegistry {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    expiry: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), Duration::minutes(DEFAULT_EXPIRY_MINUTES))
    }

    pub fn with_clock(clock: Arc<dyn Clock>, expiry: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
            expiry,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic while holding it; the maps are
        // still structurally sound, so keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_fresh(&self, session: &Session, now: DateTime<Utc>) -> bool {
        session.active && now - session.joined_at < self.expiry
    }

    /// Create a session for a connection that just joined a board.
    ///
    /// Replaces any prior session for the same connection id.
    pub fn create_session(
        &self,
        connection_id: Uuid,
        board_id: Uuid,
        display_name: impl Into<String>,
    ) -> Session {
        let now = self.clock.now();
        let session = Session {
            connection_id,
            board_id,
            display_name: display_name.into(),
            cursor_x: 0.0,
            cursor_y: 0.0,
            selected_ids: Vec::new(),
            selection_updated_at: now,
            last_activity_at: now,
            joined_at: now,
            active: true,
        };

        let mut inner = self.lock();
        if let Some(previous) = inner.sessions.insert(connection_id, session.clone()) {
            if previous.board_id != board_id {
                if let Some(members) = inner.boards.get_mut(&previous.board_id) {
                    members.remove(&connection_id);
                }
            }
        }
        inner.boards.entry(board_id).or_default().insert(connection_id);
        session
    }

    pub fn session(&self, connection_id: Uuid) -> Option<Session> {
        self.lock().sessions.get(&connection_id).cloned()
    }

    /// Active, non-expired sessions on a board.
    ///
    /// Prunes expired entries from both indexes as a side effect.
    pub fn board_sessions(&self, board_id: Uuid) -> Vec<Session> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let Some(members) = inner.boards.get(&board_id) else {
            return Vec::new();
        };
        let member_ids: Vec<Uuid> = members.iter().copied().collect();

        let mut fresh = Vec::new();
        let mut stale = Vec::new();
        for id in member_ids {
            match inner.sessions.get(&id) {
                Some(session) if self.is_fresh(session, now) => fresh.push(session.clone()),
                _ => stale.push(id),
            }
        }
        for id in stale {
            inner.sessions.remove(&id);
            if let Some(members) = inner.boards.get_mut(&board_id) {
                members.remove(&id);
            }
        }
        fresh
    }

    /// Update cursor position and activity stamp; no-op if absent
    pub fn update_cursor(&self, connection_id: Uuid, x: f64, y: f64) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if let Some(session) = inner.sessions.get_mut(&connection_id) {
            session.cursor_x = x;
            session.cursor_y = y;
            session.last_activity_at = now;
        }
    }

    /// Replace the selection set; no-op if absent
    pub fn update_selection(&self, connection_id: Uuid, element_ids: Vec<Uuid>) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if let Some(session) = inner.sessions.get_mut(&connection_id) {
            session.selected_ids = element_ids;
            session.selection_updated_at = now;
            session.last_activity_at = now;
        }
    }

    pub fn clear_selection(&self, connection_id: Uuid) {
        self.update_selection(connection_id, Vec::new());
    }

    /// Remove a session from both indexes
    pub fn remove_session(&self, connection_id: Uuid) -> Option<Session> {
        let mut inner = self.lock();
        let session = inner.sessions.remove(&connection_id)?;
        if let Some(members) = inner.boards.get_mut(&session.board_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                inner.boards.remove(&session.board_id);
            }
        }
        Some(session)
    }

    /// True iff an active, non-expired session exists for this connection
    /// on this board
    pub fn is_member(&self, connection_id: Uuid, board_id: Uuid) -> bool {
        let now = self.clock.now();
        let inner = self.lock();
        inner
            .sessions
            .get(&connection_id)
            .map(|s| s.board_id == board_id && self.is_fresh(s, now))
            .unwrap_or(false)
    }
}
