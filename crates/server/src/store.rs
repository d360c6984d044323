// In-memory session store.
//
// The single shared mutable resource in the server. Every operation takes
// the map lock exactly once, so each call observes a consistent snapshot
// and commits atomically; callers never hold partial state across awaits.

use chrono::{DateTime, Utc};
use codepair_common::language::Language;
use codepair_common::types::ParticipantInfo;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A participant's record inside a session.
///
/// Immutable once inserted; a re-join with the same participant id
/// replaces the whole record (the new connection supersedes the old
/// mapping, no state is merged).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Client-supplied stable identifier (survives reconnects).
    pub id: String,
    /// Transport connection currently representing this participant.
    pub connection_id: Uuid,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
}

/// One collaboration session: a shared buffer plus its participants.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub language: Language,
    pub code: String,
    pub participants: HashMap<String, Participant>,
}

/// Aggregate counters for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub session_count: usize,
    pub participant_count: usize,
}

/// Outcome of [`SessionStore::remove_participant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantRemoval {
    /// Participants left in the session after the removal.
    pub remaining: usize,
    /// True when the removal emptied the session and deleted it.
    pub session_deleted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    /// Create a session with a fresh id and the language's starter
    /// template. Never fails.
    pub async fn create(&self, language: Language) -> Session {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            created_at: now,
            last_activity_at: now,
            language,
            code: language.default_template().to_string(),
            participants: HashMap::new(),
        };

        let mut guard = self.sessions.write().await;
        guard.insert(session.id, session.clone());
        session
    }

    pub async fn get(&self, session_id: Uuid) -> Option<Session> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    pub async fn exists(&self, session_id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&session_id)
    }

    /// Refresh the activity timestamp; no-op when the session is absent.
    pub async fn touch(&self, session_id: Uuid) {
        let mut guard = self.sessions.write().await;
        if let Some(session) = guard.get_mut(&session_id) {
            session.last_activity_at = Utc::now();
        }
    }

    /// Replace the buffer verbatim (whole-value, last write wins).
    /// Returns false when the session is absent.
    pub async fn set_code(&self, session_id: Uuid, code: String) -> bool {
        let mut guard = self.sessions.write().await;
        match guard.get_mut(&session_id) {
            Some(session) => {
                session.code = code;
                session.last_activity_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Switch the language and reset the buffer to its starter template.
    /// This is a deliberate whole-buffer reset, not a merge: in-progress
    /// edits are discarded for every participant at once. Returns the
    /// reset code, or None when the session is absent.
    pub async fn set_language(&self, session_id: Uuid, language: Language) -> Option<String> {
        let mut guard = self.sessions.write().await;
        let session = guard.get_mut(&session_id)?;
        session.language = language;
        session.code = language.default_template().to_string();
        session.last_activity_at = Utc::now();
        Some(session.code.clone())
    }

    /// Insert or overwrite the participant entry for its id (idempotent
    /// re-join). Returns false when the session is absent.
    pub async fn add_participant(&self, session_id: Uuid, participant: Participant) -> bool {
        let mut guard = self.sessions.write().await;
        match guard.get_mut(&session_id) {
            Some(session) => {
                session.participants.insert(participant.id.clone(), participant);
                session.last_activity_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove a participant. When the session empties it is deleted in
    /// the same critical section — an empty session is never observable
    /// through [`get`](Self::get) or [`exists`](Self::exists).
    pub async fn remove_participant(
        &self,
        session_id: Uuid,
        participant_id: &str,
    ) -> Option<ParticipantRemoval> {
        let mut guard = self.sessions.write().await;
        let session = guard.get_mut(&session_id)?;
        session.participants.remove(participant_id)?;
        session.last_activity_at = Utc::now();

        let remaining = session.participants.len();
        let session_deleted = remaining == 0;
        if session_deleted {
            guard.remove(&session_id);
        }

        Some(ParticipantRemoval { remaining, session_deleted })
    }

    pub async fn count_participants(&self, session_id: Uuid) -> usize {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|session| session.participants.len())
            .unwrap_or(0)
    }

    /// Participants in join order. Connection ids are not exposed.
    pub async fn list_participants(&self, session_id: Uuid) -> Vec<ParticipantInfo> {
        let guard = self.sessions.read().await;
        let Some(session) = guard.get(&session_id) else {
            return Vec::new();
        };

        let mut entries: Vec<&Participant> = session.participants.values().collect();
        entries.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
        entries
            .into_iter()
            .map(|p| ParticipantInfo { id: p.id.clone(), display_name: p.display_name.clone() })
            .collect()
    }

    /// Unconditional removal. Returns whether the session existed.
    pub async fn delete(&self, session_id: Uuid) -> bool {
        self.sessions.write().await.remove(&session_id).is_some()
    }

    /// Resolve a transport connection to its (session, participant).
    ///
    /// Linear scan over all sessions; the first match wins. A connection
    /// maps to at most one participant, so at most one match exists
    /// unless that invariant has already been violated elsewhere.
    pub async fn find_by_connection(&self, connection_id: Uuid) -> Option<(Uuid, String)> {
        let guard = self.sessions.read().await;
        for (session_id, session) in guard.iter() {
            for participant in session.participants.values() {
                if participant.connection_id == connection_id {
                    return Some((*session_id, participant.id.clone()));
                }
            }
        }
        None
    }

    pub async fn stats(&self) -> StoreStats {
        let guard = self.sessions.read().await;
        StoreStats {
            session_count: guard.len(),
            participant_count: guard.values().map(|s| s.participants.len()).sum(),
        }
    }

    /// Delete every session idle past `idle_timeout` or older than
    /// `max_age`, returning the evicted ids. Single pass over the map,
    /// one critical section; a session that trips either bound cannot
    /// keep the scan from finishing.
    pub async fn evict_expired(&self, idle_timeout: Duration, max_age: Duration) -> Vec<Uuid> {
        let now = Utc::now();
        let mut guard = self.sessions.write().await;

        let expired: Vec<Uuid> = guard
            .iter()
            .filter(|(_, session)| {
                exceeds(now, session.last_activity_at, idle_timeout)
                    || exceeds(now, session.created_at, max_age)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            guard.remove(id);
        }
        expired
    }

    #[cfg(test)]
    pub(crate) async fn backdate_for_tests(
        &self,
        session_id: Uuid,
        created_ago: Duration,
        idle_ago: Duration,
    ) {
        let now = Utc::now();
        let mut guard = self.sessions.write().await;
        if let Some(session) = guard.get_mut(&session_id) {
            session.created_at = now - chrono::Duration::from_std(created_ago).unwrap();
            session.last_activity_at = now - chrono::Duration::from_std(idle_ago).unwrap();
        }
    }
}

/// True when `since` lies further than `threshold` in the past. A clock
/// that runs backwards yields a negative elapsed time, which never trips
/// the threshold.
fn exceeds(now: DateTime<Utc>, since: DateTime<Utc>, threshold: Duration) -> bool {
    (now - since).to_std().map(|elapsed| elapsed > threshold).unwrap_or(false)
}
