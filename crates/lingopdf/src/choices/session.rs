//! Choice-session lifecycle: creation, status transitions, expiry sweep,
//! and the in-memory read cache.
//!
//! Expiration is a soft transition: an expired session rejects new writes
//! but its choices remain readable under the usual scope rules.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{LingoError, Result};

use super::store::UserChoiceStore;
use super::types::{ChoiceCounts, ChoiceSession, ChoiceType, SessionStatus};

/// Upper bound on cached sessions; old entries are evicted LRU-style.
const SESSION_CACHE_CAP: usize = 64;

/// Small LRU over active sessions. Invalidated wholesale on any write;
/// sessions are few and cheap to reload.
#[derive(Debug, Default)]
pub(crate) struct SessionCache {
    entries: HashMap<String, ChoiceSession>,
    order: Vec<String>,
}

impl SessionCache {
    pub(crate) fn get(&mut self, session_id: &str) -> Option<ChoiceSession> {
        let found = self.entries.get(session_id).cloned();
        if found.is_some() {
            self.touch(session_id);
        }
        found
    }

    pub(crate) fn put(&mut self, session: ChoiceSession) {
        let id = session.session_id.clone();
        self.entries.insert(id.clone(), session);
        self.touch(&id);
        while self.order.len() > SESSION_CACHE_CAP {
            let evicted = self.order.remove(0);
            self.entries.remove(&evicted);
        }
    }

    pub(crate) fn invalidate_all(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn touch(&mut self, session_id: &str) {
        self.order.retain(|id| id != session_id);
        self.order.push(session_id.to_string());
    }
}

impl UserChoiceStore {
    /// Open a new active session expiring after `ttl`.
    pub fn create_session(
        &self,
        name: &str,
        source_language: &str,
        target_language: &str,
        ttl: Duration,
    ) -> Result<ChoiceSession> {
        let now = Utc::now();
        let session = ChoiceSession {
            session_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            status: SessionStatus::Active,
            user_id: None,
            document_id: None,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            counts: ChoiceCounts::default(),
            consistency_score: 1.0,
            created_at: now,
            expires_at: now + ttl,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO choice_sessions
             (session_id, name, status, user_id, document_id, source_language, target_language,
              translate_count, preserve_count, custom_count, skip_count, consistency_score,
              created_at, expires_at)
             VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?5, 0, 0, 0, 0, 1.0, ?6, ?7)",
            params![
                session.session_id,
                session.name,
                session.status.as_str(),
                session.source_language,
                session.target_language,
                session.created_at.to_rfc3339(),
                session.expires_at.to_rfc3339(),
            ],
        )?;
        drop(conn);

        info!(session = %session.session_id, "created choice session");
        Ok(session)
    }

    /// Load a session, applying lazy expiry if its TTL has passed.
    pub fn get_session(&self, session_id: &str) -> Result<Option<ChoiceSession>> {
        if let Some(cached) = self.session_cache.lock().get(session_id)
            && !(cached.status == SessionStatus::Active && cached.expires_at <= Utc::now())
        {
            return Ok(Some(cached));
        }

        let conn = self.conn.lock();
        let session = load_session(&conn, session_id)?;
        let Some(mut session) = session else {
            return Ok(None);
        };

        if session.status == SessionStatus::Active && session.expires_at <= Utc::now() {
            set_session_status(&conn, session_id, SessionStatus::Expired)?;
            session.status = SessionStatus::Expired;
        }
        drop(conn);

        self.session_cache.lock().put(session.clone());
        Ok(Some(session))
    }

    /// Mark a session completed; no further writes are accepted.
    pub fn complete_session(&self, session_id: &str) -> Result<()> {
        self.transition_session(session_id, SessionStatus::Completed)
    }

    /// Pause a session; it can be resumed later.
    pub fn suspend_session(&self, session_id: &str) -> Result<()> {
        self.transition_session(session_id, SessionStatus::Suspended)
    }

    /// Reactivate a suspended session.
    pub fn resume_session(&self, session_id: &str) -> Result<()> {
        let session = self
            .get_session(session_id)?
            .ok_or_else(|| LingoError::NotFound {
                what: format!("session {session_id}"),
            })?;
        if session.status != SessionStatus::Suspended {
            return Err(LingoError::invalid_input(format!(
                "session {session_id} is {} and cannot be resumed",
                session.status.as_str()
            )));
        }
        self.transition_session(session_id, SessionStatus::Active)
    }

    fn transition_session(&self, session_id: &str, status: SessionStatus) -> Result<()> {
        let conn = self.conn.lock();
        let found = load_session(&conn, session_id)?;
        if found.is_none() {
            return Err(LingoError::NotFound {
                what: format!("session {session_id}"),
            });
        }
        set_session_status(&conn, session_id, status)?;
        drop(conn);
        self.session_cache.lock().invalidate_all();
        Ok(())
    }

    /// Sweep active sessions past their TTL into the EXPIRED state.
    /// Returns how many transitioned. Intended to run hourly.
    pub fn expire_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let expired = conn.execute(
            "UPDATE choice_sessions SET status = 'EXPIRED'
             WHERE status = 'ACTIVE' AND expires_at <= ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        drop(conn);
        if expired > 0 {
            self.session_cache.lock().invalidate_all();
            debug!(count = expired, "expired choice sessions");
        }
        Ok(expired)
    }

    /// Delete a session record. Choices referencing it stay behind:
    /// GLOBAL and CONTEXTUAL scopes outlive their session by design.
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM choice_sessions WHERE session_id = ?1",
            params![session_id],
        )?;
        drop(conn);
        if deleted == 0 {
            return Err(LingoError::NotFound {
                what: format!("session {session_id}"),
            });
        }
        self.session_cache.lock().invalidate_all();
        Ok(())
    }

    pub(crate) fn ensure_session_writable(&self, session_id: &str) -> Result<()> {
        let session = self
            .get_session(session_id)?
            .ok_or_else(|| LingoError::NotFound {
                what: format!("session {session_id}"),
            })?;
        if !session.status.accepts_writes() {
            return Err(LingoError::invalid_input(format!(
                "session {session_id} is {} and rejects new choices",
                session.status.as_str()
            )));
        }
        Ok(())
    }

    pub(crate) fn bump_session_count(
        &self,
        conn: &Connection,
        session_id: &str,
        choice_type: ChoiceType,
    ) -> Result<()> {
        let column = match choice_type {
            ChoiceType::Translate => "translate_count",
            ChoiceType::Preserve => "preserve_count",
            ChoiceType::Custom => "custom_count",
            ChoiceType::Skip => "skip_count",
        };
        conn.execute(
            &format!("UPDATE choice_sessions SET {column} = {column} + 1 WHERE session_id = ?1"),
            params![session_id],
        )?;
        Ok(())
    }
}

fn load_session(conn: &Connection, session_id: &str) -> Result<Option<ChoiceSession>> {
    fn parse_time(raw: String) -> Result<DateTime<Utc>> {
        raw.parse().map_err(|_| LingoError::Storage {
            message: format!("unparseable timestamp '{raw}' in store"),
        })
    }

    let row = conn
        .query_row(
            "SELECT session_id, name, status, user_id, document_id, source_language,
                    target_language, translate_count, preserve_count, custom_count, skip_count,
                    consistency_score, created_at, expires_at
             FROM choice_sessions WHERE session_id = ?1",
            params![session_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, i64>(10)?,
                    row.get::<_, f64>(11)?,
                    row.get::<_, String>(12)?,
                    row.get::<_, String>(13)?,
                ))
            },
        )
        .optional()?;

    let Some((
        session_id,
        name,
        status,
        user_id,
        document_id,
        source_language,
        target_language,
        translate_count,
        preserve_count,
        custom_count,
        skip_count,
        consistency_score,
        created_at,
        expires_at,
    )) = row
    else {
        return Ok(None);
    };

    Ok(Some(ChoiceSession {
        session_id,
        name,
        status: SessionStatus::parse(&status)?,
        user_id,
        document_id,
        source_language,
        target_language,
        counts: ChoiceCounts {
            translate: translate_count as u64,
            preserve: preserve_count as u64,
            custom: custom_count as u64,
            skip: skip_count as u64,
        },
        consistency_score,
        created_at: parse_time(created_at)?,
        expires_at: parse_time(expires_at)?,
    }))
}

fn set_session_status(conn: &Connection, session_id: &str, status: SessionStatus) -> Result<()> {
    conn.execute(
        "UPDATE choice_sessions SET status = ?2 WHERE session_id = ?1",
        params![session_id, status.as_str()],
    )?;
    Ok(())
}
