//! Durable, context-aware store of user translation decisions.
//!
//! Backed by an embedded sqlite database with three tables:
//! `user_choices`, `choice_sessions`, and `choice_conflicts`. Writes
//! serialize through a connection mutex; session reads go through a small
//! in-memory cache that is invalidated on write.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;
use uuid::Uuid;

use crate::core::config::ChoiceConfig;
use crate::{LingoError, Result};

use super::context::TranslationContext;
use super::session::SessionCache;
use super::types::{ChoiceScope, ChoiceType, UserChoice};

/// Contexts at or above this similarity participate in fallback lookups.
pub(crate) const SIMILARITY_THRESHOLD: f64 = 0.8;
/// Fallback candidates need at least this success rate.
const MIN_FALLBACK_SUCCESS_RATE: f64 = 0.5;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS user_choices (
    choice_id          TEXT PRIMARY KEY,
    term               TEXT NOT NULL,
    choice_type        TEXT NOT NULL,
    translation_result TEXT,
    context_json       TEXT NOT NULL,
    context_hash       TEXT NOT NULL,
    scope              TEXT NOT NULL,
    confidence_level   REAL NOT NULL DEFAULT 0.8,
    usage_count        INTEGER NOT NULL DEFAULT 0,
    success_rate       REAL NOT NULL DEFAULT 0.5,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    last_used_at       TEXT,
    session_id         TEXT,
    document_id        TEXT
);
CREATE INDEX IF NOT EXISTS idx_choices_term ON user_choices (term);
CREATE INDEX IF NOT EXISTS idx_choices_hash ON user_choices (term, context_hash);

CREATE TABLE IF NOT EXISTS choice_sessions (
    session_id        TEXT PRIMARY KEY,
    name              TEXT NOT NULL,
    status            TEXT NOT NULL,
    user_id           TEXT,
    document_id       TEXT,
    source_language   TEXT NOT NULL,
    target_language   TEXT NOT NULL,
    translate_count   INTEGER NOT NULL DEFAULT 0,
    preserve_count    INTEGER NOT NULL DEFAULT 0,
    custom_count      INTEGER NOT NULL DEFAULT 0,
    skip_count        INTEGER NOT NULL DEFAULT 0,
    consistency_score REAL NOT NULL DEFAULT 1.0,
    created_at        TEXT NOT NULL,
    expires_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS choice_conflicts (
    conflict_id      TEXT PRIMARY KEY,
    term             TEXT NOT NULL,
    first_choice_id  TEXT NOT NULL,
    second_choice_id TEXT NOT NULL,
    similarity       REAL NOT NULL,
    resolved         INTEGER NOT NULL DEFAULT 0,
    resolution       TEXT,
    detected_at      TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_conflicts_pair
    ON choice_conflicts (first_choice_id, second_choice_id);
";

/// Parameters for a new or updated choice.
#[derive(Debug, Clone)]
pub struct NewChoice {
    pub term: String,
    pub choice_type: ChoiceType,
    pub translation_result: Option<String>,
    pub context: TranslationContext,
    pub scope: ChoiceScope,
    pub session_id: Option<String>,
    pub document_id: Option<String>,
    pub confidence_level: f64,
}

impl NewChoice {
    pub fn new(term: impl Into<String>, choice_type: ChoiceType, scope: ChoiceScope) -> Self {
        Self {
            term: term.into(),
            choice_type,
            translation_result: None,
            context: TranslationContext::default(),
            scope,
            session_id: None,
            document_id: None,
            confidence_level: 0.8,
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.translation_result = Some(result.into());
        self
    }

    pub fn with_context(mut self, context: TranslationContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Lookup seam used by the layout-aware translator; lets tests substitute
/// an in-memory table for the sqlite store.
pub trait ChoiceLookup: Send + Sync {
    fn lookup(
        &self,
        term: &str,
        context: &TranslationContext,
        session_id: Option<&str>,
    ) -> Result<Option<UserChoice>>;
}

/// The sqlite-backed store.
pub struct UserChoiceStore {
    pub(crate) conn: Mutex<Connection>,
    pub(crate) config: ChoiceConfig,
    pub(crate) session_cache: Mutex<SessionCache>,
}

impl UserChoiceStore {
    /// Open (or create) the store at the configured path.
    pub fn open(config: ChoiceConfig) -> Result<Self> {
        let conn = Connection::open(&config.db_path)?;
        Self::with_connection(conn, config)
    }

    /// Volatile store for tests and dry runs.
    pub fn open_in_memory(config: ChoiceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, config)
    }

    fn with_connection(conn: Connection, config: ChoiceConfig) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            config,
            session_cache: Mutex::new(SessionCache::default()),
        })
    }

    /// Record a decision, upserting by (term, context hash, scope,
    /// session). Writes to expired or closed sessions are rejected.
    pub fn make_choice(&self, new: NewChoice) -> Result<UserChoice> {
        if let Some(session_id) = new.session_id.as_deref() {
            self.ensure_session_writable(session_id)?;
        }

        let now = Utc::now();
        let context_hash = new.context.context_hash();
        let mut choice = UserChoice {
            choice_id: Uuid::new_v4().to_string(),
            term: new.term,
            choice_type: new.choice_type,
            translation_result: new.translation_result,
            context: new.context,
            scope: new.scope,
            confidence_level: new.confidence_level,
            usage_count: 0,
            success_rate: 0.5,
            created_at: now,
            updated_at: now,
            last_used_at: None,
            session_id: new.session_id,
            document_id: new.document_id,
        };
        choice.validate()?;

        let conn = self.conn.lock();

        let existing: Option<(String, u64, f64, String)> = conn
            .query_row(
                "SELECT choice_id, usage_count, success_rate, created_at FROM user_choices
                 WHERE term = ?1 AND context_hash = ?2 AND scope = ?3
                   AND COALESCE(session_id, '') = COALESCE(?4, '')",
                params![choice.term, context_hash, choice.scope.as_str(), choice.session_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get::<_, i64>(1)? as u64,
                        row.get(2)?,
                        row.get(3)?,
                    ))
                },
            )
            .optional()?;

        if let Some((choice_id, usage_count, success_rate, created_at)) = existing {
            // Upsert keeps the identity and usage history of the record.
            choice.choice_id = choice_id;
            choice.usage_count = usage_count;
            choice.success_rate = success_rate;
            choice.created_at = created_at.parse().map_err(|_| {
                LingoError::Storage {
                    message: "unparseable created_at in store".to_string(),
                }
            })?;
            conn.execute(
                "UPDATE user_choices
                 SET choice_type = ?2, translation_result = ?3, context_json = ?4,
                     confidence_level = ?5, updated_at = ?6, document_id = ?7
                 WHERE choice_id = ?1",
                params![
                    choice.choice_id,
                    choice.choice_type.as_str(),
                    choice.translation_result,
                    serde_json::to_string(&choice.context)?,
                    choice.confidence_level,
                    choice.updated_at.to_rfc3339(),
                    choice.document_id,
                ],
            )?;
        } else {
            conn.execute(
                "INSERT INTO user_choices
                 (choice_id, term, choice_type, translation_result, context_json, context_hash,
                  scope, confidence_level, usage_count, success_rate, created_at, updated_at,
                  last_used_at, session_id, document_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL, ?13, ?14)",
                params![
                    choice.choice_id,
                    choice.term,
                    choice.choice_type.as_str(),
                    choice.translation_result,
                    serde_json::to_string(&choice.context)?,
                    context_hash,
                    choice.scope.as_str(),
                    choice.confidence_level,
                    choice.usage_count as i64,
                    choice.success_rate,
                    choice.created_at.to_rfc3339(),
                    choice.updated_at.to_rfc3339(),
                    choice.session_id,
                    choice.document_id,
                ],
            )?;
        }

        if let Some(session_id) = choice.session_id.as_deref() {
            self.bump_session_count(&conn, session_id, choice.choice_type)?;
        }
        drop(conn);
        self.session_cache.lock().invalidate_all();

        debug!(term = %choice.term, scope = choice.scope.as_str(), "recorded user choice");
        Ok(choice)
    }

    /// Best-match retrieval: exact context hash first (scope precedence
    /// SESSION > DOCUMENT > CONTEXTUAL > GLOBAL), then nearest similar
    /// CONTEXTUAL choice with a usable success rate.
    pub fn get_choice(
        &self,
        term: &str,
        context: &TranslationContext,
        session_id: Option<&str>,
    ) -> Result<Option<UserChoice>> {
        let candidates = self.choices_for_term(term)?;
        let hash = context.context_hash();

        let exact = candidates
            .iter()
            .filter(|c| c.context.context_hash() == hash)
            .filter(|c| match c.scope {
                ChoiceScope::Session => c.session_id.as_deref() == session_id,
                _ => true,
            })
            .max_by(|a, b| {
                a.scope
                    .precedence()
                    .cmp(&b.scope.precedence())
                    .then(a.updated_at.cmp(&b.updated_at))
            });
        if let Some(choice) = exact {
            return Ok(Some(choice.clone()));
        }

        let best_similar = candidates
            .iter()
            .filter(|c| c.scope == ChoiceScope::Contextual)
            .filter(|c| c.success_rate >= MIN_FALLBACK_SUCCESS_RATE)
            .filter_map(|c| {
                let similarity = context.similarity(&c.context);
                (similarity >= SIMILARITY_THRESHOLD).then_some((c, similarity))
            })
            .max_by(|(a, sim_a), (b, sim_b)| {
                let score_a = sim_a * a.success_rate;
                let score_b = sim_b * b.success_rate;
                score_a.total_cmp(&score_b)
            });

        Ok(best_similar.map(|(c, _)| c.clone()))
    }

    /// Update a choice's moving success average after it was applied.
    pub fn record_usage(&self, choice_id: &str, success: bool) -> Result<()> {
        let alpha = self.config.success_rate_alpha;
        let conn = self.conn.lock();
        let current: Option<f64> = conn
            .query_row(
                "SELECT success_rate FROM user_choices WHERE choice_id = ?1",
                params![choice_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(success_rate) = current else {
            return Err(LingoError::NotFound {
                what: format!("choice {choice_id}"),
            });
        };

        let outcome = if success { 1.0 } else { 0.0 };
        let updated = ((1.0 - alpha) * success_rate + alpha * outcome).clamp(0.0, 1.0);
        conn.execute(
            "UPDATE user_choices
             SET success_rate = ?2, usage_count = usage_count + 1, last_used_at = ?3
             WHERE choice_id = ?1",
            params![choice_id, updated, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// All choices for one term, newest first.
    pub fn choices_for_term(&self, term: &str) -> Result<Vec<UserChoice>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT choice_id, term, choice_type, translation_result, context_json, scope,
                    confidence_level, usage_count, success_rate, created_at, updated_at,
                    last_used_at, session_id, document_id
             FROM user_choices WHERE term = ?1 ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map(params![term], row_to_choice)?;
        let mut choices = Vec::new();
        for row in rows {
            choices.push(row??);
        }
        Ok(choices)
    }

    /// Serialize choices (optionally one session's) as JSON.
    pub fn export(&self, session_id: Option<&str>) -> Result<Vec<u8>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT choice_id, term, choice_type, translation_result, context_json, scope,
                    confidence_level, usage_count, success_rate, created_at, updated_at,
                    last_used_at, session_id, document_id
             FROM user_choices
             WHERE ?1 IS NULL OR session_id = ?1
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_choice)?;
        let mut choices = Vec::new();
        for row in rows {
            choices.push(row??);
        }
        Ok(serde_json::to_vec_pretty(&choices)?)
    }

    /// Import previously exported choices. Idempotent by `choice_id`:
    /// records already present are skipped; the return value counts the
    /// newly inserted ones. Every record is validated before insertion.
    pub fn import(&self, bytes: &[u8], session_id: Option<&str>) -> Result<usize> {
        let mut choices: Vec<UserChoice> = serde_json::from_slice(bytes)?;
        for choice in &mut choices {
            if let Some(session_id) = session_id {
                choice.session_id = Some(session_id.to_string());
            }
            choice.validate()?;
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0usize;
        for choice in &choices {
            let changed = tx.execute(
                "INSERT OR IGNORE INTO user_choices
                 (choice_id, term, choice_type, translation_result, context_json, context_hash,
                  scope, confidence_level, usage_count, success_rate, created_at, updated_at,
                  last_used_at, session_id, document_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    choice.choice_id,
                    choice.term,
                    choice.choice_type.as_str(),
                    choice.translation_result,
                    serde_json::to_string(&choice.context)?,
                    choice.context.context_hash(),
                    choice.scope.as_str(),
                    choice.confidence_level,
                    choice.usage_count as i64,
                    choice.success_rate,
                    choice.created_at.to_rfc3339(),
                    choice.updated_at.to_rfc3339(),
                    choice.last_used_at.map(|t| t.to_rfc3339()),
                    choice.session_id,
                    choice.document_id,
                ],
            )?;
            inserted += changed;
        }
        tx.commit()?;
        drop(conn);
        self.session_cache.lock().invalidate_all();
        Ok(inserted)
    }

    /// Seed a document-level terminology map as GLOBAL custom choices.
    pub fn bootstrap_terminology<'a, I>(
        &self,
        entries: I,
        source_language: &str,
        target_language: &str,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut count = 0usize;
        for (term, translation) in entries {
            let context = TranslationContext {
                source_language: source_language.to_string(),
                target_language: target_language.to_string(),
                ..Default::default()
            };
            self.make_choice(
                NewChoice::new(term, ChoiceType::Custom, ChoiceScope::Global)
                    .with_result(translation)
                    .with_context(context),
            )?;
            count += 1;
        }
        Ok(count)
    }
}

impl ChoiceLookup for UserChoiceStore {
    fn lookup(
        &self,
        term: &str,
        context: &TranslationContext,
        session_id: Option<&str>,
    ) -> Result<Option<UserChoice>> {
        self.get_choice(term, context, session_id)
    }
}

fn row_to_choice(row: &rusqlite::Row<'_>) -> std::result::Result<Result<UserChoice>, rusqlite::Error> {
    fn parse_time(raw: String) -> Result<chrono::DateTime<Utc>> {
        raw.parse().map_err(|_| LingoError::Storage {
            message: format!("unparseable timestamp '{raw}' in store"),
        })
    }

    let choice_type: String = row.get(2)?;
    let context_json: String = row.get(4)?;
    let scope: String = row.get(5)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    let last_used_at: Option<String> = row.get(11)?;

    let built = (|| {
        Ok(UserChoice {
            choice_id: row_get_string(row, 0),
            term: row_get_string(row, 1),
            choice_type: ChoiceType::parse(&choice_type)?,
            translation_result: row.get(3).unwrap_or(None),
            context: serde_json::from_str(&context_json)?,
            scope: ChoiceScope::parse(&scope)?,
            confidence_level: row.get(6).unwrap_or(0.8),
            usage_count: row.get::<_, i64>(7).unwrap_or(0) as u64,
            success_rate: row.get(8).unwrap_or(0.5),
            created_at: parse_time(created_at)?,
            updated_at: parse_time(updated_at)?,
            last_used_at: match last_used_at {
                Some(raw) => Some(parse_time(raw)?),
                None => None,
            },
            session_id: row.get(12).unwrap_or(None),
            document_id: row.get(13).unwrap_or(None),
        })
    })();
    Ok(built)
}

fn row_get_string(row: &rusqlite::Row<'_>, index: usize) -> String {
    row.get(index).unwrap_or_default()
}
