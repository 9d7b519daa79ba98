//! Durable persistence of the canonical state.
//!
//! The record is a single JSON document stored as a named blob. Persistence
//! is best-effort: [`Store::load`], [`Store::save`] and [`Store::reset`] log
//! backend failures and carry on, leaving the in-memory state authoritative.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::StoreError;
use crate::migrate::{migrate_legacy, LegacyRecord};
use crate::models::CanonicalState;

/// Key of the current structured record.
pub const CURRENT_KEY: &str = "sw-watch-v2";
/// Key of the legacy flat record, read only for migration.
pub const LEGACY_KEY: &str = "sw-watch-v1";

const SCHEMA_V1: &str = include_str!("../../../migrations/001_kv_store.sql");

/// A named-blob store with replace-whole-value semantics.
pub trait Backend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// ── SQLite backend ──────────────────────────────────────────────

/// SQLite-backed blob storage.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))
    }
}

impl Backend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.conn()?
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn()?
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Run schema migrations using `PRAGMA user_version` for version tracking.
fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}

// ── In-memory backend ───────────────────────────────────────────

/// Process-local blob storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.blobs
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

impl Backend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.blobs()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.blobs()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.blobs()?.remove(key);
        Ok(())
    }
}

// ── Store ───────────────────────────────────────────────────────

/// Owner of the durable record: load, save, reset, import.
pub struct Store {
    backend: Box<dyn Backend>,
}

impl Store {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Open a SQLite-backed store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(SqliteBackend::open(path)?))
    }

    /// A store that keeps nothing past the process.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Read the current record, falling back to migrating the legacy one,
    /// falling back to the empty state. Never fails.
    pub fn load(&self, catalog: &Catalog) -> CanonicalState {
        if let Some(state) = self.read_blob(CURRENT_KEY).and_then(|raw| {
            parse_snapshot(&raw)
                .map_err(|e| warn!(error = %e, "Current record is corrupt, ignoring"))
                .ok()
        }) {
            debug!(keys = state.watched.len(), "Loaded current record");
            return state;
        }

        if let Some(record) = self.read_blob(LEGACY_KEY).and_then(|raw| parse_legacy(&raw)) {
            let state = migrate_legacy(&record, catalog);
            info!(
                legacy_keys = record.len(),
                watched = state.watched.len(),
                "Migrated legacy record"
            );
            self.save(&state);
            return state;
        }

        debug!("No stored progress, starting empty");
        CanonicalState::empty()
    }

    /// Replace the current record with `state`. Failures are logged only.
    pub fn save(&self, state: &CanonicalState) {
        if let Err(e) = self.try_save(state) {
            warn!(error = %e, "Failed to persist progress");
        }
    }

    /// Delete the current record. In-memory state is the caller's business.
    pub fn reset(&self) {
        match self.backend.remove(CURRENT_KEY) {
            Ok(()) => info!("Stored progress reset"),
            Err(e) => warn!(error = %e, "Failed to reset stored progress"),
        }
    }

    /// Validate and persist an exported snapshot, returning the new state.
    pub fn import_snapshot(&self, text: &str) -> Result<CanonicalState, StoreError> {
        let state = parse_snapshot(text)?;
        self.save(&state);
        info!(keys = state.watched.len(), "Imported snapshot");
        Ok(state)
    }

    fn try_save(&self, state: &CanonicalState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        self.backend.set(CURRENT_KEY, &json)
    }

    fn read_blob(&self, key: &str) -> Option<String> {
        self.backend
            .get(key)
            .map_err(|e| warn!(key, error = %e, "Storage read failed"))
            .ok()
            .flatten()
    }
}

/// Human-readable export of `state`. Round-trips through [`parse_snapshot`].
pub fn export_snapshot(state: &CanonicalState) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(state)?)
}

/// Parse a snapshot document. It must be an object with a `watched` object;
/// `movieMeta` and `seriesMeta` default to empty.
pub fn parse_snapshot(text: &str) -> Result<CanonicalState, StoreError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| StoreError::MalformedSnapshot(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| StoreError::MalformedSnapshot("expected a JSON object".into()))?;
    if !obj.get("watched").is_some_and(serde_json::Value::is_object) {
        return Err(StoreError::MalformedSnapshot(
            "missing `watched` object".into(),
        ));
    }
    serde_json::from_value(value).map_err(|e| StoreError::MalformedSnapshot(e.to_string()))
}

/// The legacy record is a flat object; only `true` values count.
fn parse_legacy(raw: &str) -> Option<LegacyRecord> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| warn!(error = %e, "Legacy record is corrupt, ignoring"))
        .ok()?;
    Some(
        map.into_iter()
            .filter(|(_, v)| v.as_bool() == Some(true))
            .map(|(k, _)| (k, true))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovieMeta, SeriesMeta};

    /// Backend that fails every call.
    struct BrokenBackend;

    impl Backend for BrokenBackend {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("disk on fire".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("quota exceeded".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk on fire".into()))
        }
    }

    fn sample_state() -> CanonicalState {
        let mut state = CanonicalState::empty();
        state.watched.set("movie:star-wars-a-new-hope-1977", true);
        state.watched.set("tv:42:S1:E1", true);
        state.movie_meta.insert(
            "star-wars-a-new-hope-1977".into(),
            MovieMeta {
                external_id: 11,
                runtime_minutes: 121,
                rating: 8.2,
                poster_ref: Some("/poster.jpg".into()),
                fetched_at: 1_700_000_000_000,
            },
        );
        state.series_meta.insert(
            "andor-2022".into(),
            SeriesMeta {
                external_id: 42,
                total_episodes: 24,
                checked_episodes: 1,
                total_runtime_minutes: 1100,
                poster_ref: None,
                fetched_at: 1_700_000_000_000,
            },
        );
        state
    }

    #[test]
    fn test_save_and_load() {
        let store = Store::new(SqliteBackend::open_memory().unwrap());
        let state = sample_state();
        store.save(&state);
        assert_eq!(store.load(&Catalog::builtin()), state);
    }

    #[test]
    fn test_load_empty() {
        let store = Store::in_memory();
        assert!(store.load(&Catalog::builtin()).is_empty());
    }

    #[test]
    fn test_reset_deletes_current_record() {
        let store = Store::in_memory();
        store.save(&sample_state());
        store.reset();
        assert!(store.load(&Catalog::builtin()).is_empty());
    }

    #[test]
    fn test_corrupt_current_record_falls_back_to_legacy() {
        let backend = MemoryBackend::new();
        backend.set(CURRENT_KEY, "{not json").unwrap();
        backend
            .set(LEGACY_KEY, r#"{"movie:andor-2022": true, "movie:x": false}"#)
            .unwrap();
        let store = Store::new(backend);

        let state = store.load(&Catalog::builtin());
        assert!(state.is_series_flagged("andor-2022"));
        assert_eq!(state.watched.len(), 1);
    }

    #[test]
    fn test_migration_is_persisted_once() {
        let backend = MemoryBackend::new();
        backend
            .set(
                LEGACY_KEY,
                r#"{
                    "movie:star-wars-a-new-hope-1977": true,
                    "series-meta:andor-2022:42:24:2:1700000000": true
                }"#,
            )
            .unwrap();
        let store = Store::new(backend);

        let migrated = store.load(&Catalog::builtin());
        assert_eq!(migrated.series_meta["andor-2022"].checked_episodes, 2);

        let raw = store.backend.get(CURRENT_KEY).unwrap().unwrap();
        assert_eq!(parse_snapshot(&raw).unwrap(), migrated);
        // Second load reads the current record, not the legacy one.
        assert_eq!(store.load(&Catalog::builtin()), migrated);
    }

    #[test]
    fn test_everything_corrupt_yields_empty() {
        let backend = MemoryBackend::new();
        backend.set(CURRENT_KEY, "[]").unwrap();
        backend.set(LEGACY_KEY, "42").unwrap();
        assert!(Store::new(backend).load(&Catalog::builtin()).is_empty());
    }

    #[test]
    fn test_broken_backend_never_fails() {
        let store = Store::new(BrokenBackend);
        store.save(&sample_state());
        store.reset();
        assert!(store.load(&Catalog::builtin()).is_empty());
    }

    #[test]
    fn test_export_import_roundtrip() {
        let store = Store::in_memory();
        let state = sample_state();
        let exported = export_snapshot(&state).unwrap();
        assert!(exported.contains('\n'), "export is pretty-printed");

        let imported = store.import_snapshot(&exported).unwrap();
        assert_eq!(imported, state);
        assert_eq!(store.load(&Catalog::builtin()), state);
    }

    #[test]
    fn test_import_defaults_missing_meta() {
        let store = Store::in_memory();
        let state = store
            .import_snapshot(r#"{"watched": {"movie:a": true}}"#)
            .unwrap();
        assert!(state.is_movie_watched("a"));
        assert!(state.movie_meta.is_empty());
        assert!(state.series_meta.is_empty());
    }

    #[test]
    fn test_import_rejects_bad_shapes() {
        let store = Store::in_memory();
        store.save(&sample_state());
        for bad in [
            "",
            "not json",
            "[]",
            r#"{"movieMeta": {}}"#,
            r#"{"watched": []}"#,
            r#"{"watched": {"movie:a": "yes"}}"#,
        ] {
            let err = store.import_snapshot(bad).unwrap_err();
            assert!(matches!(err, StoreError::MalformedSnapshot(_)), "{bad:?}");
        }
        // Failed imports leave the stored record alone.
        assert_eq!(store.load(&Catalog::builtin()), sample_state());
    }

    #[test]
    fn test_sqlite_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holocron.db");
        {
            let store = Store::open(&path).unwrap();
            store.save(&sample_state());
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.load(&Catalog::builtin()), sample_state());
    }
}
