//! SQLite-backed location storage.
//!
//! Owns the single "auto" location record (order id 0), the cached weather
//! rows keyed to it, and the acquisition retry state. The orchestrator is
//! the only writer of the auto record; the mutex here only makes the
//! connection shareable across tasks, it is not what enforces the
//! single-writer invariant.

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::status::SourceStatus;

/// The single persisted "current position" entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoLocationRecord {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f32,
    pub last_update_ms: i64,
    pub source: SourceStatus,
    pub address: Option<String>,
}

/// Retry state persisted across process restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub by_last_location_only: bool,
    pub attempts: u32,
}

/// Local SQLite storage for the auto location, weather cache and retry state.
pub struct LocationStore {
    conn: Mutex<Connection>,
}

impl LocationStore {
    /// Open or create the database at the given path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open location database")?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the schema and seed the auto location row (order id 0).
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL UNIQUE,
                latitude REAL NOT NULL DEFAULT 0,
                longitude REAL NOT NULL DEFAULT 0,
                accuracy REAL NOT NULL DEFAULT 0,
                last_update_ms INTEGER NOT NULL DEFAULT 0,
                source TEXT NOT NULL DEFAULT 'update_started',
                address TEXT
            );

            CREATE TABLE IF NOT EXISTS current_weather (
                location_id INTEGER NOT NULL,
                payload TEXT NOT NULL,
                fetched_ms INTEGER NOT NULL,
                FOREIGN KEY (location_id) REFERENCES locations(id)
            );

            CREATE TABLE IF NOT EXISTS weather_forecast (
                location_id INTEGER NOT NULL,
                payload TEXT NOT NULL,
                fetched_ms INTEGER NOT NULL,
                FOREIGN KEY (location_id) REFERENCES locations(id)
            );

            CREATE TABLE IF NOT EXISTS retry_state (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                by_last_location_only INTEGER NOT NULL,
                attempts INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_current_weather_location
                ON current_weather(location_id);
            CREATE INDEX IF NOT EXISTS idx_weather_forecast_location
                ON weather_forecast(location_id);",
        )
        .context("Failed to initialize schema")?;

        conn.execute(
            "INSERT OR IGNORE INTO locations (order_id) VALUES (0)",
            [],
        )
        .context("Failed to seed auto location")?;
        Ok(())
    }

    /// Fetch the auto location record (order id 0).
    ///
    /// # Errors
    /// Returns an error on query failure or if the stored source tag does
    /// not parse.
    pub fn auto_location(&self) -> Result<AutoLocationRecord> {
        let conn = self.conn.lock();
        let (id, latitude, longitude, accuracy, last_update_ms, source, address): (
            i64,
            f64,
            f64,
            f64,
            i64,
            String,
            Option<String>,
        ) = conn
            .query_row(
                "SELECT id, latitude, longitude, accuracy, last_update_ms, source, address
                 FROM locations WHERE order_id = 0",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .context("Failed to read auto location")?;

        let source: SourceStatus = source
            .parse()
            .map_err(|e| anyhow!("corrupt source tag: {e}"))?;

        Ok(AutoLocationRecord {
            id,
            latitude,
            longitude,
            accuracy: accuracy as f32,
            last_update_ms,
            source,
            address,
        })
    }

    /// Update only the source status of a location.
    ///
    /// # Errors
    /// Returns an error on update failure.
    pub fn update_location_source(&self, id: i64, source: SourceStatus) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE locations SET source = ?1 WHERE id = ?2",
            params![source.to_string(), id],
        )
        .context("Failed to update location source")?;
        Ok(())
    }

    /// Write-through update of the auto location coordinates.
    ///
    /// # Errors
    /// Returns an error on update failure.
    pub fn update_auto_location_geo(
        &self,
        latitude: f64,
        longitude: f64,
        source: SourceStatus,
        accuracy: f32,
        timestamp_ms: i64,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE locations
             SET latitude = ?1, longitude = ?2, source = ?3, accuracy = ?4, last_update_ms = ?5
             WHERE order_id = 0",
            params![latitude, longitude, source.to_string(), f64::from(accuracy), timestamp_ms],
        )
        .context("Failed to update auto location")?;
        tracing::debug!(latitude, longitude, %source, "Updated auto location");
        Ok(())
    }

    /// Attach a resolved address to a location. Best-effort enrichment; the
    /// location counts as resolved before the address lands.
    ///
    /// # Errors
    /// Returns an error on update failure.
    pub fn update_auto_location_address(&self, id: i64, address: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE locations SET address = ?1 WHERE id = ?2",
            params![address, id],
        )
        .context("Failed to update location address")?;
        Ok(())
    }

    /// Timestamp of the last successful auto location update, 0 if never.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn last_update_location_time(&self) -> Result<i64> {
        let conn = self.conn.lock();
        let ts: i64 = conn
            .query_row(
                "SELECT last_update_ms FROM locations WHERE order_id = 0",
                [],
                |row| row.get(0),
            )
            .context("Failed to read last update time")?;
        Ok(ts)
    }

    /// Store a current-weather payload for a location.
    ///
    /// # Errors
    /// Returns an error on insert failure.
    pub fn put_current_weather(&self, location_id: i64, payload: &str, fetched_ms: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO current_weather (location_id, payload, fetched_ms) VALUES (?1, ?2, ?3)",
            params![location_id, payload, fetched_ms],
        )
        .context("Failed to store current weather")?;
        Ok(())
    }

    /// Store a forecast payload for a location.
    ///
    /// # Errors
    /// Returns an error on insert failure.
    pub fn put_forecast(&self, location_id: i64, payload: &str, fetched_ms: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO weather_forecast (location_id, payload, fetched_ms) VALUES (?1, ?2, ?3)",
            params![location_id, payload, fetched_ms],
        )
        .context("Failed to store forecast")?;
        Ok(())
    }

    /// Most recent current-weather payload for a location, if any.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn current_weather(&self, location_id: i64) -> Result<Option<(String, i64)>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT payload, fetched_ms FROM current_weather
                 WHERE location_id = ?1 ORDER BY fetched_ms DESC LIMIT 1",
                params![location_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to read current weather")?;
        Ok(row)
    }

    /// Most recent forecast payload for a location, if any.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn forecast(&self, location_id: i64) -> Result<Option<(String, i64)>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT payload, fetched_ms FROM weather_forecast
                 WHERE location_id = ?1 ORDER BY fetched_ms DESC LIMIT 1",
                params![location_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to read forecast")?;
        Ok(row)
    }

    /// Delete all cached weather and forecast rows for a location. Used when
    /// the device moved far enough that the cached data is semantically wrong.
    ///
    /// # Errors
    /// Returns an error on delete failure.
    pub fn delete_weather_records_for(&self, location_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM current_weather WHERE location_id = ?1",
            params![location_id],
        )
        .context("Failed to delete current weather")?;
        conn.execute(
            "DELETE FROM weather_forecast WHERE location_id = ?1",
            params![location_id],
        )
        .context("Failed to delete forecast")?;
        tracing::debug!(location_id, "Deleted cached weather records");
        Ok(())
    }

    /// Persist the retry state; overwrites any previous one.
    ///
    /// # Errors
    /// Returns an error on insert failure.
    pub fn save_retry_state(&self, state: RetryState) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO retry_state (id, by_last_location_only, attempts)
             VALUES (0, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                 by_last_location_only = excluded.by_last_location_only,
                 attempts = excluded.attempts",
            params![state.by_last_location_only, state.attempts],
        )
        .context("Failed to save retry state")?;
        tracing::debug!(attempts = state.attempts, "Saved retry state");
        Ok(())
    }

    /// Read the persisted retry state, if any.
    ///
    /// # Errors
    /// Returns an error on query failure.
    pub fn load_retry_state(&self) -> Result<Option<RetryState>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT by_last_location_only, attempts FROM retry_state WHERE id = 0",
                [],
                |row| {
                    Ok(RetryState {
                        by_last_location_only: row.get(0)?,
                        attempts: row.get::<_, i64>(1)? as u32,
                    })
                },
            )
            .optional()
            .context("Failed to read retry state")?;
        Ok(row)
    }

    /// Drop the persisted retry state.
    ///
    /// # Errors
    /// Returns an error on delete failure.
    pub fn clear_retry_state(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM retry_state WHERE id = 0", [])
            .context("Failed to clear retry state")?;
        Ok(())
    }
}
