//! Snooze lifecycle: apply an override, remember the original value, and
//! write it back once the snooze expires.
//!
//! The registry owns both collaborators. Every record it holds corresponds to
//! a key whose live value is the snoozed value, until a sweep, `clear` or
//! teardown restores it.

use crate::snooze::error::{SnoozeError, SnoozeResult};
use crate::snooze::persistence::DurableStore;
use crate::snooze::protocol::{SnoozeEntry, SnoozeRecord};
use crate::snooze::settings::ConfigStore;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Durable blob holding the persisted record list
pub const STATE_BLOB_KEY: &str = "snoozedSettings";

/// Upper bound on a single snooze (100 years), keeps expiry arithmetic in range
pub const MAX_DURATION_MINUTES: i64 = 100 * 365 * 24 * 60;

/// Parse user-entered JSON text into a setting value
pub fn parse_value(text: &str) -> SnoozeResult<Value> {
    serde_json::from_str(text).map_err(|e| SnoozeError::InvalidValue(e.to_string()))
}

/// Parse a user-entered duration in whole minutes
pub fn parse_duration(text: &str) -> SnoozeResult<i64> {
    let trimmed = text.trim();
    let minutes: i64 = trimmed
        .parse()
        .map_err(|_| SnoozeError::InvalidDuration(format!("'{}' is not a number", trimmed)))?;
    validate_duration(minutes)?;
    Ok(minutes)
}

fn validate_duration(minutes: i64) -> SnoozeResult<()> {
    if minutes <= 0 {
        return Err(SnoozeError::InvalidDuration(format!(
            "{} must be a positive number of minutes",
            minutes
        )));
    }
    if minutes > MAX_DURATION_MINUTES {
        return Err(SnoozeError::InvalidDuration(format!(
            "{} minutes exceeds the maximum of {}",
            minutes, MAX_DURATION_MINUTES
        )));
    }
    Ok(())
}

/// Outcome of [`SnoozeRegistry::load`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Records kept and re-asserted on the live store
    pub reapplied: Vec<SnoozeRecord>,
    /// Keys whose records had already expired; their live value was left as is
    pub dropped: Vec<String>,
}

/// Pending overrides keyed by setting
pub struct SnoozeRegistry<C, D> {
    entries: HashMap<String, SnoozeRecord>,
    config: C,
    durable: D,
}

impl<C: ConfigStore, D: DurableStore> SnoozeRegistry<C, D> {
    /// Empty registry; call [`load`](Self::load) to pick up persisted state
    pub fn new(config: C, durable: D) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            durable,
        }
    }

    /// Override `key` with `new_value` for `duration_minutes`.
    ///
    /// Validation happens before anything is written. Replaces any existing
    /// snooze on the same key; the original value is re-captured from the
    /// live store.
    pub fn snooze(
        &mut self,
        key: &str,
        new_value: Value,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> SnoozeResult<SnoozeRecord> {
        let original_value = self
            .config
            .get(key)?
            .ok_or_else(|| SnoozeError::UnknownKey(key.to_string()))?;
        validate_duration(duration_minutes)?;

        let record = SnoozeRecord::new(
            key.to_string(),
            original_value,
            new_value,
            now,
            duration_minutes,
        );

        self.config.set(&record.key, &record.snoozed_value)?;
        if let Some(previous) = self.entries.insert(record.key.clone(), record.clone()) {
            log::debug!(
                "Replaced snooze on {} (discarding original {})",
                previous.key,
                previous.original_value
            );
        }
        self.save()?;

        log::info!(
            "Snoozed {} = {} until {}",
            record.key,
            record.snoozed_value,
            record.expires_at
        );
        Ok(record)
    }

    /// [`snooze`](Self::snooze) with the value still as JSON text
    pub fn snooze_text(
        &mut self,
        key: &str,
        value_text: &str,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> SnoozeResult<SnoozeRecord> {
        let value = parse_value(value_text)?;
        self.snooze(key, value, duration_minutes, now)
    }

    /// Write the record's original value back. Leaves `entries` alone.
    pub fn restore(&mut self, record: &SnoozeRecord) -> SnoozeResult<()> {
        self.config.set(&record.key, &record.original_value)?;
        log::info!("Restored {} = {}", record.key, record.original_value);
        Ok(())
    }

    /// Restore and drop every record that expired at or before `now`.
    ///
    /// Returns the removed keys, sorted. Persists only when something expired.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> SnoozeResult<Vec<String>> {
        let mut expired: Vec<SnoozeRecord> = self
            .entries
            .values()
            .filter(|record| record.is_expired(now))
            .cloned()
            .collect();
        expired.sort_by(|a, b| a.key.cmp(&b.key));

        self.restore_and_remove(expired)
    }

    /// Active snoozes with their remaining time, soonest expiry first
    pub fn list(&self, now: DateTime<Utc>) -> impl Iterator<Item = SnoozeEntry> + '_ {
        let mut records: Vec<&SnoozeRecord> = self.entries.values().collect();
        records.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then(a.key.cmp(&b.key)));

        records.into_iter().map(move |record| SnoozeEntry {
            key: record.key.clone(),
            snoozed_value: record.snoozed_value.clone(),
            minutes_remaining: record.minutes_remaining(now),
        })
    }

    /// Restore everything and forget it. Callers confirm with the user first.
    pub fn clear(&mut self) -> SnoozeResult<Vec<String>> {
        let mut records: Vec<SnoozeRecord> = self.entries.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));

        let restored = self.restore_and_remove(records)?;
        if restored.is_empty() {
            self.save()?;
        }

        Ok(restored)
    }

    /// Restore `records` in order, dropping each from `entries` once its
    /// original value is back. On a failed restore the records handled so
    /// far stay removed and are persisted before the error is returned.
    fn restore_and_remove(&mut self, records: Vec<SnoozeRecord>) -> SnoozeResult<Vec<String>> {
        let mut removed = Vec::with_capacity(records.len());

        for record in records {
            if let Err(e) = self.restore(&record) {
                if !removed.is_empty() {
                    if let Err(save_err) = self.save() {
                        log::error!("Failed to persist partial restore: {}", save_err);
                    }
                }
                return Err(e);
            }
            self.entries.remove(&record.key);
            removed.push(record.key);
        }

        if !removed.is_empty() {
            self.save()?;
        }
        Ok(removed)
    }

    /// Replace `entries` with the persisted list.
    ///
    /// Records already expired at `now` are dropped without restoring; the
    /// rest have their snoozed value re-applied, since the live store may
    /// have been reset while the process was down.
    pub fn load(&mut self, now: DateTime<Utc>) -> SnoozeResult<LoadReport> {
        let stored: Vec<SnoozeRecord> = self.durable.get(STATE_BLOB_KEY, Vec::new())?;
        self.entries.clear();

        let mut report = LoadReport::default();
        for record in stored {
            if record.is_expired(now) {
                log::warn!(
                    "Dropping expired snooze on {} (expired {}); live value left unchanged",
                    record.key,
                    record.expires_at
                );
                report.dropped.push(record.key);
                continue;
            }

            self.config.set(&record.key, &record.snoozed_value)?;
            log::info!("Re-applied snooze {} = {}", record.key, record.snoozed_value);
            self.entries.insert(record.key.clone(), record.clone());
            report.reapplied.push(record);
        }

        Ok(report)
    }

    /// Overwrite the durable blob with the current entries
    pub fn save(&mut self) -> SnoozeResult<()> {
        let mut records: Vec<&SnoozeRecord> = self.entries.values().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        self.durable.set(STATE_BLOB_KEY, &records)?;
        Ok(())
    }

    /// Best-effort teardown: put every original value back.
    ///
    /// Entries stay persisted so the next `load` re-asserts unexpired
    /// snoozes. Returns the keys that could not be restored.
    pub fn shutdown(&mut self) -> Vec<String> {
        let records: Vec<SnoozeRecord> = self.entries.values().cloned().collect();
        let mut failed = Vec::new();

        for record in &records {
            if let Err(e) = self.restore(record) {
                log::error!("Failed to restore {} on shutdown: {}", record.key, e);
                failed.push(record.key.clone());
            }
        }

        failed
    }

    pub fn get(&self, key: &str) -> Option<&SnoozeRecord> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config_store(&self) -> &C {
        &self.config
    }

    pub fn durable_store(&self) -> &D {
        &self.durable
    }

    pub fn into_stores(self) -> (C, D) {
        (self.config, self.durable)
    }
}
