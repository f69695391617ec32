//! CSV Telemetry Store
//!
//! Append-only history log with one CSV file per serial number. Every
//! operation on an existing log holds that serial's lock, so readers never
//! see a half-written row and compaction never races an append.
//!
//! File names are the percent-encoded serial, so distinct serials never
//! share a log.

use crate::domain::ports::{
    days_before_now, HistoryRecord, TelemetryStore, TimeRange, UNKNOWN_SERIAL,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Column header, written once at the top of every log
pub const CSV_HEADER: &str = "timestamp,temperature,power_on_hours,power_cycle_count,\
reallocated_sectors,pending_sectors,uncorrectable_errors,health_percent";

const LOG_EXTENSION: &str = "csv";
const TEMP_EXTENSION: &str = "csv.tmp";
const COLUMN_COUNT: usize = 8;

// =============================================================================
// CSV Telemetry Store
// =============================================================================

/// File-per-serial history store
pub struct CsvTelemetryStore {
    data_dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CsvTelemetryStore {
    /// Open a store rooted at `data_dir`, creating the directory if needed
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).await?;
        info!("Telemetry store opened at {}", data_dir.display());

        Ok(Self {
            data_dir,
            locks: DashMap::new(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks.entry(key.to_string()).or_default().clone()
    }

    fn log_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", key, LOG_EXTENSION))
    }

    /// File keys of every log in the data directory
    async fn list_keys(&self) -> Result<Vec<String>> {
        let io_err = |source| Error::StoreIo {
            serial: "*".to_string(),
            source,
        };

        let mut entries = match fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().map(|e| e == LOG_EXTENSION).unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    keys.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        Ok(keys)
    }

    /// Drop every record older than `cutoff`, returning how many were removed
    pub async fn compact_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let keep = TimeRange::since(cutoff);
        let mut removed = 0;

        for key in self.list_keys().await? {
            let lock = self.lock_for(&key);
            let _guard = lock.lock().await;

            let path = self.log_path(&key);
            let records = read_log(&path, &key).await?;
            let total = records.len();
            let kept: Vec<_> = records.into_iter().filter(|r| keep.contains(&r.timestamp)).collect();

            let mut contents = String::with_capacity(CSV_HEADER.len() + 1 + kept.len() * 64);
            contents.push_str(CSV_HEADER);
            contents.push('\n');
            for record in &kept {
                contents.push_str(&format_row(record));
                contents.push('\n');
            }

            let temp = self.data_dir.join(format!("{}.{}", key, TEMP_EXTENSION));
            let io_err = |source| Error::StoreIo {
                serial: key.clone(),
                source,
            };
            fs::write(&temp, contents).await.map_err(io_err)?;
            fs::rename(&temp, &path).await.map_err(io_err)?;

            debug!(serial = %key, kept = kept.len(), dropped = total - kept.len(), "Compacted history");
            removed += total - kept.len();
        }

        Ok(removed)
    }
}

#[async_trait]
impl TelemetryStore for CsvTelemetryStore {
    async fn append(&self, serial: &str, record: &HistoryRecord) -> Result<()> {
        let key = serial_key(serial);
        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let path = self.log_path(&key);
        let io_err = |source| Error::StoreIo {
            serial: key.clone(),
            source,
        };

        let needs_header = match fs::metadata(&path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(io_err(e)),
        };

        let mut buf = String::new();
        if needs_header {
            buf.push_str(CSV_HEADER);
            buf.push('\n');
        }
        buf.push_str(&format_row(record));
        buf.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.write_all(buf.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;

        Ok(())
    }

    async fn read_range(&self, serial: &str, range: &TimeRange) -> Result<Vec<HistoryRecord>> {
        let key = serial_key(serial);
        let path = self.log_path(&key);

        // Serials without a log never enter the lock table
        let exists = fs::try_exists(&path).await.map_err(|source| Error::StoreIo {
            serial: key.clone(),
            source,
        })?;
        if !exists {
            return Ok(Vec::new());
        }

        let lock = self.lock_for(&key);
        let _guard = lock.lock().await;

        let records = read_log(&path, &key).await?;
        Ok(records.into_iter().filter(|r| range.contains(&r.timestamp)).collect())
    }

    async fn list_serials(&self) -> Result<Vec<String>> {
        let mut serials: Vec<String> = self
            .list_keys()
            .await?
            .iter()
            .map(|key| serial_from_key(key))
            .collect();

        serials.sort();
        Ok(serials)
    }

    async fn compact(&self, max_age_days: u32) -> Result<()> {
        let cutoff = days_before_now(max_age_days);
        let removed = self.compact_before(cutoff).await?;
        info!(max_age_days, removed, "Telemetry store compacted");
        Ok(())
    }
}

// =============================================================================
// Row Format
// =============================================================================

/// File-name-safe key for a serial number.
///
/// Percent-encoding is reversible, so `A/B` and `A_B` stay apart. An empty
/// serial maps to [`UNKNOWN_SERIAL`].
pub fn serial_key(serial: &str) -> String {
    let serial = serial.trim();
    if serial.is_empty() {
        return UNKNOWN_SERIAL.to_string();
    }
    urlencoding::encode(serial).into_owned()
}

/// Serial number a file key was derived from
pub fn serial_from_key(key: &str) -> String {
    urlencoding::decode(key)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| key.to_string())
}

/// Render a record as one CSV row (no trailing newline)
pub fn format_row(record: &HistoryRecord) -> String {
    format!(
        "{},{},{},{},{},{},{},{}",
        record.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        record.temperature,
        record.power_on_hours,
        record.power_cycle_count,
        record.reallocated_sectors,
        record.pending_sectors,
        record.uncorrectable_errors,
        record.health_percent,
    )
}

/// Parse one CSV row; `None` for the header or any malformed row
pub fn parse_row(line: &str) -> Option<HistoryRecord> {
    let fields: Vec<&str> = line.trim_end_matches('\r').split(',').collect();
    if fields.len() != COLUMN_COUNT {
        return None;
    }

    Some(HistoryRecord {
        timestamp: DateTime::parse_from_rfc3339(fields[0].trim())
            .ok()?
            .with_timezone(&Utc),
        temperature: fields[1].trim().parse().ok()?,
        power_on_hours: fields[2].trim().parse().ok()?,
        power_cycle_count: fields[3].trim().parse().ok()?,
        reallocated_sectors: fields[4].trim().parse().ok()?,
        pending_sectors: fields[5].trim().parse().ok()?,
        uncorrectable_errors: fields[6].trim().parse().ok()?,
        health_percent: fields[7].trim().parse().ok().filter(|h: &u8| *h <= 100)?,
    })
}

async fn read_log(path: &Path, key: &str) -> Result<Vec<HistoryRecord>> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(Error::StoreIo {
                serial: key.to_string(),
                source,
            })
        }
    };

    let mut skipped = 0usize;
    let records: Vec<_> = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| {
            let row = parse_row(line);
            if row.is_none() && !(idx == 0 && line.starts_with("timestamp")) {
                skipped += 1;
            }
            row
        })
        .collect();

    if skipped > 0 {
        warn!(serial = key, skipped, "Skipped malformed history rows");
    }
    Ok(records)
}
