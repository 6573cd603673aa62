use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{DumpError, Result};

/// One rated item. Field order is the on-disk key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    #[serde(rename = "title_ru")]
    pub title_localized: String,
    #[serde(rename = "title_orig")]
    pub title_original: Option<String>,
    pub user_rating: u8,
    pub user_rating_date: Option<String>,
    #[serde(rename = "year")]
    pub release_year: Option<ReleaseYear>,
    #[serde(rename = "details_url")]
    pub detail_url: String,
    pub author: Option<String>,
    #[serde(rename = "db_obj_id")]
    pub external_id: String,
}

/// Release year as saved. The scraper writes the page text; hand-edited or
/// older files may hold a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReleaseYear {
    Text(String),
    Number(i64),
}

impl fmt::Display for ReleaseYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseYear::Text(s) => f.write_str(s),
            ReleaseYear::Number(n) => write!(f, "{}", n),
        }
    }
}

// ── Reading ──

#[derive(Debug)]
struct Entry {
    record: RatingRecord,
    /// JSON text the record was loaded from, written back unchanged.
    raw: Option<Box<RawValue>>,
}

/// Saved ratings keyed by detail URL, in file order.
#[derive(Debug, Default)]
pub struct RatingStore {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl RatingStore {
    /// Load the collection at `path`. A missing file is an empty store; an
    /// unreadable one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RatingStore::default()),
            Err(e) => return Err(DumpError::io(path, e)),
        };
        info!("Loading saved ratings from {}", path.display());
        Self::parse(&data).map_err(|source| DumpError::CorruptStore {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a JSON array of records. Empty-object elements (the trailing
    /// `{}` older dumps wrote) are ignored; repeated keys keep the first entry.
    /// Each entry keeps its source text, unknown keys included.
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<Box<RawValue>> = serde_json::from_str(data)?;
        let mut store = RatingStore::default();
        for raw in entries {
            let value: Value = serde_json::from_str(raw.get())?;
            if matches!(&value, Value::Object(map) if map.is_empty()) {
                continue;
            }
            let record: RatingRecord = serde_json::from_value(value)?;
            if store.contains(&record.detail_url) {
                warn!("Duplicate saved entry {}, keeping the first", record.detail_url);
                continue;
            }
            store.push(record, Some(raw));
        }
        Ok(store)
    }

    #[cfg(test)]
    pub fn from_records(records: impl IntoIterator<Item = RatingRecord>) -> Self {
        let mut store = RatingStore::default();
        for r in records {
            if !store.contains(&r.detail_url) {
                store.push(r, None);
            }
        }
        store
    }

    fn push(&mut self, record: RatingRecord, raw: Option<Box<RawValue>>) {
        self.index.insert(record.detail_url.clone(), self.entries.len());
        self.entries.push(Entry { record, raw });
    }

    pub fn contains(&self, detail_url: &str) -> bool {
        self.index.contains_key(detail_url)
    }

    #[cfg(test)]
    pub fn get(&self, detail_url: &str) -> Option<&RatingRecord> {
        self.index.get(detail_url).map(|&i| &self.entries[i].record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RatingRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|r| r.detail_url.as_str())
    }
}

// ── Writing ──

/// Streams records into a JSON array, flushing after each one so a crash
/// mid-run loses at most the record being written. The array is closed by
/// `finish`, or on drop if `finish` was never reached.
pub struct StoreWriter {
    path: PathBuf,
    out: BufWriter<File>,
    written: usize,
    closed: bool,
}

impl StoreWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| DumpError::io(path, e))?;
        let mut writer = StoreWriter {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            written: 0,
            closed: false,
        };
        writer.write_raw(b"[")?;
        Ok(writer)
    }

    pub fn append(&mut self, record: &RatingRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| DumpError::io(&self.path, e.into()))?;
        self.append_json(&json)
    }

    /// Write every saved entry back, as the text it was loaded from.
    pub fn append_store(&mut self, store: &RatingStore) -> Result<()> {
        for entry in &store.entries {
            match &entry.raw {
                Some(raw) => self.append_json(raw.get())?,
                None => self.append(&entry.record)?,
            }
        }
        Ok(())
    }

    fn append_json(&mut self, json: &str) -> Result<()> {
        let sep: &[u8] = if self.written == 0 { b"\n" } else { b",\n" };
        self.write_raw(sep)?;
        self.write_raw(json.as_bytes())?;
        self.out.flush().map_err(|e| DumpError::io(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    /// Close the array and flush. Returns the number of records written.
    pub fn finish(mut self) -> Result<usize> {
        self.close()?;
        Ok(self.written)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.write_raw(b"\n]\n")?;
        self.out.flush().map_err(|e| DumpError::io(&self.path, e))
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.out
            .write_all(bytes)
            .map_err(|e| DumpError::io(&self.path, e))
    }
}

impl Drop for StoreWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Could not close {}: {}", self.path.display(), e);
        }
    }
}

/// Copy `path` to `<path>.bak<local timestamp>` and return the backup path.
pub fn backup(path: &Path) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.6f");
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".bak{}", stamp));
    let target = PathBuf::from(name);
    info!("Backing up {} to {}", path.display(), target.display());
    fs::copy(path, &target).map_err(|source| DumpError::Backup {
        from: path.to_path_buf(),
        to: target.clone(),
        source,
    })?;
    Ok(target)
}

// ── Tests ──

#[cfg(test)]
pub(crate) fn record(url: &str, rating: u8) -> RatingRecord {
    RatingRecord {
        title_localized: format!("Title of {}", url),
        title_original: None,
        user_rating: rating,
        user_rating_date: Some("2013-05-01".into()),
        release_year: None,
        detail_url: url.to_string(),
        author: None,
        external_id: "1".into(),
    }
}
