//! Durable, deduplicated record outputs. The source of truth for resume.
//!
//! Three CSV files live in the output directory:
//!
//! - `all_profiles.csv`      every processed record (resume key set)
//! - `profiles_enriched.csv` every processed record, with the open-to-work flag
//! - `qualified.csv`         records that passed classification
//!
//! Each append rewrites the whole file through a temp file + rename, so a file
//! on disk is always a complete, self-consistent snapshot. Writes go
//! qualified → enriched → all: `all_profiles.csv` is written last and is the
//! only file consulted for "already processed", so an interruption between
//! writes re-processes the record on resume and the per-file URL sets absorb
//! the repeat.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use leadscout_common::{LeadScoutError, Record};

pub const ALL_PROFILES_FILE: &str = "all_profiles.csv";
pub const ENRICHED_FILE: &str = "profiles_enriched.csv";
pub const QUALIFIED_FILE: &str = "qualified.csv";

const ALL_HEADERS: &[&str] = &["Name", "Headline", "Profile URL", "Company/Title", "Location"];
const ENRICHED_HEADERS: &[&str] = &["Name", "Headline", "Location", "Profile URL", "OpenToWork"];
const QUALIFIED_HEADERS: &[&str] = &["Name", "Headline", "Profile URL", "Company/Title"];

type Result<T> = std::result::Result<T, LeadScoutError>;

fn persistence(context: &str, path: &Path, err: impl std::fmt::Display) -> LeadScoutError {
    LeadScoutError::Persistence(format!("{context} {}: {err}", path.display()))
}

// ---------------------------------------------------------------------------
// CsvTable: one durable file, keyed by URL
// ---------------------------------------------------------------------------

struct CsvTable {
    path: PathBuf,
    headers: &'static [&'static str],
    url_column: usize,
    rows: Vec<Vec<String>>,
    urls: HashSet<String>,
}

impl CsvTable {
    fn load(path: PathBuf, headers: &'static [&'static str], url_column: usize) -> Result<Self> {
        let mut table = Self {
            path,
            headers,
            url_column,
            rows: Vec::new(),
            urls: HashSet::new(),
        };

        if !table.path.exists() {
            return Ok(table);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&table.path)
            .map_err(|e| persistence("Failed to open", &table.path, e))?;

        let mut duplicates = 0usize;
        for row in reader.records() {
            let row = row.map_err(|e| persistence("Failed to read", &table.path, e))?;
            let fields: Vec<String> = row.iter().map(str::to_string).collect();
            let Some(url) = fields.get(url_column).filter(|u| !u.is_empty()).cloned() else {
                warn!(path = %table.path.display(), "Skipping row without a URL");
                continue;
            };
            if !table.urls.insert(url) {
                duplicates += 1;
                continue;
            }
            table.rows.push(fields);
        }

        if duplicates > 0 {
            warn!(
                path = %table.path.display(),
                duplicates,
                "Dropped duplicate rows while loading; next write compacts the file"
            );
        }
        debug!(path = %table.path.display(), rows = table.rows.len(), "Loaded checkpoint file");
        Ok(table)
    }

    fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Append a row unless its URL is already present, then rewrite the file.
    /// Returns false when the URL was already recorded.
    fn append(&mut self, row: Vec<String>) -> Result<bool> {
        let url = row[self.url_column].clone();
        if self.urls.contains(&url) {
            return Ok(false);
        }
        self.rows.push(row);
        if let Err(e) = self.persist() {
            self.rows.pop();
            return Err(e);
        }
        self.urls.insert(url);
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let tmp = NamedTempFile::new_in(dir)
            .map_err(|e| persistence("Failed to create temp file for", &self.path, e))?;

        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());
            writer
                .write_record(self.headers)
                .map_err(|e| persistence("Failed to write", &self.path, e))?;
            for row in &self.rows {
                writer
                    .write_record(row)
                    .map_err(|e| persistence("Failed to write", &self.path, e))?;
            }
            writer
                .flush()
                .map_err(|e| persistence("Failed to flush", &self.path, e))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| persistence("Failed to sync", &self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| persistence("Failed to replace", &self.path, e.error))?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

// ---------------------------------------------------------------------------
// CheckpointStore
// ---------------------------------------------------------------------------

pub struct CheckpointStore {
    dir: PathBuf,
    all: CsvTable,
    enriched: CsvTable,
    qualified: CsvTable,
}

impl CheckpointStore {
    /// Open (or create) the output directory and load existing durable state.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| persistence("Failed to create", &dir, e))?;

        let all = CsvTable::load(dir.join(ALL_PROFILES_FILE), ALL_HEADERS, 2)?;
        let enriched = CsvTable::load(dir.join(ENRICHED_FILE), ENRICHED_HEADERS, 3)?;
        let qualified = CsvTable::load(dir.join(QUALIFIED_FILE), QUALIFIED_HEADERS, 2)?;

        info!(
            dir = %dir.display(),
            processed = all.len(),
            qualified = qualified.len(),
            "Checkpoint store opened"
        );

        Ok(Self {
            dir,
            all,
            enriched,
            qualified,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// URLs already processed, reconstructed from `all_profiles.csv`.
    pub fn load_processed(&self) -> HashSet<String> {
        self.all.urls.clone()
    }

    pub fn is_processed(&self, url: &str) -> bool {
        self.all.contains(url)
    }

    pub fn processed_count(&self) -> usize {
        self.all.len()
    }

    pub fn qualified_count(&self) -> usize {
        self.qualified.len()
    }

    /// Write a record to both all-profiles files (enriched variant first).
    pub fn append_all(&mut self, record: &Record) -> Result<bool> {
        self.enriched.append(vec![
            record.name.clone(),
            record.headline.clone(),
            record.location.clone(),
            record.url.clone(),
            if record.open_to_work { "Yes" } else { "No" }.to_string(),
        ])?;
        self.all.append(vec![
            record.name.clone(),
            record.headline.clone(),
            record.url.clone(),
            record.company_or_title().to_string(),
            record.location.clone(),
        ])
    }

    /// Write a classified-qualified record to `qualified.csv`.
    pub fn append_qualified(&mut self, record: &Record) -> Result<bool> {
        if record.verdict() != Some(true) {
            return Ok(false);
        }
        self.qualified.append(vec![
            record.name.clone(),
            record.headline.clone(),
            record.url.clone(),
            record.company_or_title().to_string(),
        ])
    }

    /// Durably record a classified record. After this returns the URL is
    /// skipped by every later run.
    pub fn checkpoint(&mut self, record: &Record) -> Result<()> {
        if record.verdict().is_none() {
            return Err(LeadScoutError::Persistence(format!(
                "refusing to checkpoint unclassified record {}",
                record.url
            )));
        }
        if record.is_qualified() {
            self.append_qualified(record)?;
        }
        self.append_all(record)?;
        Ok(())
    }

    /// Batch-boundary consistency check. Qualified URLs missing from the
    /// processed set are leftovers of an interrupted write; they are
    /// re-processed when seen again, so this only warns.
    pub fn verify_flushed(&self) {
        let missing = self.unflushed_qualified();
        if missing > 0 {
            warn!(count = missing, "Qualified records missing from processed set");
        }
    }

    fn unflushed_qualified(&self) -> usize {
        self.qualified
            .urls
            .iter()
            .filter(|url| !self.all.contains(url))
            .count()
    }
}

/// Write raw bytes atomically (used for session files).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| persistence("Failed to create", dir, e))?;
    let mut tmp =
        NamedTempFile::new_in(dir).map_err(|e| persistence("Failed to create temp file for", path, e))?;
    tmp.write_all(bytes)
        .map_err(|e| persistence("Failed to write", path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| persistence("Failed to sync", path, e))?;
    tmp.persist(path)
        .map_err(|e| persistence("Failed to replace", path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified(url: &str, location: &str, qualified: bool) -> Record {
        let mut r = Record::new(url);
        r.name = "Jane Doe".into();
        r.headline = "Small Business Owner, Acme".into();
        r.location = location.into();
        r.open_to_work = qualified;
        r.set_verdict(qualified);
        r
    }

    #[test]
    fn fresh_directory_has_no_processed_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().join("out")).unwrap();
        assert!(store.load_processed().is_empty());
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn checkpoint_writes_all_three_files_with_contract_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        store
            .checkpoint(&classified("https://example.com/in/a", "Austin, TX", true))
            .unwrap();

        let all = fs::read_to_string(dir.path().join(ALL_PROFILES_FILE)).unwrap();
        assert_eq!(
            all,
            "Name,Headline,Profile URL,Company/Title,Location\n\
             Jane Doe,\"Small Business Owner, Acme\",https://example.com/in/a,\"Small Business Owner, Acme\",\"Austin, TX\"\n"
        );
        let enriched = fs::read_to_string(dir.path().join(ENRICHED_FILE)).unwrap();
        assert!(enriched.starts_with("Name,Headline,Location,Profile URL,OpenToWork\n"));
        assert!(enriched.trim_end().ends_with(",Yes"));
        let qualified = fs::read_to_string(dir.path().join(QUALIFIED_FILE)).unwrap();
        assert!(qualified.starts_with("Name,Headline,Profile URL,Company/Title\n"));
        assert_eq!(qualified.lines().count(), 2);
    }

    #[test]
    fn unqualified_record_skips_qualified_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        store
            .checkpoint(&classified("https://example.com/in/b", "Toronto, Canada", false))
            .unwrap();
        assert_eq!(store.qualified_count(), 0);
        assert!(!dir.path().join(QUALIFIED_FILE).exists());
        assert!(store.is_processed("https://example.com/in/b"));
    }

    #[test]
    fn reopen_restores_processed_set() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = CheckpointStore::open(dir.path()).unwrap();
            store.checkpoint(&classified("https://example.com/in/a", "Austin, TX", true)).unwrap();
            store.checkpoint(&classified("https://example.com/in/b", "Lyon, FR", false)).unwrap();
        }
        let store = CheckpointStore::open(dir.path()).unwrap();
        let processed = store.load_processed();
        assert_eq!(processed.len(), 2);
        assert!(processed.contains("https://example.com/in/a"));
        assert_eq!(store.qualified_count(), 1);
    }

    #[test]
    fn duplicate_url_is_not_appended_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        let record = classified("https://example.com/in/a", "Austin, TX", true);
        store.checkpoint(&record).unwrap();
        let before = fs::read(dir.path().join(ALL_PROFILES_FILE)).unwrap();
        store.checkpoint(&record).unwrap();
        assert_eq!(fs::read(dir.path().join(ALL_PROFILES_FILE)).unwrap(), before);
        assert_eq!(store.processed_count(), 1);
        assert_eq!(store.qualified_count(), 1);
    }

    #[test]
    fn interrupted_write_between_files_resumes_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let record = classified("https://example.com/in/a", "Austin, TX", true);
        {
            // Simulate a crash after the qualified write but before the all-profiles write.
            let mut store = CheckpointStore::open(dir.path()).unwrap();
            store.append_qualified(&record).unwrap();
        }
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        assert!(!store.is_processed(&record.url));
        assert_eq!(store.unflushed_qualified(), 1);
        store.verify_flushed();
        store.checkpoint(&record).unwrap();
        assert_eq!(store.qualified_count(), 1);
        let qualified = fs::read_to_string(dir.path().join(QUALIFIED_FILE)).unwrap();
        assert_eq!(qualified.matches("https://example.com/in/a").count(), 1);
        assert_eq!(store.unflushed_qualified(), 0);
    }

    #[test]
    fn legacy_duplicate_rows_are_compacted_on_next_write() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(ALL_PROFILES_FILE),
            "Name,Headline,Profile URL,Company/Title,Location\n\
             A,H,https://example.com/in/a,H,X\n\
             A,H,https://example.com/in/a,H,X\n",
        )
        .unwrap();
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        assert_eq!(store.processed_count(), 1);
        store.checkpoint(&classified("https://example.com/in/b", "Lyon, FR", false)).unwrap();
        let all = fs::read_to_string(dir.path().join(ALL_PROFILES_FILE)).unwrap();
        assert_eq!(all.matches("https://example.com/in/a").count(), 1);
        assert_eq!(all.lines().count(), 3);
    }

    #[test]
    fn unclassified_record_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::open(dir.path()).unwrap();
        let record = Record::new("https://example.com/in/a");
        assert!(matches!(store.checkpoint(&record), Err(LeadScoutError::Persistence(_))));
        assert_eq!(store.processed_count(), 0);
    }

    #[test]
    fn unwritable_directory_is_a_persistence_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();
        assert!(matches!(
            CheckpointStore::open(&blocker),
            Err(LeadScoutError::Persistence(_))
        ));
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }
}
