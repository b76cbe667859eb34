//! Per-translation-unit result cache
//!
//! Running the compiler is by far the slowest step, so the records for
//! each translation unit are kept on disk and reused while the invocation
//! and the source file are unchanged.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

use crate::analysis::Record;
use crate::compiledb::CompileCommand;

/// Cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to write cache file: {0}")]
    WriteError(#[from] std::io::Error),
}

/// First line of every cache file; bumped when the record format changes.
const CACHE_HEADER: &str = "cppdead-cache v1";

/// Key identifying one translation unit state: the rewritten argv plus the
/// source file's size and mtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuKey(String);

impl TuKey {
    /// Compute the key, reading the source file's metadata. Fails when the
    /// source does not exist, in which case the compiler run will produce
    /// the real diagnostic.
    pub fn for_unit(cmd: &CompileCommand, argv: &[String]) -> std::io::Result<Self> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let metadata = fs::metadata(cmd.source_path())?;
        let mtime = metadata
            .modified()?
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut hasher = DefaultHasher::new();
        argv.hash(&mut hasher);
        cmd.directory.hash(&mut hasher);
        mtime.hash(&mut hasher);
        metadata.len().hash(&mut hasher);
        Ok(TuKey(format!("{:016x}", hasher.finish())))
    }
}

/// On-disk cache, one file per translation unit.
pub struct TuCache {
    dir: PathBuf,
}

impl TuCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Default cache directory for a project.
    pub fn default_dir(project_root: &Path) -> PathBuf {
        project_root.join(".cppdead-cache")
    }

    fn entry_path(&self, key: &TuKey) -> PathBuf {
        self.dir.join(format!("{}.tu", key.0))
    }

    /// Load cached records. Any stale, missing, or malformed entry is a
    /// miss; the unit is simply recomputed.
    pub fn load(&self, key: &TuKey) -> Option<Vec<Record>> {
        let path = self.entry_path(key);
        let contents = fs::read_to_string(&path).ok()?;
        let mut lines = contents.lines();

        if lines.next()? != CACHE_HEADER {
            debug!("cache header mismatch, ignoring {}", path.display());
            return None;
        }

        let mut records = Vec::new();
        for line in lines {
            let (flag, location) = line.split_once(' ')?;
            let used = match flag {
                "0" => false,
                "1" => true,
                _ => return None,
            };
            records.push(Record {
                used,
                location: location.to_string(),
            });
        }
        Some(records)
    }

    /// Write records for a translation unit, one `<0|1> <location>` line
    /// per record.
    pub fn store(&self, key: &TuKey, records: &[Record]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let file = fs::File::create(self.entry_path(key))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", CACHE_HEADER)?;
        for record in records {
            writeln!(writer, "{} {}", u8::from(record.used), record.location)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Drop every cached entry.
    pub fn clear(&self) -> Result<(), CacheError> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}
