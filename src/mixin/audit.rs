//! Audit trail of transformed units.
//!
//! When auditing is enabled the pipeline records, for every unit it actually changed, the
//! SHA-1 of the input and output together with the bundles that applied and failed. The
//! pipeline itself never touches the filesystem; [`AuditLog::export`] writes the trail and
//! the transformed bytes on request.

use std::{
    fmt::{self, Write as _},
    fs,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use sha1::{Digest, Sha1};

use crate::{utils::dotted_name, Result};

/// Hex-encoded SHA-1 of `data`
#[must_use]
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(40), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

/// One transformed unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Internal name of the unit
    pub unit: String,
    /// SHA-1 of the bytes the host supplied
    pub input_sha1: String,
    /// SHA-1 of the bytes handed back
    pub output_sha1: String,
    /// Bundles that applied, in application order
    pub applied: Vec<String>,
    /// Bundles that were rolled back
    pub failed: Vec<String>,
    /// The transformed unit
    pub output: Vec<u8>,
}

impl AuditRecord {
    /// Build a record for `unit` transformed from `input` to `output`
    #[must_use]
    pub fn new(
        unit: &str,
        input: &[u8],
        output: Vec<u8>,
        applied: Vec<String>,
        failed: Vec<String>,
    ) -> Self {
        AuditRecord {
            unit: unit.to_string(),
            input_sha1: sha1_hex(input),
            output_sha1: sha1_hex(&output),
            applied,
            failed,
            output,
        }
    }
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} applied=[{}]",
            dotted_name(&self.unit),
            self.input_sha1,
            self.output_sha1,
            self.applied.join(",")
        )?;
        if !self.failed.is_empty() {
            write!(f, " failed=[{}]", self.failed.join(","))?;
        }
        Ok(())
    }
}

/// Append-only audit trail shared by all loading threads.
#[derive(Debug, Default)]
pub struct AuditLog {
    records: boxcar::Vec<AuditRecord>,
    floor: AtomicUsize,
}

impl AuditLog {
    /// Creates an empty trail
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record
    pub fn record(&self, record: AuditRecord) {
        self.records.push(record);
    }

    /// Iterate over visible records in recording order
    pub fn iter(&self) -> impl Iterator<Item = &AuditRecord> {
        let floor = self.floor.load(Ordering::Acquire);
        self.records
            .iter()
            .filter(move |(index, _)| *index >= floor)
            .map(|(_, record)| record)
    }

    /// Returns the number of visible records
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns `true` if nothing was recorded since the last clear
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hides every record made so far
    pub fn clear(&self) {
        self.floor.store(self.records.count(), Ordering::Release);
    }

    /// Write `audit.txt` and one `<internal name>.class` per record below `dir`.
    ///
    /// A unit transformed several times keeps its latest output.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if a directory or file cannot be written.
    pub fn export(&self, dir: &Path) -> Result<usize> {
        fs::create_dir_all(dir)?;
        let mut summary = String::new();
        let mut written = 0;
        for record in self.iter() {
            let _ = writeln!(summary, "{record}");
            let path = dir.join(format!("{}.class", record.unit));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &record.output)?;
            written += 1;
        }
        fs::write(dir.join("audit.txt"), summary)?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_hex() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_record_display() {
        let record = AuditRecord::new(
            "com/example/Player",
            b"in",
            b"out".to_vec(),
            vec!["A".into(), "B".into()],
            vec!["C".into()],
        );
        let line = record.to_string();
        assert!(line.starts_with("com.example.Player "));
        assert!(line.ends_with("applied=[A,B] failed=[C]"));
    }

    #[test]
    fn test_export() {
        let log = AuditLog::new();
        log.record(AuditRecord::new("a/B", b"x", b"y".to_vec(), vec!["M".into()], vec![]));
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(log.export(dir.path()).unwrap(), 1);
        assert_eq!(std::fs::read(dir.path().join("a/B.class")).unwrap(), b"y");
        let summary = std::fs::read_to_string(dir.path().join("audit.txt")).unwrap();
        assert!(summary.contains("a.B"));

        log.clear();
        assert!(log.is_empty());
    }
}
