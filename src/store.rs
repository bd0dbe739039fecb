use std::fs;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::id::JobId;
use crate::job::JobRecord;

/// One file per job, named by its canonical 36-character id, under a single
/// storage directory. No lock file, no index file; the queue rebuilds
/// every in-memory index from this store at startup (see `recovery`).
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create storage directory {}", dir.display()))?;
        Ok(RecordStore { dir })
    }

    fn path_for(&self, id: JobId) -> PathBuf {
        self.dir.join(id.as_hyphenated().to_string())
    }

    /// Replace the record for `id` atomically: write to a sibling temp file,
    /// then rename over the target. A failure partway through leaves the
    /// previous value (if any) intact.
    pub fn write(&self, record: &JobRecord) -> Result<()> {
        let path = self.path_for(record.id);
        let tmp_path = path.with_extension("tmp");

        let file = fs::File::create(&tmp_path)
            .with_context(|| format!("create temp record file {}", tmp_path.display()))?;
        set_owner_only_permissions(&file);

        if let Err(err) =
            serde_json::to_writer(&file, record).context("serialize job record")
        {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }
        drop(file);

        fs::rename(&tmp_path, &path).with_context(|| {
            format!(
                "rename {} -> {}",
                tmp_path.display(),
                path.display()
            )
        })?;
        Ok(())
    }

    /// Read and deserialize the record for `id`, if present.
    pub fn read(&self, id: JobId) -> Result<Option<JobRecord>> {
        let path = self.path_for(id);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("open record file {}", path.display()))
            }
        };
        let reader = BufReader::new(file);
        let record = serde_json::from_reader(reader)
            .with_context(|| format!("parse record file {}", path.display()))?;
        Ok(Some(record))
    }

    pub fn exists(&self, id: JobId) -> bool {
        self.path_for(id).is_file()
    }

    /// All ids currently present in the store. Unordered.
    pub fn list(&self) -> Result<Vec<JobId>> {
        let mut ids = Vec::new();
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("read storage directory {}", self.dir.display()))?;
        for entry in entries {
            let entry = entry.context("iterate storage directory")?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(id) = stem.parse::<JobId>() {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

#[cfg(unix)]
fn set_owner_only_permissions(file: &fs::File) {
    use std::os::unix::fs::PermissionsExt;
    let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_file: &fs::File) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(dir_hint: &str) -> JobRecord {
        JobRecord::new(
            JobId::new(),
            dir_hint.to_string(),
            b"payload".to_vec(),
            Vec::new(),
            1_000,
        )
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::open(tmp.path()).expect("open store");
        let record = make_record("build");

        store.write(&record).expect("write record");
        let read_back = store.read(record.id).expect("read record").expect("present");

        assert_eq!(read_back.id, record.id);
        assert_eq!(read_back.job_type, "build");
        assert_eq!(read_back.args, b"payload");
    }

    #[test]
    fn read_missing_returns_none() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::open(tmp.path()).expect("open store");
        assert!(store.read(JobId::new()).expect("read").is_none());
    }

    #[test]
    fn list_reflects_written_records_and_skips_temp_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::open(tmp.path()).expect("open store");
        let a = make_record("build");
        let b = make_record("ship");
        store.write(&a).expect("write a");
        store.write(&b).expect("write b");

        // stray leftover temp file from a hypothetical interrupted write
        fs::write(tmp.path().join("deadbeef.tmp"), b"garbage").expect("write stray tmp");

        let mut ids = store.list().expect("list");
        ids.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn write_overwrites_existing_record_atomically() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = RecordStore::open(tmp.path()).expect("open store");
        let mut record = make_record("build");
        store.write(&record).expect("write record");

        record.started_at = Some(2_000);
        store.write(&record).expect("rewrite record");

        let read_back = store.read(record.id).expect("read").expect("present");
        assert_eq!(read_back.started_at, Some(2_000));
    }
}
