use bucket_backup::config::{Config, MetadataStrategy};
use bucket_backup::manifest::{Manifest, ManifestStore};
use bucket_backup::notify::Notifier;
use bucket_backup::sync::SyncStats;
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Scratch source tree plus a run configuration pointing into it.
pub struct TestTree {
    dir: TempDir,
    pub config: Config,
}

#[allow(dead_code)]
impl TestTree {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let source = dir.path().join("source");
        fs::create_dir_all(&source).expect("create source dir");

        let mut config = Config::default();
        config.source.dir = source;
        config.storage.bucket = dir.path().join("bucket");
        config.sync.state_path = dir.path().join("state").join("state.json");
        config.sync.metadata_strategy = MetadataStrategy::Basic;
        config.sync.retention_days = 0;
        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self) -> &Path {
        &self.config.source.dir
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.source().join(rel)
    }

    pub fn write(&self, rel: &str, data: &[u8]) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, data).expect("write file");
        path
    }

    /// Write a file with a fixed modification time (unix seconds).
    pub fn write_at(&self, rel: &str, data: &[u8], mtime: i64) -> PathBuf {
        let path = self.write(rel, data);
        set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).expect("set mtime");
        path
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).expect("remove file");
    }

    pub fn manifest_store(&self) -> ManifestStore {
        ManifestStore::new(&self.config.sync.state_path)
    }

    pub fn saved_manifest(&self) -> Manifest {
        self.manifest_store().load().expect("load manifest")
    }
}

/// Notifier that remembers every call.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(bool, SyncStats)>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(bool, SyncStats)> {
        self.calls.lock().expect("notifier lock").clone()
    }

    pub fn last(&self) -> Option<(bool, SyncStats)> {
        self.calls().last().copied()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, success: bool, stats: &SyncStats) -> bucket_backup::Result<()> {
        self.calls.lock().expect("notifier lock").push((success, *stats));
        Ok(())
    }
}
