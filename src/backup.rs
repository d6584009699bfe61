//! Snapshot and restore of configuration + artifact state.
//!
//! Every destructive mutation (upgrade, rollback, db upgrade) is preceded
//! by a snapshot into a timestamp-named directory. Snapshots are
//! write-once: restore never deletes them, and nothing removes them
//! automatically; cleanup is the operator's call.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the metadata file written into every snapshot directory.
const MANIFEST_FILE: &str = "manifest.json";

/// A point-in-time snapshot taken before a destructive mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub created_at: DateTime<Utc>,
    /// The snapshot directory itself.
    pub root: PathBuf,
    pub config_snapshot: PathBuf,
    pub artifact_snapshot: PathBuf,
    /// Logical database dump, present only for database upgrades.
    pub db_dump: Option<PathBuf>,
}

/// Copies configuration and artifact state out to snapshots and back.
pub struct BackupManager {
    backup_root: PathBuf,
    properties_path: PathBuf,
    artifact_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backup_root: PathBuf, properties_path: PathBuf, artifact_dir: PathBuf) -> Self {
        Self {
            backup_root,
            properties_path,
            artifact_dir,
        }
    }

    /// Take a snapshot of the property file and the artifact directory
    /// into `<backup_root>/<timestamp>/`, and record it in a manifest.
    pub fn snapshot(&self) -> Result<BackupRecord> {
        let created_at = Utc::now();
        let dir = self.unique_snapshot_dir(&created_at)?;

        let config_snapshot = dir.join(
            self.properties_path
                .file_name()
                .ok_or_else(|| Error::Backup("property file has no file name".to_string()))?,
        );
        fs::copy(&self.properties_path, &config_snapshot).map_err(|e| {
            Error::Backup(format!(
                "cannot copy {} to {}: {}",
                self.properties_path.display(),
                config_snapshot.display(),
                e
            ))
        })?;

        let artifact_name = self
            .artifact_dir
            .file_name()
            .ok_or_else(|| Error::Backup("artifact directory has no file name".to_string()))?;
        let artifact_snapshot = dir.join(artifact_name);
        copy_dir_recursive(&self.artifact_dir, &artifact_snapshot)?;

        let record = BackupRecord {
            created_at,
            root: dir.clone(),
            config_snapshot,
            artifact_snapshot,
            db_dump: None,
        };
        self.write_manifest(&record)?;

        tracing::info!(
            "backed up {} and {} to {}",
            self.properties_path.display(),
            self.artifact_dir.display(),
            dir.display()
        );
        Ok(record)
    }

    /// Restore a snapshot over the live state.
    ///
    /// Each component is copied back to its original location, overwriting
    /// in place. The restore is not atomic: a failure mid-restore
    /// can leave the configuration restored but the artifact mixed. The
    /// snapshot itself is never touched, so the restore can be retried.
    pub fn restore(&self, record: &BackupRecord) -> Result<()> {
        fs::copy(&record.config_snapshot, &self.properties_path).map_err(|e| {
            Error::Backup(format!(
                "cannot restore {} to {}: {}",
                record.config_snapshot.display(),
                self.properties_path.display(),
                e
            ))
        })?;

        if self.artifact_dir.exists() {
            fs::remove_dir_all(&self.artifact_dir).map_err(|e| {
                Error::Backup(format!(
                    "cannot clear {} before restore: {}",
                    self.artifact_dir.display(),
                    e
                ))
            })?;
        }
        copy_dir_recursive(&record.artifact_snapshot, &self.artifact_dir)?;

        tracing::info!("restored snapshot {} into place", record.root.display());
        Ok(())
    }

    /// Load the manifest from an existing snapshot directory.
    pub fn load_record(dir: &Path) -> Result<BackupRecord> {
        let manifest = dir.join(MANIFEST_FILE);
        let contents = fs::read_to_string(&manifest).map_err(|e| {
            Error::Backup(format!("cannot read {}: {}", manifest.display(), e))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_manifest(&self, record: &BackupRecord) -> Result<()> {
        let manifest = record.root.join(MANIFEST_FILE);
        fs::write(&manifest, serde_json::to_string_pretty(record)?)
            .map_err(|e| Error::Backup(format!("cannot write {}: {}", manifest.display(), e)))
    }

    /// Timestamp-named directory; a numeric suffix disambiguates snapshots
    /// taken within the same second.
    fn unique_snapshot_dir(&self, created_at: &DateTime<Utc>) -> Result<PathBuf> {
        let stamp = created_at.format("%Y-%m-%d-%H-%M-%S").to_string();
        let mut dir = self.backup_root.join(&stamp);
        let mut counter = 1;
        while dir.exists() {
            dir = self.backup_root.join(format!("{}-{}", stamp, counter));
            counter += 1;
        }
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Backup(format!("cannot create {}: {}", dir.display(), e)))?;
        Ok(dir)
    }
}

/// Recursive directory copy. Symlinks are followed; the deployment artifact
/// tree does not rely on link identity.
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .map_err(|e| Error::Backup(format!("cannot create {}: {}", dst.display(), e)))?;
    for entry in fs::read_dir(src)
        .map_err(|e| Error::Backup(format!("cannot read {}: {}", src.display(), e)))?
    {
        let entry = entry.map_err(|e| Error::Backup(format!("cannot read dir entry: {}", e)))?;
        let target = dst.join(entry.file_name());
        let path = entry.path();
        if path.is_dir() {
            copy_dir_recursive(&path, &target)?;
        } else {
            fs::copy(&path, &target).map_err(|e| {
                Error::Backup(format!(
                    "cannot copy {} to {}: {}",
                    path.display(),
                    target.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        manager: BackupManager,
        properties: PathBuf,
        artifact: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let properties = dir.path().join("management.properties");
        fs::write(&properties, "db.user=stack\n").unwrap();

        let artifact = dir.path().join("management");
        fs::create_dir_all(artifact.join("lib")).unwrap();
        fs::write(artifact.join("app.jar"), b"original jar bytes").unwrap();
        fs::write(artifact.join("lib").join("dep.jar"), b"dep bytes").unwrap();

        let manager = BackupManager::new(
            dir.path().join("backups"),
            properties.clone(),
            artifact.clone(),
        );
        Fixture {
            _dir: dir,
            manager,
            properties,
            artifact,
        }
    }

    #[test]
    fn snapshot_copies_config_and_artifact_and_writes_manifest() {
        let fx = fixture();
        let record = fx.manager.snapshot().unwrap();

        assert!(record.config_snapshot.is_file());
        assert!(record.artifact_snapshot.join("lib").join("dep.jar").is_file());
        assert!(record.db_dump.is_none());

        let loaded = BackupManager::load_record(&record.root).unwrap();
        assert_eq!(loaded.config_snapshot, record.config_snapshot);
    }

    #[test]
    fn restore_reproduces_mutated_state_byte_identical() {
        let fx = fixture();
        let record = fx.manager.snapshot().unwrap();

        // Mutate everything after the snapshot.
        fs::write(&fx.properties, "db.user=intruder\n").unwrap();
        fs::write(fx.artifact.join("app.jar"), b"corrupted").unwrap();
        fs::write(fx.artifact.join("extra.file"), b"should disappear").unwrap();

        fx.manager.restore(&record).unwrap();

        assert_eq!(
            fs::read(&fx.properties).unwrap(),
            b"db.user=stack\n".to_vec()
        );
        assert_eq!(
            fs::read(fx.artifact.join("app.jar")).unwrap(),
            b"original jar bytes".to_vec()
        );
        assert_eq!(
            fs::read(fx.artifact.join("lib").join("dep.jar")).unwrap(),
            b"dep bytes".to_vec()
        );
        assert!(!fx.artifact.join("extra.file").exists());
    }

    #[test]
    fn restore_leaves_the_snapshot_untouched() {
        let fx = fixture();
        let record = fx.manager.snapshot().unwrap();
        fx.manager.restore(&record).unwrap();
        assert!(record.root.join(MANIFEST_FILE).is_file());
        assert!(record.config_snapshot.is_file());
    }

    #[test]
    fn snapshots_in_the_same_second_get_distinct_directories() {
        let fx = fixture();
        let first = fx.manager.snapshot().unwrap();
        let second = fx.manager.snapshot().unwrap();
        assert_ne!(first.root, second.root);
        assert!(first.root.exists() && second.root.exists());
    }
}
