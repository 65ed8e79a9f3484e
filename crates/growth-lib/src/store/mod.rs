//! Durable cache of the trained artifact bundle
//!
//! This module provides:
//! - Atomic per-unit writes (temp file, fsync, rename)
//! - SHA-256 checksums recorded in the metadata, which is written last
//! - All-or-nothing loading: a bundle is returned only when every unit is
//!   present, checksum-valid and mutually consistent

use crate::error::{GrowthError, Result};
use crate::predictor::{
    ArtifactBundle, CacheMetadata, LabelEncoder, LinearSvm, StandardScaler, CACHE_FORMAT_VERSION,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// Prefix shared by in-flight temp files
const TEMP_PREFIX: &str = ".growth_";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The four persisted units of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Classifier,
    Scaler,
    Encoder,
    Metadata,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Classifier,
        ArtifactKind::Scaler,
        ArtifactKind::Encoder,
        ArtifactKind::Metadata,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Classifier => "growth_model.json",
            ArtifactKind::Scaler => "growth_scaler.json",
            ArtifactKind::Encoder => "growth_encoder.json",
            ArtifactKind::Metadata => "growth_metadata.json",
        }
    }

    /// Key used in status reports and the checksum table
    pub fn key(&self) -> &'static str {
        match self {
            ArtifactKind::Classifier => "model",
            ArtifactKind::Scaler => "scaler",
            ArtifactKind::Encoder => "encoder",
            ArtifactKind::Metadata => "metadata",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Why a cache lookup did not produce a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMiss {
    /// One or more units are absent
    Missing(Vec<ArtifactKind>),
    /// Written by an incompatible version of this crate
    StaleFormat { found: u32 },
    /// A unit does not match the checksum recorded in the metadata
    ChecksumMismatch(ArtifactKind),
    /// Units disagree on feature or class counts
    Inconsistent(String),
    /// Cached with a different sex domain than the one configured
    SexMappingChanged,
    /// Caching is turned off
    Disabled,
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMiss::Missing(kinds) => {
                let names: Vec<&str> = kinds.iter().map(ArtifactKind::key).collect();
                write!(f, "cache incomplete, missing: {}", names.join(", "))
            }
            CacheMiss::StaleFormat { found } => write!(
                f,
                "cache format version {} does not match {}",
                found, CACHE_FORMAT_VERSION
            ),
            CacheMiss::ChecksumMismatch(kind) => write!(f, "checksum mismatch for {}", kind),
            CacheMiss::Inconsistent(msg) => write!(f, "cache inconsistent: {}", msg),
            CacheMiss::SexMappingChanged => write!(f, "cached sex mapping differs from configuration"),
            CacheMiss::Disabled => write!(f, "cache disabled"),
        }
    }
}

/// Result of `ArtifactStore::load`
#[derive(Debug)]
pub enum CacheLookup {
    Hit(Box<ArtifactBundle>),
    Miss(CacheMiss),
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// Presence of each persisted unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFiles {
    pub model: bool,
    pub scaler: bool,
    pub encoder: bool,
    pub metadata: bool,
}

impl CacheFiles {
    pub fn all_present(&self) -> bool {
        self.model && self.scaler && self.encoder && self.metadata
    }
}

/// Diagnostic view of the cache directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub enabled: bool,
    pub directory: PathBuf,
    pub complete: bool,
    pub files: CacheFiles,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<CacheMetadata>,
}

/// Versioned prefix of the metadata unit; absent on pre-versioned caches
#[derive(Deserialize)]
struct MetadataHeader {
    #[serde(default)]
    format_version: u32,
}

/// Filesystem-backed store for one artifact bundle
pub struct ArtifactStore {
    dir: PathBuf,
    enabled: bool,
    write_lock: Mutex<()>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            enabled: true,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Persists the bundle; the metadata (with checksums) is published last
    pub fn save(&self, bundle: &ArtifactBundle) -> Result<CacheMetadata> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| GrowthError::CacheCorrupt(format!("store lock poisoned: {}", e)))?;

        fs::create_dir_all(&self.dir).map_err(|e| GrowthError::io(&self.dir, e))?;

        let units = [
            (ArtifactKind::Classifier, to_json(&bundle.classifier)?),
            (ArtifactKind::Scaler, to_json(&bundle.scaler)?),
            (ArtifactKind::Encoder, to_json(&bundle.encoder)?),
        ];

        let mut checksums = BTreeMap::new();
        for (kind, bytes) in &units {
            self.write_atomic(*kind, bytes)?;
            checksums.insert(kind.key().to_string(), compute_checksum(bytes));
        }

        let mut metadata = bundle.metadata.clone();
        metadata.checksums = checksums;
        self.write_atomic(ArtifactKind::Metadata, &to_json(&metadata)?)?;
        sync_dir(&self.dir)?;

        info!(
            directory = %self.dir.display(),
            classes = metadata.n_classes,
            "Artifact bundle saved to cache"
        );

        Ok(metadata)
    }

    /// Loads the bundle only if it is complete and consistent
    pub fn load(&self) -> Result<CacheLookup> {
        let missing: Vec<ArtifactKind> = ArtifactKind::ALL
            .into_iter()
            .filter(|k| !self.path_of(*k).exists())
            .collect();
        if !missing.is_empty() {
            return Ok(CacheLookup::Miss(CacheMiss::Missing(missing)));
        }

        let metadata_bytes = match self.read_unit(ArtifactKind::Metadata)? {
            Some(bytes) => bytes,
            None => return Ok(CacheLookup::Miss(CacheMiss::Missing(vec![ArtifactKind::Metadata]))),
        };
        // Check the version before the schema it governs
        let header: MetadataHeader = from_json(ArtifactKind::Metadata, &metadata_bytes)?;
        if header.format_version != CACHE_FORMAT_VERSION {
            return Ok(CacheLookup::Miss(CacheMiss::StaleFormat {
                found: header.format_version,
            }));
        }
        let metadata: CacheMetadata = from_json(ArtifactKind::Metadata, &metadata_bytes)?;

        let mut units = Vec::with_capacity(3);
        for kind in [ArtifactKind::Classifier, ArtifactKind::Scaler, ArtifactKind::Encoder] {
            let bytes = match self.read_unit(kind)? {
                Some(bytes) => bytes,
                None => return Ok(CacheLookup::Miss(CacheMiss::Missing(vec![kind]))),
            };
            let expected = metadata.checksums.get(kind.key());
            if expected.map(String::as_str) != Some(compute_checksum(&bytes).as_str()) {
                warn!(unit = %kind, "Cached unit does not match recorded checksum");
                return Ok(CacheLookup::Miss(CacheMiss::ChecksumMismatch(kind)));
            }
            units.push(bytes);
        }

        let classifier: LinearSvm = from_json(ArtifactKind::Classifier, &units[0])?;
        let scaler: StandardScaler = from_json(ArtifactKind::Scaler, &units[1])?;
        let encoder: LabelEncoder = from_json(ArtifactKind::Encoder, &units[2])?;

        let bundle = ArtifactBundle {
            classifier,
            scaler,
            encoder,
            metadata,
        };

        if let Some(reason) = bundle.inconsistency() {
            return Ok(CacheLookup::Miss(CacheMiss::Inconsistent(reason)));
        }

        debug!(directory = %self.dir.display(), "Artifact bundle loaded from cache");
        Ok(CacheLookup::Hit(Box::new(bundle)))
    }

    /// Reports which units exist, without using them for inference
    pub fn status(&self) -> CacheStatus {
        let present = |kind| self.path_of(kind).exists();
        let files = CacheFiles {
            model: present(ArtifactKind::Classifier),
            scaler: present(ArtifactKind::Scaler),
            encoder: present(ArtifactKind::Encoder),
            metadata: present(ArtifactKind::Metadata),
        };
        let complete = files.all_present();

        let info = if complete {
            fs::read(self.path_of(ArtifactKind::Metadata))
                .ok()
                .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        } else {
            None
        };

        CacheStatus {
            enabled: self.enabled,
            directory: self.dir.clone(),
            complete,
            files,
            info,
        }
    }

    /// Removes every unit and stray temp file; returns how many were removed
    pub fn clear(&self) -> Result<usize> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| GrowthError::CacheCorrupt(format!("store lock poisoned: {}", e)))?;

        let mut removed = 0;
        // Metadata first so an interrupted clear leaves an incomplete cache
        for kind in [
            ArtifactKind::Metadata,
            ArtifactKind::Classifier,
            ArtifactKind::Scaler,
            ArtifactKind::Encoder,
        ] {
            let path = self.path_of(kind);
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Deleted cached unit");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(GrowthError::io(path, e)),
            }
        }

        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if name.to_string_lossy().starts_with(TEMP_PREFIX) {
                    if let Err(e) = fs::remove_file(entry.path()) {
                        warn!(path = %entry.path().display(), error = %e, "Failed to remove temp file");
                    }
                }
            }
        }

        info!(directory = %self.dir.display(), removed, "Artifact cache cleared");
        Ok(removed)
    }

    fn read_unit(&self, kind: ArtifactKind) -> Result<Option<Vec<u8>>> {
        let path = self.path_of(kind);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GrowthError::io(path, e)),
        }
    }

    /// Write to a unique temp file first, then rename over the final path
    fn write_atomic(&self, kind: ArtifactKind, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(kind);
        let temp_path = self.dir.join(format!(
            "{}{}.{}.{}.tmp",
            TEMP_PREFIX,
            kind.key(),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&temp_path, &path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(GrowthError::io(path, e));
        }
        Ok(())
    }
}

/// Flush directory entries so the renames survive a power loss
fn sync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| GrowthError::io(dir, e))?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value)
        .map_err(|e| GrowthError::CacheCorrupt(format!("failed to serialize artifact: {}", e)))
}

fn from_json<T: DeserializeOwned>(kind: ArtifactKind, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| GrowthError::CacheCorrupt(format!("failed to decode {}: {}", kind, e)))
}
