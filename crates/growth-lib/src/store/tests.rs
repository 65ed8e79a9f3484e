//! Scenario tests for the artifact store
//!
//! These tests verify:
//! - Save/load round trips
//! - All-or-nothing loading when units are missing, torn or corrupt
//! - Status and clear behavior

use super::*;
use crate::predictor::Classifier;
use crate::testing::trained_bundle;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> ArtifactStore {
    ArtifactStore::new(dir.path().join("model_cache"))
}

fn expect_hit(lookup: CacheLookup) -> ArtifactBundle {
    match lookup {
        CacheLookup::Hit(bundle) => *bundle,
        CacheLookup::Miss(reason) => panic!("expected cache hit, got miss: {}", reason),
    }
}

fn expect_miss(lookup: CacheLookup) -> CacheMiss {
    match lookup {
        CacheLookup::Hit(_) => panic!("expected cache miss, got hit"),
        CacheLookup::Miss(reason) => reason,
    }
}

mod round_trip_tests {
    use super::*;

    #[test]
    fn test_save_then_load_predicts_identically() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let bundle = trained_bundle();

        store.save(&bundle).unwrap();
        let loaded = expect_hit(store.load().unwrap());

        assert_eq!(loaded.classifier, bundle.classifier);
        assert_eq!(loaded.scaler, bundle.scaler);
        assert_eq!(loaded.encoder, bundle.encoder);

        let samples = [[0.0, 1.0, 45.0], [12.0, 0.0, 60.0], [12.0, 1.0, 95.0], [60.0, 0.0, 120.0]];
        for raw in samples {
            let features = crate::models::FeatureVector(raw);
            let a = bundle.classifier.predict(&bundle.scaler.transform(&features)).unwrap();
            let b = loaded.classifier.predict(&loaded.scaler.transform(&features)).unwrap();
            assert_eq!(a, b, "prediction differs for {:?}", raw);
        }
    }

    #[test]
    fn test_save_records_checksums_and_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        assert!(!store.directory().exists());

        let metadata = store.save(&trained_bundle()).unwrap();
        assert!(store.directory().exists());
        assert_eq!(metadata.checksums.len(), 3);
        for key in ["model", "scaler", "encoder"] {
            assert_eq!(metadata.checksums[key].len(), 64);
        }
    }

    #[test]
    fn test_save_overwrites_previous_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let bundle = trained_bundle();
        store.save(&bundle).unwrap();
        store.save(&bundle).unwrap();

        let names: Vec<String> = fs::read_dir(store.directory())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 4, "unexpected files: {:?}", names);
        assert!(store.load().unwrap().is_hit());
    }
}

mod completeness_tests {
    use super::*;

    #[test]
    fn test_empty_directory_is_miss() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let miss = expect_miss(store.load().unwrap());
        assert_eq!(miss, CacheMiss::Missing(ArtifactKind::ALL.to_vec()));
    }

    #[test]
    fn test_each_missing_unit_is_miss() {
        for kind in ArtifactKind::ALL {
            let temp_dir = TempDir::new().unwrap();
            let store = store_in(&temp_dir);
            store.save(&trained_bundle()).unwrap();

            fs::remove_file(store.path_of(kind)).unwrap();
            let miss = expect_miss(store.load().unwrap());
            assert_eq!(miss, CacheMiss::Missing(vec![kind]));
        }
    }

    #[test]
    fn test_torn_save_is_checksum_miss() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        store.save(&trained_bundle()).unwrap();

        // A crash between publishing a new scaler and the new metadata
        let scaler: StandardScaler =
            serde_json::from_slice(&fs::read(store.path_of(ArtifactKind::Scaler)).unwrap()).unwrap();
        fs::write(
            store.path_of(ArtifactKind::Scaler),
            serde_json::to_vec(&scaler).unwrap(),
        )
        .unwrap();

        let miss = expect_miss(store.load().unwrap());
        assert_eq!(miss, CacheMiss::ChecksumMismatch(ArtifactKind::Scaler));
    }

    #[test]
    fn test_stale_format_is_miss() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let mut bundle = trained_bundle();
        bundle.metadata.format_version = CACHE_FORMAT_VERSION + 1;
        store.save(&bundle).unwrap();

        let miss = expect_miss(store.load().unwrap());
        assert_eq!(
            miss,
            CacheMiss::StaleFormat {
                found: CACHE_FORMAT_VERSION + 1
            }
        );
    }

    #[test]
    fn test_older_schema_is_stale_not_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        store.save(&trained_bundle()).unwrap();

        let path = store.path_of(ArtifactKind::Metadata);
        let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let object = value.as_object_mut().unwrap();
        object.insert("format_version".to_string(), serde_json::json!(0));
        object.remove("sex_mapping");
        fs::write(&path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();

        assert_eq!(
            expect_miss(store.load().unwrap()),
            CacheMiss::StaleFormat { found: 0 }
        );
    }

    #[test]
    fn test_unversioned_metadata_is_stale() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        store.save(&trained_bundle()).unwrap();
        fs::write(
            store.path_of(ArtifactKind::Metadata),
            br#"{"algorithm": "svm", "classes": ["Normal", "Stunted"]}"#,
        )
        .unwrap();

        assert_eq!(
            expect_miss(store.load().unwrap()),
            CacheMiss::StaleFormat { found: 0 }
        );
    }

    #[test]
    fn test_inconsistent_class_count_is_miss() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let mut bundle = trained_bundle();
        bundle.metadata.n_classes = 3;
        bundle.metadata.classes.push("Tinggi".to_string());
        store.save(&bundle).unwrap();

        assert!(matches!(
            expect_miss(store.load().unwrap()),
            CacheMiss::Inconsistent(_)
        ));
    }

    #[test]
    fn test_unreadable_metadata_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        store.save(&trained_bundle()).unwrap();
        fs::write(store.path_of(ArtifactKind::Metadata), b"{ not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, GrowthError::CacheCorrupt(_)));
    }

    #[test]
    fn test_checksum_valid_but_undecodable_unit_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let metadata = store.save(&trained_bundle()).unwrap();

        let garbage = b"\"not an encoder\"";
        fs::write(store.path_of(ArtifactKind::Encoder), garbage).unwrap();
        let mut metadata = metadata;
        metadata
            .checksums
            .insert("encoder".to_string(), compute_checksum(garbage));
        fs::write(
            store.path_of(ArtifactKind::Metadata),
            serde_json::to_vec_pretty(&metadata).unwrap(),
        )
        .unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, GrowthError::CacheCorrupt(_)));
        assert!(err.to_string().contains("encoder"));
    }
}

mod status_tests {
    use super::*;

    #[test]
    fn test_status_reports_files_and_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        let status = store.status();
        assert!(status.enabled);
        assert!(!status.complete);
        assert!(status.info.is_none());

        store.save(&trained_bundle()).unwrap();
        let status = store.status();
        assert!(status.complete);
        assert!(status.files.all_present());
        let info = status.info.unwrap();
        assert_eq!(info.n_features, 3);
        assert_eq!(info.classes, vec!["Normal", "Stunted"]);
    }

    #[test]
    fn test_status_partial_cache() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        store.save(&trained_bundle()).unwrap();
        fs::remove_file(store.path_of(ArtifactKind::Encoder)).unwrap();

        let status = store.status();
        assert!(!status.complete);
        assert!(status.files.model);
        assert!(!status.files.encoder);
        assert!(status.info.is_none());
    }

    #[test]
    fn test_clear_removes_units_and_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        store.save(&trained_bundle()).unwrap();
        fs::write(store.directory().join(".growth_model.1.0.tmp"), b"partial").unwrap();

        assert_eq!(store.clear().unwrap(), 4);
        assert!(fs::read_dir(store.directory()).unwrap().next().is_none());
        assert!(!store.load().unwrap().is_hit());

        // Clearing an already-empty cache is fine
        assert_eq!(store.clear().unwrap(), 0);
    }

    #[test]
    fn test_sync_dir_requires_existing_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(sync_dir(temp_dir.path()).is_ok());
        #[cfg(unix)]
        assert!(matches!(
            sync_dir(&temp_dir.path().join("absent")),
            Err(GrowthError::Io { .. })
        ));
    }

    #[test]
    fn test_clear_without_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        assert_eq!(store.clear().unwrap(), 0);
    }
}
