use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use camscout_core::error::AppError;
use camscout_core::models::{CameraDataset, CameraRecord, GeoPoint, MediaSource, Region};
use camscout_core::traits::DatasetSink;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// On-disk form of a [`CameraDataset`].
#[derive(Debug, Serialize, Deserialize)]
struct DatasetDocument {
    generated_at_unix_ms: i64,
    bbox: Region,
    count: usize,
    cameras: Vec<CameraDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CameraDocument {
    uri: String,
    title: Option<String>,
    active: Option<bool>,
    lon: Option<f64>,
    lat: Option<f64>,
    hls_sources: Vec<MediaSource>,
}

impl From<&CameraRecord> for CameraDocument {
    fn from(record: &CameraRecord) -> Self {
        Self {
            uri: record.id.clone(),
            title: record.title.clone(),
            active: record.active,
            lon: record.location.map(|p| p.lon),
            lat: record.location.map(|p| p.lat),
            hls_sources: record.sources.clone(),
        }
    }
}

impl From<CameraDocument> for CameraRecord {
    fn from(doc: CameraDocument) -> Self {
        let location = match (doc.lon, doc.lat) {
            (Some(lon), Some(lat)) => Some(GeoPoint { lon, lat }),
            _ => None,
        };
        Self {
            id: doc.uri,
            title: doc.title,
            active: doc.active,
            location,
            sources: doc.hls_sources,
        }
    }
}

/// Writes datasets as pretty-printed JSON.
///
/// The document is written to a temporary file next to the target and then
/// renamed over it, so readers never see a half-written file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DatasetSink for JsonFileSink {
    fn write(&self, dataset: &CameraDataset) -> Result<(), AppError> {
        let document = DatasetDocument {
            generated_at_unix_ms: dataset.generated_at.timestamp_millis(),
            bbox: dataset.region,
            count: dataset.count(),
            cameras: dataset.cameras.iter().map(CameraDocument::from).collect(),
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, &document)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.persist(&self.path).map_err(|e| AppError::from(e.error))?;

        tracing::info!(path = %self.path.display(), cameras = document.count, "Wrote dataset");
        Ok(())
    }
}

/// Read a dataset previously written by [`JsonFileSink`].
pub fn read_dataset(path: impl AsRef<Path>) -> Result<CameraDataset, AppError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| AppError::IoError(format!("{}: {e}", path.display())))?;
    let document: DatasetDocument = serde_json::from_reader(BufReader::new(file))?;

    let generated_at = DateTime::from_timestamp_millis(document.generated_at_unix_ms)
        .ok_or_else(|| {
            AppError::ProtocolError(format!(
                "generated_at_unix_ms out of range: {}",
                document.generated_at_unix_ms
            ))
        })?;
    if document.count != document.cameras.len() {
        tracing::warn!(
            count = document.count,
            cameras = document.cameras.len(),
            "Dataset count does not match camera list"
        );
    }

    Ok(CameraDataset {
        generated_at,
        region: document.bbox,
        cameras: document.cameras.into_iter().map(CameraRecord::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn dataset() -> CameraDataset {
        CameraDataset {
            generated_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            region: Region::new(-109.0603, 36.9924, -102.0415, 41.0034).unwrap(),
            cameras: vec![
                CameraRecord {
                    id: "camera/5".into(),
                    title: Some("I-25 @ Colfax".into()),
                    active: Some(true),
                    location: Some(GeoPoint {
                        lon: -105.0,
                        lat: 39.74,
                    }),
                    sources: vec![MediaSource::hls("https://cdn.example.com/5.m3u8")],
                },
                CameraRecord {
                    id: "camera/9".into(),
                    title: None,
                    active: None,
                    location: None,
                    sources: vec![],
                },
            ],
        }
    }

    #[test]
    fn writes_reference_document_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.json");

        JsonFileSink::new(&path).write(&dataset()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["generated_at_unix_ms"], 1_700_000_000_123i64);
        assert_eq!(json["bbox"]["west"], -109.0603);
        assert_eq!(json["bbox"]["north"], 41.0034);
        assert_eq!(json["count"], 2);
        let first = &json["cameras"][0];
        assert_eq!(first["uri"], "camera/5");
        assert_eq!(first["lon"], -105.0);
        assert_eq!(first["lat"], 39.74);
        assert_eq!(first["hls_sources"][0]["type"], "application/x-mpegURL");
        assert_eq!(first["hls_sources"][0]["src"], "https://cdn.example.com/5.m3u8");
        assert!(json["cameras"][1]["lon"].is_null());
        assert_eq!(json["cameras"][1]["hls_sources"], serde_json::json!([]));
    }

    #[test]
    fn read_back_restores_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.json");
        let original = dataset();

        JsonFileSink::new(&path).write(&original).unwrap();
        let restored = read_dataset(&path).unwrap();

        assert_eq!(restored, original);
        assert_eq!(restored.placeable_count(), 1);
    }

    #[test]
    fn overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.json");
        let sink = JsonFileSink::new(&path);

        sink.write(&dataset()).unwrap();
        let mut smaller = dataset();
        smaller.cameras.truncate(1);
        sink.write(&smaller).unwrap();

        assert_eq!(read_dataset(&path).unwrap().count(), 1);
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("cameras.json");

        let err = JsonFileSink::new(path).write(&dataset()).unwrap_err();

        assert!(matches!(err, AppError::IoError(_)));
    }

    #[test]
    fn invalid_bbox_is_rejected_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"generated_at_unix_ms":0,"bbox":{"west":1,"south":0,"east":-1,"north":1},"count":0,"cameras":[]}"#,
        )
        .unwrap();

        let err = read_dataset(&path).unwrap_err();

        assert!(matches!(err, AppError::SerializationError(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_dataset("/nonexistent/camscout/cameras.json").unwrap_err();
        assert!(matches!(err, AppError::IoError(_)));
    }
}
