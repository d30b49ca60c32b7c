use std::{fs, path::Path};

use serde::de::DeserializeOwned;

use crate::error::ServiceError;

pub const MODEL_BASENAME: &str = "model";

/// Serialization formats attempted when loading an artifact, in preference
/// order. The first one that deserializes cleanly wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Bincode,
}

impl ArtifactFormat {
    pub const PREFERENCE_ORDER: [ArtifactFormat; 2] =
        [ArtifactFormat::Json, ArtifactFormat::Bincode];

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Json => "json",
            ArtifactFormat::Bincode => "bin",
        }
    }

    fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, String> {
        match self {
            ArtifactFormat::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            ArtifactFormat::Bincode => bincode::deserialize(bytes).map_err(|e| e.to_string()),
        }
    }
}

/// Loads an estimator from `dir`, trying `model.json` then `model.bin`.
///
/// Only a deserialization error advances to the next format; an I/O failure
/// on an existing file aborts the load outright instead of being mistaken
/// for a wrong-format artifact.
pub fn load_estimator<T: DeserializeOwned>(dir: &Path) -> Result<T, ServiceError> {
    let mut attempted = Vec::new();

    for format in ArtifactFormat::PREFERENCE_ORDER {
        let path = dir.join(format!("{MODEL_BASENAME}.{}", format.extension()));
        attempted.push(path.display().to_string());
        if !path.exists() {
            continue;
        }

        let bytes = fs::read(&path)?;
        match format.decode(&bytes) {
            Ok(estimator) => return Ok(estimator),
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "artifact did not deserialize, trying next format");
            }
        }
    }

    Err(ServiceError::LoadFailure {
        source_dir: dir.display().to_string(),
        attempted: attempted.join(", "),
    })
}
