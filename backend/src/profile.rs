//! Profile document loading.
//!
//! A default document is embedded into the binary. A path given at startup
//! replaces it; a configured document that cannot be read or parsed is a
//! startup error rather than a silent fallback.

use cv_mcp_types::Profile;
use rust_embed::RustEmbed;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// File name of the embedded default profile.
pub const DEFAULT_PROFILE_FILE: &str = "profile.json";

/// Embedded data files (default profile document)
#[derive(RustEmbed)]
#[folder = "data/"]
struct DataAssets;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Failed to read profile document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid profile document {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Embedded profile document is missing")]
    MissingEmbedded,
}

/// Load the profile from `path`, or the embedded default when `path` is `None`.
pub fn load(path: Option<&Path>) -> Result<Profile, ProfileError> {
    match path {
        Some(path) => {
            let bytes = std::fs::read(path).map_err(|source| ProfileError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let profile = parse(&bytes, &path.display().to_string())?;
            info!("Loaded profile document from {}", path.display());
            Ok(profile)
        }
        None => {
            let file = DataAssets::get(DEFAULT_PROFILE_FILE).ok_or(ProfileError::MissingEmbedded)?;
            let profile = parse(&file.data, "(embedded)")?;
            info!("Loaded embedded default profile document");
            Ok(profile)
        }
    }
}

fn parse(bytes: &[u8], origin: &str) -> Result<Profile, ProfileError> {
    serde_json::from_slice(bytes).map_err(|source| ProfileError::Parse {
        origin: origin.to_string(),
        source,
    })
}

/// Serialize the full profile document as served to clients.
pub fn to_document(profile: &Profile) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(profile)
}
