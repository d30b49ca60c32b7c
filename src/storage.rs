use std::path::PathBuf;

use crate::error::ServiceError;

/// Resolves a configured model source to a local directory.
///
/// Plain paths and `file://` URIs are supported; anything else is rejected
/// with the unrecognized scheme in the message so a misconfigured registry
/// fails loudly on first load rather than at startup.
pub fn download(location: &str) -> Result<PathBuf, ServiceError> {
    let path = if let Some(rest) = location.strip_prefix("file://") {
        PathBuf::from(rest)
    } else if let Some((scheme, _)) = location.split_once("://") {
        return Err(ServiceError::Storage(format!(
            "unsupported storage scheme {scheme:?} in {location:?}"
        )));
    } else {
        PathBuf::from(location)
    };

    if !path.is_dir() {
        return Err(ServiceError::Storage(format!(
            "model source directory missing: {}",
            path.display()
        )));
    }
    Ok(path)
}
