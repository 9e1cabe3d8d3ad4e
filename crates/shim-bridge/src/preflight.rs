//! Path checks run before every shim invocation.

use std::io;
use std::path::Path;

use crate::error::{Result, ShimError};

/// Verify the shim executable and its configuration file are set and exist.
///
/// Emptiness is checked for both paths before existence, and the executable
/// is always checked before the configuration file. Only a definite
/// "not found" fails the existence check; other stat errors are left for the
/// spawn to report.
pub fn check(executable: &Path, config: &Path) -> Result<()> {
    if executable.as_os_str().is_empty() {
        return Err(ShimError::ShimNotConfigured);
    }

    if config.as_os_str().is_empty() {
        return Err(ShimError::ConfigNotConfigured);
    }

    if is_missing(executable) {
        return Err(ShimError::ShimNotFound(executable.to_path_buf()));
    }

    if is_missing(config) {
        return Err(ShimError::ConfigNotFound(config.to_path_buf()));
    }

    Ok(())
}

fn is_missing(path: &Path) -> bool {
    matches!(std::fs::metadata(path), Err(e) if e.kind() == io::ErrorKind::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn existing_pair(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let shim = dir.path().join("shim.sh");
        let cfg = dir.path().join("shim.cfg");
        std::fs::write(&shim, "#!/bin/sh\n").unwrap();
        std::fs::write(&cfg, "").unwrap();
        (shim, cfg)
    }

    #[test]
    fn fails_when_no_shim_is_configured() {
        let err = check(Path::new(""), Path::new("")).unwrap_err();
        assert_eq!(err.to_string(), "ruby compatibility shim was not configured");
    }

    #[test]
    fn fails_when_shim_cannot_be_found() {
        let dir = TempDir::new().unwrap();
        let (_, cfg) = existing_pair(&dir);

        let err = check(Path::new("/nonexisting"), &cfg).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ruby compatibility shim was not found in /nonexisting"
        );
    }

    #[test]
    fn fails_without_config_file() {
        let dir = TempDir::new().unwrap();
        let (shim, _) = existing_pair(&dir);

        let err = check(&shim, Path::new("")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ruby compatibility shim configuration file not configured"
        );
    }

    #[test]
    fn fails_when_config_file_does_not_exist() {
        let dir = TempDir::new().unwrap();
        let (shim, _) = existing_pair(&dir);

        let err = check(&shim, Path::new("/nonexisting")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ruby compatibility shim configuration file was not found in /nonexisting"
        );
    }

    #[test]
    fn emptiness_is_reported_before_existence() {
        let err = check(Path::new("/nonexisting"), Path::new("")).unwrap_err();
        assert!(matches!(err, ShimError::ConfigNotConfigured));
    }

    #[test]
    fn executable_is_checked_before_config() {
        let err = check(Path::new("/nonexisting"), Path::new("/also-missing")).unwrap_err();
        assert!(matches!(err, ShimError::ShimNotFound(_)));
    }

    #[test]
    fn accepts_existing_paths() {
        let dir = TempDir::new().unwrap();
        let (shim, cfg) = existing_pair(&dir);

        check(&shim, &cfg).unwrap();
    }
}
