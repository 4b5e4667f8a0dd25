//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (SKYNAV_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the "<SKYNAV_SW_ROOT>/params" directory
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError> 
where
    P: DeserializeOwned
{
    // Get the params dir
    let mut path = crate::host::get_skynav_sw_root()
        .map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    path.push(param_file_path);

    load_from(path)
}

/// Load a parameter file from an explicit path.
pub fn load_from<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>
{
    // Load the file into a string
    let params_str = read_to_string(path)
        .map_err(LoadError::FileLoadError)?;

    // Parse the string into the parameter struct
    toml::from_str(params_str.as_str())
        .map_err(LoadError::DeserialiseError)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct TestParams {
        speed_ms: f64,
        enabled: bool
    }

    #[test]
    fn test_load_from() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "speed_ms = 0.2\nenabled = true").unwrap();

        let params: TestParams = load_from(file.path()).unwrap();

        assert_eq!(params.speed_ms, 0.2);
        assert!(params.enabled);
    }

    #[test]
    fn test_load_from_errors() {
        let missing: Result<TestParams, _> = load_from("/this/path/does/not/exist.toml");
        assert!(matches!(missing, Err(LoadError::FileLoadError(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "speed_ms = \"fast\"").unwrap();

        let bad: Result<TestParams, _> = load_from(file.path());
        assert!(matches!(bad, Err(LoadError::DeserialiseError(_))));
    }
}
