use std::path::{Path, PathBuf};

use base64::Engine;

use crate::error::{ConfigError, Error, Result};

/// Returns the config path from `$HOME/.kube/config`.
pub fn default_kubeconfig_path() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(".kube").join("config"))
}

/// Resolve inline base64 data or a referenced file into raw bytes.
///
/// Inline data wins over a file reference when both are present.
pub fn data_or_file<P: AsRef<Path>>(data: &Option<String>, file: &Option<P>) -> Result<Vec<u8>> {
    match (data, file) {
        (Some(d), _) => base64::engine::general_purpose::STANDARD
            .decode(d)
            .map_err(ConfigError::Base64Decode)
            .map_err(Error::Config),
        (_, Some(f)) => read_file(f),
        _ => Err(Error::Config(ConfigError::NoBase64FileOrData)),
    }
}

pub fn read_file<P: AsRef<Path>>(file: P) -> Result<Vec<u8>> {
    std::fs::read(&file).map_err(|source| {
        Error::Config(ConfigError::ReadFile {
            path: file.as_ref().into(),
            source,
        })
    })
}

pub fn read_file_to_string<P: AsRef<Path>>(file: P) -> Result<String> {
    std::fs::read_to_string(&file).map_err(|source| {
        Error::Config(ConfigError::ReadFile {
            path: file.as_ref().into(),
            source,
        })
    })
}

/// Split a PEM bundle into DER certificates.
pub fn certs(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    Ok(pem::parse_many(data)
        .map_err(ConfigError::ParseCertificates)
        .map_err(Error::Config)?
        .into_iter()
        .filter(|p| p.tag() == "CERTIFICATE")
        .map(|p| p.into_contents())
        .collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_data_wins_over_file() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(b"hello");
        let blob = data_or_file(&Some(b64), &Some("/nonexistent/path")).unwrap();
        assert_eq!(blob, b"hello");
    }

    #[test]
    fn neither_data_nor_file_is_an_error() {
        let err = data_or_file::<&str>(&None, &None).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::NoBase64FileOrData)
        ));
    }
}
