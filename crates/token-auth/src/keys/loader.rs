//! Key file loading with format detection.
//!
//! The file is read exactly once, then decoded under each configured format in
//! order until one succeeds. Loading is synchronous: it happens at startup,
//! never on the request path.

use crate::errors::AuthError;
use crate::keys::{KeyFormat, PrivateKey, DEFAULT_FORMAT_ORDER};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Location of a private key file. The path is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKeyFile {
    path: PathBuf,
}

impl PrivateKeyFile {
    /// # Errors
    ///
    /// Returns `AuthError::InvalidPrivateKeyFile` if `path` is empty.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(AuthError::InvalidPrivateKeyFile);
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw file contents.
    ///
    /// # Errors
    ///
    /// - `PrivateKeyFileNotFound` if nothing exists at the path
    /// - `PrivateKeyFileReadError` for any other I/O failure (permissions,
    ///   path is a directory, ...)
    pub fn read(&self) -> Result<Vec<u8>, AuthError> {
        std::fs::read(&self.path).map_err(|e| {
            let path = self.path.display().to_string();
            if e.kind() == ErrorKind::NotFound {
                tracing::error!(target: "auth.keys", path = %path, "Private key file not found");
                AuthError::PrivateKeyFileNotFound(path)
            } else {
                tracing::error!(target: "auth.keys", path = %path, error = %e, "Failed to read private key file");
                AuthError::PrivateKeyFileReadError(format!("{path}: {e}"))
            }
        })
    }
}

/// A decoded private key plus how and when it was loaded.
#[derive(Debug, Clone)]
pub struct LoadedPrivateKey {
    key: PrivateKey,
    format: KeyFormat,
    loaded_at: DateTime<Utc>,
}

impl LoadedPrivateKey {
    pub fn key(&self) -> &PrivateKey {
        &self.key
    }

    /// The format that successfully decoded the file.
    pub fn format(&self) -> KeyFormat {
        self.format
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Decodes key files by trying formats in a fixed priority order.
#[derive(Debug, Clone)]
pub struct KeyFormatLoader {
    formats: Vec<KeyFormat>,
}

impl Default for KeyFormatLoader {
    fn default() -> Self {
        Self {
            formats: DEFAULT_FORMAT_ORDER.to_vec(),
        }
    }
}

impl KeyFormatLoader {
    /// Loader with the default `RSA_PEM → PKCS8_PEM → RSA_DER → PKCS8_DER` order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader with an explicit trial order (e.g. to opt into `EcdsaPem`).
    pub fn with_formats(formats: Vec<KeyFormat>) -> Self {
        Self { formats }
    }

    pub fn formats(&self) -> &[KeyFormat] {
        &self.formats
    }

    /// Read and decode a key file.
    ///
    /// # Errors
    ///
    /// File errors from [`PrivateKeyFile::read`], or `PrivateKeyParseError`
    /// once every format has been tried.
    pub fn load(&self, file: &PrivateKeyFile) -> Result<LoadedPrivateKey, AuthError> {
        let bytes = file.read()?;
        let (key, format) = self.decode(&bytes)?;

        tracing::info!(
            target: "auth.keys",
            path = %file.path().display(),
            format = %format,
            "Private key loaded"
        );

        Ok(LoadedPrivateKey {
            key,
            format,
            loaded_at: Utc::now(),
        })
    }

    /// Decode raw key bytes, returning the key and the format that matched.
    ///
    /// # Errors
    ///
    /// Returns `PrivateKeyParseError` naming every attempted format if none
    /// of them decodes the bytes.
    pub fn decode(&self, bytes: &[u8]) -> Result<(PrivateKey, KeyFormat), AuthError> {
        for format in &self.formats {
            match format.decode(bytes) {
                Ok(key) => return Ok((key, *format)),
                Err(reason) => {
                    tracing::debug!(
                        target: "auth.keys",
                        format = %format,
                        reason = %reason,
                        "Key format did not match, trying next"
                    );
                }
            }
        }

        let attempted = self
            .formats
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        tracing::error!(target: "auth.keys", attempted = %attempted, "No supported private key format matched");
        Err(AuthError::PrivateKeyParseError(format!(
            "no supported format matched (tried {attempted})"
        )))
    }
}
