//! Error types for lukscrypt

use std::io::{self, Write};
use thiserror::Error;

use crate::config::exit;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// A failed call into the disk encryption library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation}: {message}")]
pub struct LibraryError {
    /// Library entry point that failed (e.g. `crypt_format`)
    pub operation: &'static str,

    /// Error text reported by the library
    pub message: String,
}

impl LibraryError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        LibraryError {
            operation,
            message: message.into(),
        }
    }
}

/// Main error type for lukscrypt
#[derive(Error, Debug)]
pub enum Error {
    // Library call sites, one per failure class
    #[error("Failed to initialize device {target}: {source}")]
    Init {
        target: String,
        #[source]
        source: LibraryError,
    },

    #[error("Failed to format device {device}: {source}")]
    Format {
        device: String,
        #[source]
        source: LibraryError,
    },

    #[error("Failed to set password on device {device}: {source}")]
    Passphrase {
        device: String,
        #[source]
        source: LibraryError,
    },

    #[error("Failed to deactivate device {name}: {source}")]
    Deactivate {
        name: String,
        #[source]
        source: LibraryError,
    },

    #[error("Failed to activate device {device} by passphrase: {source}")]
    Activate {
        device: String,
        #[source]
        source: LibraryError,
    },

    #[error("Failed to load device {device}: {source}")]
    Load {
        device: String,
        #[source]
        source: LibraryError,
    },

    // Terminal errors
    #[error("Failed to read password for {device}: {reason}")]
    Prompt { device: String, reason: String },

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Init { .. } => exit::EINIT,
            Error::Format { .. } => exit::EFORM,
            Error::Passphrase { .. } | Error::Prompt { .. } => exit::EPASS,
            Error::Deactivate { .. } => exit::EDEAC,
            Error::Activate { .. } => exit::EACTP,
            Error::Load { .. } => exit::ELOAD,
            Error::Config(_)
            | Error::InvalidConfig(_)
            | Error::Io(_)
            | Error::Serialization(_) => exit::ECONF,
        }
    }

    /// Write the one-line `Error: <message>` report
    pub fn report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Error: {}", self)?;
        out.flush()
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lib_err() -> LibraryError {
        LibraryError::new("crypt_init", "No such file or directory (os error 2)")
    }

    #[test]
    fn test_exit_codes_per_class() {
        let cases = [
            (Error::Init { target: "/dev/loop0".into(), source: lib_err() }, 11),
            (Error::Format { device: "/dev/loop0".into(), source: lib_err() }, 12),
            (Error::Passphrase { device: "/dev/loop0".into(), source: lib_err() }, 13),
            (Error::Deactivate { name: "vol1".into(), source: lib_err() }, 14),
            (Error::Activate { device: "/dev/loop0".into(), source: lib_err() }, 15),
            (Error::Load { device: "/dev/loop0".into(), source: lib_err() }, 16),
        ];

        for (err, code) in cases {
            assert_eq!(err.exit_code(), code, "{}", err);
        }
    }

    #[test]
    fn test_prompt_failure_is_passphrase_class() {
        let err = Error::Prompt {
            device: "/dev/loop0".into(),
            reason: "not a tty".into(),
        };
        assert_eq!(err.exit_code(), 13);
    }

    #[test]
    fn test_message_names_target() {
        let err = Error::Deactivate {
            name: "vol1".into(),
            source: lib_err(),
        };
        let msg = err.to_string();
        assert!(msg.contains("vol1"));
        assert!(msg.contains("crypt_init"));
    }

    #[test]
    fn test_report_line() {
        let err = Error::Activate {
            device: "/dev/loop0".into(),
            source: LibraryError::new("crypt_activate_by_passphrase", "Operation not permitted"),
        };

        let mut out = Vec::new();
        err.report(&mut out).unwrap();

        let line = String::from_utf8(out).unwrap();
        assert!(line.starts_with("Error: Failed to activate device /dev/loop0 by passphrase"));
        assert!(line.ends_with('\n'));
        assert_eq!(line.lines().count(), 1);
    }

    #[test]
    fn test_config_errors_exit_one() {
        assert_eq!(Error::InvalidConfig("bad".into()).exit_code(), 1);
        let io = Error::from(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert_eq!(io.exit_code(), 1);
    }
}
