//! Volume library seam
//!
//! The dispatcher only talks to the disk encryption library through the
//! [`VolumeLibrary`] and [`VolumeDevice`] traits. The production binding is
//! [`CryptsetupLibrary`]; tests substitute an in-memory double.
//!
//! A device handle is released when its value is dropped, so every return
//! path out of an operation frees it exactly once.

mod cryptsetup;

pub use cryptsetup::{CryptsetupDevice, CryptsetupLibrary};

use crate::config::SecurityPolicy;
use crate::error::LibraryError;
use std::io::{self, Write};
use std::path::Path;

/// Result of a raw library call
pub type LibraryResult<T> = std::result::Result<T, LibraryError>;

/// Acquires device handles from the library
pub trait VolumeLibrary {
    type Device: VolumeDevice;

    /// Handle for a block device path
    fn init(&self, path: &Path) -> LibraryResult<Self::Device>;

    /// Handle for an active mapping
    fn init_by_name(&self, name: &str) -> LibraryResult<Self::Device>;
}

/// Operations on an acquired device handle
pub trait VolumeDevice {
    /// Write a fresh LUKS2 header using `policy`, generating a new volume key
    fn format(&mut self, policy: &SecurityPolicy) -> LibraryResult<()>;

    /// Wrap the volume key created by [`VolumeDevice::format`] under
    /// `passphrase` in `keyslot`; returns the slot actually used
    fn add_keyslot(&mut self, keyslot: u32, passphrase: &[u8]) -> LibraryResult<u32>;

    /// Read the existing header, detecting its format
    fn load(&mut self) -> LibraryResult<()>;

    /// Unlock with `passphrase` (any keyslot) and map as `name`;
    /// returns the keyslot that opened
    fn activate(&mut self, name: &str, passphrase: &[u8]) -> LibraryResult<u32>;

    /// Remove the mapping `name`
    fn deactivate(&mut self, name: &str) -> LibraryResult<()>;

    /// On-disk format name, e.g. `LUKS2`
    fn format_type(&mut self) -> Option<String>;
}

/// Where library diagnostic lines go.
///
/// Chosen once from the verbose flag and handed to the library binding when
/// it is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryLog {
    /// Print library lines on standard output
    Forward,
    /// Drop library lines
    Discard,
}

impl LibraryLog {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            LibraryLog::Forward
        } else {
            LibraryLog::Discard
        }
    }

    /// Emit one library line to `out` according to this sink
    pub fn write_line<W: Write>(self, message: &str, out: &mut W) -> io::Result<()> {
        match self {
            LibraryLog::Discard => Ok(()),
            LibraryLog::Forward => {
                // Library lines usually carry their own newline
                out.write_all(message.as_bytes())?;
                if !message.ends_with('\n') {
                    out.write_all(b"\n")?;
                }
                out.flush()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discard_writes_nothing() {
        let mut out = Vec::new();
        LibraryLog::from_verbose(false)
            .write_line("Key slot 0 created.\n", &mut out)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_forward_writes_line() {
        let mut out = Vec::new();
        let log = LibraryLog::from_verbose(true);
        log.write_line("Key slot 0 created.\n", &mut out).unwrap();
        log.write_line("No key available with this passphrase.", &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Key slot 0 created.\nNo key available with this passphrase.\n"
        );
    }
}
