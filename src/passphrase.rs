//! Passphrase entry
//!
//! Passphrases are read from the controlling terminal with echo turned off
//! and held in zeroizing buffers until the operation that needs them ends.

use std::fmt;
use std::io;
use zeroize::Zeroizing;

/// A passphrase held only for the duration of one operation
pub struct Passphrase {
    bytes: Zeroizing<Vec<u8>>,
}

impl Passphrase {
    pub fn new(bytes: Vec<u8>) -> Self {
        Passphrase {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<String> for Passphrase {
    fn from(s: String) -> Self {
        // Takes the String's buffer, no copy
        Passphrase::new(s.into_bytes())
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

/// Something that can hand out a passphrase
pub trait PassphraseSource {
    fn read_passphrase(&mut self) -> io::Result<Passphrase>;
}

/// Reads from the controlling terminal without echo.
///
/// `rpassword` turns echo off on the tty and restores the saved terminal
/// mode when its guard drops, whether or not the read succeeded.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        TerminalPrompt
    }
}

impl PassphraseSource for TerminalPrompt {
    fn read_passphrase(&mut self) -> io::Result<Passphrase> {
        rpassword::read_password().map(Passphrase::from)
    }
}
