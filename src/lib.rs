//! lukscrypt - format, open and close LUKS2 block devices
//!
//! All cryptography, header handling and device-mapper work is done by
//! libcryptsetup. This crate parses the command line, reads the passphrase,
//! applies the security policy and maps library failures to exit statuses.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod passphrase;
pub mod volume;

pub use config::SecurityPolicy;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cli::{Cli, Operation};
    pub use crate::config::SecurityPolicy;
    pub use crate::dispatch::Dispatcher;
    pub use crate::error::{Error, Result};
    pub use crate::volume::{VolumeDevice, VolumeLibrary};
}
