//! Command dispatch
//!
//! Runs exactly one [`Operation`] against a [`VolumeLibrary`]. Every library
//! call site has its own [`Error`] variant and therefore its own exit status.
//! Nothing is retried or rolled back: a device formatted by `encrypt` whose
//! keyslot could not be added stays formatted.

use crate::cli::Operation;
use crate::config::SecurityPolicy;
use crate::error::{Error, Result};
use crate::passphrase::{Passphrase, PassphraseSource};
use crate::volume::{VolumeDevice, VolumeLibrary};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Prompt printed before every passphrase read
pub const PASSWORD_PROMPT: &str = "Enter password:";

pub struct Dispatcher<L, P, W> {
    library: L,
    passphrases: P,
    out: W,
    policy: SecurityPolicy,
}

impl<L, P, W> Dispatcher<L, P, W>
where
    L: VolumeLibrary,
    P: PassphraseSource,
    W: Write,
{
    /// `out` receives prompts and status lines
    pub fn new(library: L, passphrases: P, out: W, policy: SecurityPolicy) -> Self {
        Dispatcher {
            library,
            passphrases,
            out,
            policy,
        }
    }

    /// Run one operation
    pub fn run(&mut self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::Close { name } => self.close(name),
            Operation::Encrypt { device } => self.encrypt(device),
            Operation::Open { device, name } => self.open(device, name),
        }
    }

    /// Deactivate the active mapping `name`
    pub fn close(&mut self, name: &str) -> Result<()> {
        let mut device = self.library.init_by_name(name).map_err(|source| Error::Init {
            target: name.to_string(),
            source,
        })?;

        device.deactivate(name).map_err(|source| Error::Deactivate {
            name: name.to_string(),
            source,
        })?;

        info!("Deactivated {}", name);
        Ok(())
    }

    /// Format `path` as LUKS2 and set its first passphrase
    pub fn encrypt(&mut self, path: &Path) -> Result<()> {
        let dev = path.display().to_string();

        let mut device = self.library.init(path).map_err(|source| Error::Init {
            target: dev.clone(),
            source,
        })?;

        let passphrase = self.prompt(&dev)?;

        debug!("Formatting {} with {:?}", dev, self.policy);
        device.format(&self.policy).map_err(|source| Error::Format {
            device: dev.clone(),
            source,
        })?;

        let slot = device
            .add_keyslot(self.policy.keyslot, passphrase.as_bytes())
            .map_err(|source| Error::Passphrase {
                device: dev.clone(),
                source,
            })?;
        drop(passphrase);
        debug!("Passphrase stored in keyslot {}", slot);

        let format = device
            .format_type()
            .unwrap_or_else(|| "unknown".to_string());
        writeln!(self.out, "Formatted device: {}", format)?;

        info!("Formatted {} as {}", dev, format);
        Ok(())
    }

    /// Unlock `path` and map it as `name`
    pub fn open(&mut self, path: &Path, name: &str) -> Result<()> {
        let dev = path.display().to_string();

        let mut device = self.library.init(path).map_err(|source| Error::Init {
            target: dev.clone(),
            source,
        })?;

        device.load().map_err(|source| Error::Load {
            device: dev.clone(),
            source,
        })?;

        let passphrase = self.prompt(&dev)?;

        let slot = device
            .activate(name, passphrase.as_bytes())
            .map_err(|source| Error::Activate {
                device: dev.clone(),
                source,
            })?;

        info!("Activated {} as {} (keyslot {})", dev, name, slot);
        Ok(())
    }

    fn prompt(&mut self, dev: &str) -> Result<Passphrase> {
        writeln!(self.out, "{}", PASSWORD_PROMPT)?;
        self.out.flush()?;

        self.passphrases
            .read_passphrase()
            .map_err(|e| Error::Prompt {
                device: dev.to_string(),
                reason: e.to_string(),
            })
    }
}
