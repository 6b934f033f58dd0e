//! libcryptsetup binding

use super::{LibraryLog, LibraryResult, VolumeDevice, VolumeLibrary};
use crate::config::{KdfKind, SecurityPolicy};
use crate::error::LibraryError;
use libc::{c_char, c_int, c_void};
use libcryptsetup_rs::{
    consts::{
        flags::{CryptActivate, CryptDeactivate, CryptPbkdf, CryptVolumeKey},
        vals::{EncryptionFormat, KdfType},
    },
    set_log_callback, CryptDevice, CryptInit, CryptParamsLuks2, CryptParamsLuks2Ref,
    CryptPbkdfType, Either, LibcryptErr,
};
use std::ffi::CStr;
use std::path::Path;
use tracing::debug;

/// Production [`VolumeLibrary`] backed by libcryptsetup.
///
/// Only constructible through [`CryptsetupLibrary::new`], which registers
/// the log callback.
pub struct CryptsetupLibrary {
    _registered: (),
}

impl CryptsetupLibrary {
    /// Bind the library and route its log lines according to `log`
    pub fn new(log: LibraryLog) -> Self {
        let callback: extern "C" fn(c_int, *const c_char, *mut c_void) = match log {
            LibraryLog::Forward => forward_line,
            LibraryLog::Discard => discard_line,
        };
        set_log_callback::<()>(None, Some(callback), None);
        debug!("libcryptsetup log sink: {:?}", log);

        CryptsetupLibrary { _registered: () }
    }
}

impl VolumeLibrary for CryptsetupLibrary {
    type Device = CryptsetupDevice;

    fn init(&self, path: &Path) -> LibraryResult<CryptsetupDevice> {
        debug!("crypt_init {}", path.display());
        let device = CryptInit::init(path).map_err(|e| lib_err("crypt_init", e))?;
        Ok(CryptsetupDevice::new(device, path.display().to_string()))
    }

    fn init_by_name(&self, name: &str) -> LibraryResult<CryptsetupDevice> {
        debug!("crypt_init_by_name {}", name);
        let device = CryptInit::init_by_name_and_header(name, None)
            .map_err(|e| lib_err("crypt_init_by_name", e))?;
        Ok(CryptsetupDevice::new(device, name.to_string()))
    }
}

/// An acquired libcryptsetup context; freed on drop
pub struct CryptsetupDevice {
    device: CryptDevice,
    target: String,
}

impl CryptsetupDevice {
    fn new(device: CryptDevice, target: String) -> Self {
        CryptsetupDevice { device, target }
    }
}

impl VolumeDevice for CryptsetupDevice {
    fn format(&mut self, policy: &SecurityPolicy) -> LibraryResult<()> {
        let params = luks2_params(policy);
        let mut params_ref: CryptParamsLuks2Ref = (&params)
            .try_into()
            .map_err(|e| lib_err("crypt_format", e))?;

        debug!(
            "crypt_format {} {}-{} {} bits, sector {}",
            self.target,
            policy.cipher.cipher,
            policy.cipher.mode,
            policy.volume_key_bits(),
            policy.sector_size
        );

        self.device
            .context_handle()
            .format::<CryptParamsLuks2Ref>(
                EncryptionFormat::Luks2,
                (policy.cipher.cipher.as_str(), policy.cipher.mode.as_str()),
                None,
                Either::Right(policy.cipher.volume_key_bytes),
                Some(&mut params_ref),
            )
            .map_err(|e| lib_err("crypt_format", e))
    }

    fn add_keyslot(&mut self, keyslot: u32, passphrase: &[u8]) -> LibraryResult<u32> {
        self.device
            .keyslot_handle()
            .add_by_key(Some(keyslot), None, passphrase, CryptVolumeKey::empty())
            .map_err(|e| lib_err("crypt_keyslot_add_by_volume_key", e))
    }

    fn load(&mut self) -> LibraryResult<()> {
        self.device
            .context_handle()
            .load::<()>(None, None)
            .map_err(|e| lib_err("crypt_load", e))
    }

    fn activate(&mut self, name: &str, passphrase: &[u8]) -> LibraryResult<u32> {
        self.device
            .activate_handle()
            .activate_by_passphrase(Some(name), None, passphrase, CryptActivate::empty())
            .map_err(|e| lib_err("crypt_activate_by_passphrase", e))
    }

    fn deactivate(&mut self, name: &str) -> LibraryResult<()> {
        self.device
            .activate_handle()
            .deactivate(name, CryptDeactivate::empty())
            .map_err(|e| lib_err("crypt_deactivate", e))
    }

    fn format_type(&mut self) -> Option<String> {
        let format = self.device.format_handle().get_type().ok()?;
        Some(format_name(format))
    }
}

impl Drop for CryptsetupDevice {
    fn drop(&mut self) {
        // CryptDevice calls crypt_free when it drops after this
        debug!("Releasing device handle for {}", self.target);
    }
}

fn luks2_params(policy: &SecurityPolicy) -> CryptParamsLuks2 {
    let pbkdf = CryptPbkdfType {
        type_: kdf_type(policy.kdf.kind),
        hash: Some(policy.kdf.hash.clone()),
        time_ms: policy.kdf.time_ms,
        iterations: policy.kdf.iterations,
        max_memory_kb: policy.kdf.max_memory_kib,
        parallel_threads: policy.kdf.parallel_threads,
        flags: CryptPbkdf::from_bits_truncate(policy.kdf.flags),
    };

    CryptParamsLuks2 {
        pbkdf: Some(pbkdf),
        integrity: None,
        integrity_params: None,
        data_alignment: 0,
        data_device: None,
        sector_size: policy.sector_size,
        label: None,
        subsystem: None,
    }
}

fn kdf_type(kind: KdfKind) -> KdfType {
    match kind {
        KdfKind::Argon2id => KdfType::Argon2Id,
        KdfKind::Argon2i => KdfType::Argon2I,
        KdfKind::Pbkdf2 => KdfType::Pbkdf2,
    }
}

fn format_name(format: EncryptionFormat) -> String {
    match format {
        EncryptionFormat::Luks2 => "LUKS2".to_string(),
        EncryptionFormat::Luks1 => "LUKS1".to_string(),
        other => format!("{:?}", other).to_uppercase(),
    }
}

fn lib_err(operation: &'static str, err: LibcryptErr) -> LibraryError {
    LibraryError::new(operation, err.to_string())
}

fn message_from_ptr(msg: *const c_char) -> Option<String> {
    if msg.is_null() {
        return None;
    }
    // Safety: libcryptsetup passes a NUL-terminated string valid for the call
    let text = unsafe { CStr::from_ptr(msg) };
    Some(text.to_string_lossy().into_owned())
}

extern "C" fn forward_line(_level: c_int, msg: *const c_char, _usrptr: *mut c_void) {
    if let Some(message) = message_from_ptr(msg) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let _ = LibraryLog::Forward.write_line(&message, &mut out);
    }
}

extern "C" fn discard_line(_level: c_int, _msg: *const c_char, _usrptr: *mut c_void) {}
