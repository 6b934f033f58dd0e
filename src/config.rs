//! Security parameter policy for lukscrypt
//!
//! The policy fixes every parameter handed to the library when a device is
//! formatted. The built-in default is what the tool ships with; a JSON file
//! can replace it for testing or for hardware with different memory limits.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current policy schema version
pub const POLICY_VERSION: u32 = 1;

/// Environment variable naming a policy file
pub const POLICY_ENV: &str = "LUKSCRYPT_POLICY";

/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "LUKSCRYPT_LOG";

/// Policy file name under the user's config directory
pub const POLICY_FILE_NAME: &str = "policy.json";

/// Default KDF time target: 2 seconds
pub const DEFAULT_KDF_TIME_MS: u32 = 2 * 1000;

/// Default KDF iteration count
pub const DEFAULT_KDF_ITERATIONS: u32 = 2;

/// Default KDF memory ceiling: 16 MiB
pub const DEFAULT_KDF_MEMORY_KIB: u32 = 16 * 1024;

/// Default KDF parallel lanes
pub const DEFAULT_KDF_THREADS: u32 = 2;

/// Default volume key size: 512 bits
pub const DEFAULT_VOLUME_KEY_BYTES: usize = 512 / 8;

/// Default data sector size
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// Process exit statuses
pub mod exit {
    /// Operation completed or usage was shown
    pub const SUCCESS: i32 = 0;
    /// Policy could not be loaded or failed validation
    pub const ECONF: i32 = 1;
    /// Device handle could not be acquired
    pub const EINIT: i32 = 11;
    /// Format failed
    pub const EFORM: i32 = 12;
    /// Passphrase could not be read or keyslot could not be added
    pub const EPASS: i32 = 13;
    /// Deactivation failed
    pub const EDEAC: i32 = 14;
    /// Activation by passphrase failed
    pub const EACTP: i32 = 15;
    /// Header load failed
    pub const ELOAD: i32 = 16;
}

/// Password-based key derivation algorithm
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KdfKind {
    /// Memory-hard Argon2, hybrid variant
    Argon2id,
    /// Memory-hard Argon2, data-independent variant
    Argon2i,
    /// PBKDF2 (no memory cost)
    Pbkdf2,
}

impl KdfKind {
    pub fn is_memory_hard(self) -> bool {
        matches!(self, KdfKind::Argon2id | KdfKind::Argon2i)
    }
}

/// Key derivation parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParams {
    /// Algorithm
    pub kind: KdfKind,

    /// Hash function name as understood by the library
    pub hash: String,

    /// Benchmark time target in milliseconds
    pub time_ms: u32,

    /// Time cost (iterations)
    pub iterations: u32,

    /// Memory ceiling in KiB
    pub max_memory_kib: u32,

    /// Parallel lanes
    pub parallel_threads: u32,

    /// Library PBKDF flag bits
    #[serde(default = "default_kdf_flags")]
    pub flags: u32,
}

fn default_kdf_flags() -> u32 {
    1
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams {
            kind: KdfKind::Argon2id,
            hash: "sha512".to_string(),
            time_ms: DEFAULT_KDF_TIME_MS,
            iterations: DEFAULT_KDF_ITERATIONS,
            max_memory_kib: DEFAULT_KDF_MEMORY_KIB,
            parallel_threads: DEFAULT_KDF_THREADS,
            flags: default_kdf_flags(),
        }
    }
}

/// Data encryption parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CipherParams {
    /// Cipher name
    pub cipher: String,

    /// Cipher mode including IV generator
    pub mode: String,

    /// Volume key size in bytes
    pub volume_key_bytes: usize,
}

impl Default for CipherParams {
    fn default() -> Self {
        CipherParams {
            cipher: "aes".to_string(),
            mode: "xts-plain64".to_string(),
            volume_key_bytes: DEFAULT_VOLUME_KEY_BYTES,
        }
    }
}

/// Everything the library needs to format a new volume
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityPolicy {
    /// Policy schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Key derivation for the initial keyslot
    #[serde(default)]
    pub kdf: KdfParams,

    /// Data cipher
    #[serde(default)]
    pub cipher: CipherParams,

    /// Encryption sector size in bytes
    #[serde(default = "default_sector_size")]
    pub sector_size: u32,

    /// Keyslot receiving the initial passphrase
    #[serde(default)]
    pub keyslot: u32,
}

fn default_version() -> u32 {
    POLICY_VERSION
}

fn default_sector_size() -> u32 {
    DEFAULT_SECTOR_SIZE
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        SecurityPolicy {
            version: POLICY_VERSION,
            kdf: KdfParams::default(),
            cipher: CipherParams::default(),
            sector_size: DEFAULT_SECTOR_SIZE,
            keyslot: 0,
        }
    }
}

impl SecurityPolicy {
    /// Load a policy from a JSON file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read policy file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let policy: SecurityPolicy = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse policy file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        policy.validate()?;
        Ok(policy)
    }

    /// Save the policy to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        std::fs::write(path.as_ref(), content).map_err(|e| {
            Error::Config(format!("Failed to write policy file: {}", e))
        })?;

        Ok(())
    }

    /// Pick the policy for this run.
    ///
    /// Order: the file named by `LUKSCRYPT_POLICY`, then `policy.json` in the
    /// user's config directory, then the built-in default.
    pub fn resolve() -> Result<Self> {
        let from_env = std::env::var_os(POLICY_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::resolve_from(from_env, default_policy_path())
    }

    /// Resolution with explicit candidates
    pub fn resolve_from(explicit: Option<PathBuf>, user_default: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            // A named file must exist
            return Self::load(path);
        }

        match user_default {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<()> {
        if self.version != POLICY_VERSION {
            return Err(Error::InvalidConfig(format!(
                "Unsupported policy version {} (expected {})",
                self.version, POLICY_VERSION
            )));
        }

        if self.kdf.hash.trim().is_empty() {
            return Err(Error::InvalidConfig("KDF hash is required".to_string()));
        }

        if self.kdf.iterations == 0 {
            return Err(Error::InvalidConfig(
                "KDF iterations must be greater than 0".to_string(),
            ));
        }

        if self.kdf.time_ms == 0 {
            return Err(Error::InvalidConfig(
                "KDF time target must be greater than 0".to_string(),
            ));
        }

        if self.kdf.kind.is_memory_hard() {
            if self.kdf.parallel_threads == 0 {
                return Err(Error::InvalidConfig(
                    "KDF parallel threads must be greater than 0".to_string(),
                ));
            }

            if self.kdf.max_memory_kib < 1024 || self.kdf.max_memory_kib > 4 * 1024 * 1024 {
                return Err(Error::InvalidConfig(format!(
                    "KDF memory ceiling {} KiB outside 1 MiB..=4 GiB",
                    self.kdf.max_memory_kib
                )));
            }
        }

        if self.cipher.cipher.trim().is_empty() || self.cipher.mode.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "Cipher name and mode are required".to_string(),
            ));
        }

        if self.cipher.volume_key_bytes == 0 {
            return Err(Error::InvalidConfig(
                "Volume key size must be greater than 0".to_string(),
            ));
        }

        if !self.sector_size.is_power_of_two() || !(512..=4096).contains(&self.sector_size) {
            return Err(Error::InvalidConfig(format!(
                "Sector size {} must be a power of two between 512 and 4096",
                self.sector_size
            )));
        }

        Ok(())
    }

    /// Volume key size in bits
    pub fn volume_key_bits(&self) -> usize {
        self.cipher.volume_key_bytes * 8
    }
}

/// `<config_dir>/lukscrypt/policy.json`
pub fn default_policy_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lukscrypt").join(POLICY_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_policy_values() {
        let policy = SecurityPolicy::default();

        assert_eq!(policy.kdf.kind, KdfKind::Argon2id);
        assert_eq!(policy.kdf.hash, "sha512");
        assert_eq!(policy.kdf.time_ms, 2000);
        assert_eq!(policy.kdf.iterations, 2);
        assert_eq!(policy.kdf.max_memory_kib, 16384);
        assert_eq!(policy.kdf.parallel_threads, 2);
        assert_eq!(policy.kdf.flags, 1);
        assert_eq!(policy.cipher.cipher, "aes");
        assert_eq!(policy.cipher.mode, "xts-plain64");
        assert_eq!(policy.volume_key_bits(), 512);
        assert_eq!(policy.sector_size, 512);
        assert_eq!(policy.keyslot, 0);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("policy.json");

        let mut policy = SecurityPolicy::default();
        policy.kdf.max_memory_kib = 64 * 1024;
        policy.save(&path).unwrap();

        let loaded = SecurityPolicy::load(&path).unwrap();
        assert_eq!(loaded, policy);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(&path, r#"{ "sector_size": 4096 }"#).unwrap();

        let loaded = SecurityPolicy::load(&path).unwrap();
        assert_eq!(loaded.sector_size, 4096);
        assert_eq!(loaded.kdf, KdfParams::default());
        assert_eq!(loaded.cipher, CipherParams::default());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(&path, "not json").unwrap();

        let err = SecurityPolicy::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.exit_code(), exit::ECONF);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut p = SecurityPolicy::default();
        p.kdf.iterations = 0;
        assert!(p.validate().is_err());

        let mut p = SecurityPolicy::default();
        p.kdf.max_memory_kib = 512;
        assert!(p.validate().is_err());

        let mut p = SecurityPolicy::default();
        p.cipher.mode = " ".to_string();
        assert!(p.validate().is_err());

        let mut p = SecurityPolicy::default();
        p.cipher.volume_key_bytes = 0;
        assert!(p.validate().is_err());

        let mut p = SecurityPolicy::default();
        p.sector_size = 1000;
        assert!(p.validate().is_err());

        let mut p = SecurityPolicy::default();
        p.version = 7;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_pbkdf2_ignores_memory_ceiling() {
        let mut p = SecurityPolicy::default();
        p.kdf.kind = KdfKind::Pbkdf2;
        p.kdf.max_memory_kib = 0;
        p.kdf.parallel_threads = 0;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_resolve_prefers_explicit_path() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("explicit.json");
        let user = dir.path().join("user.json");

        let mut a = SecurityPolicy::default();
        a.sector_size = 4096;
        a.save(&explicit).unwrap();
        let mut b = SecurityPolicy::default();
        b.sector_size = 2048;
        b.save(&user).unwrap();

        let resolved = SecurityPolicy::resolve_from(Some(explicit), Some(user.clone())).unwrap();
        assert_eq!(resolved.sector_size, 4096);

        let resolved = SecurityPolicy::resolve_from(None, Some(user)).unwrap();
        assert_eq!(resolved.sector_size, 2048);
    }

    #[test]
    fn test_resolve_missing_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");

        let resolved = SecurityPolicy::resolve_from(None, Some(missing.clone())).unwrap();
        assert_eq!(resolved, SecurityPolicy::default());

        assert!(SecurityPolicy::resolve_from(Some(missing), None).is_err());
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&KdfKind::Argon2id).unwrap();
        assert_eq!(json, "\"argon2id\"");
    }
}
