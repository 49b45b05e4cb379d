//! Command-line arguments and key selection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use envelope::{key::Base64Key, CipherKey, KeyDerivation, KeyFile, KeySource, Pbkdf2Sha256};

/// Default PBKDF2 round count for passphrase-derived keys.
pub const DEFAULT_KDF_ITERATIONS: u32 = 600_000;

/// Top-level command line.
#[derive(Debug, Parser)]
#[command(name = "envelope-cli")]
#[command(about = "Encrypt and decrypt files as AES-256-CBC envelopes")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Tracing log level.
    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Wrap a file in a fresh envelope.
    Encrypt(PipeArgs),
    /// Open an envelope file.
    Decrypt(PipeArgs),
    /// Generate a random key and write it to a new key file.
    Keygen(KeygenArgs),
}

/// Input, output and key for `encrypt` / `decrypt`.
#[derive(Debug, Args)]
pub struct PipeArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// File to read.
    #[arg(short, long)]
    pub input: PathBuf,

    /// File to write. Removed again if the run fails.
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Where the encryption key comes from. Exactly one source must be given.
#[derive(Args)]
pub struct KeyArgs {
    /// JSON key file with a base64 `EncryptionKey` field.
    #[arg(long, env = "ENCRYPTION_KEY_PATH")]
    pub key_file: Option<PathBuf>,

    /// Base64-encoded 32-byte key.
    #[arg(long, env = "ENCRYPTION_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Passphrase stretched with PBKDF2-HMAC-SHA256.
    #[arg(long, env = "ENCRYPTION_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Salt for `--passphrase`.
    #[arg(long, env = "ENCRYPTION_SALT")]
    pub salt: Option<String>,

    /// PBKDF2 rounds for `--passphrase`.
    #[arg(long, default_value_t = DEFAULT_KDF_ITERATIONS)]
    pub iterations: u32,
}

impl std::fmt::Debug for KeyArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("KeyArgs")
            .field("key_file", &self.key_file)
            .field("key", &redact(&self.key))
            .field("passphrase", &redact(&self.passphrase))
            .field("salt", &self.salt)
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl KeyArgs {
    /// Validate the selection and resolve it to a key.
    ///
    /// # Errors
    ///
    /// Returns an error if zero or several sources are given, or if the chosen
    /// source fails to produce a key.
    pub fn load(&self) -> Result<CipherKey> {
        self.validate()?;

        if let Some(path) = &self.key_file {
            return KeyFile::new(path)
                .load()
                .with_context(|| format!("failed to load key file {}", path.display()));
        }
        if let Some(encoded) = &self.key {
            return Base64Key::new(encoded.as_str())
                .load()
                .context("failed to decode --key");
        }

        let passphrase = self.passphrase.as_deref().unwrap_or_default();
        let salt = self.salt.as_deref().unwrap_or_default();
        Pbkdf2Sha256
            .derive_key(passphrase.as_bytes(), salt.as_bytes(), self.iterations)
            .context("failed to derive key from passphrase")
    }

    fn validate(&self) -> Result<()> {
        let given = [
            self.key_file.is_some(),
            self.key.is_some(),
            self.passphrase.is_some(),
        ]
        .into_iter()
        .filter(|given| *given)
        .count();

        match given {
            0 => anyhow::bail!("one of --key-file, --key or --passphrase is required"),
            1 => {}
            _ => anyhow::bail!("--key-file, --key and --passphrase are mutually exclusive"),
        }
        if self.passphrase.is_some() && self.salt.as_deref().map_or(true, str::is_empty) {
            anyhow::bail!("--passphrase requires a non-empty --salt");
        }
        Ok(())
    }
}

/// Arguments for `keygen`.
#[derive(Debug, Args)]
pub struct KeygenArgs {
    /// Key file to create. Never overwritten.
    #[arg(short, long)]
    pub output: PathBuf,
}
