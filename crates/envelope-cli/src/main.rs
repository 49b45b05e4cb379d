//! `envelope-cli`: stream files through the envelope codec.
//!
//! Startup sequence:
//! 1. Parse arguments (flags fall back to environment variables).
//! 2. Initialise structured JSON logging on stderr.
//! 3. Resolve the key and run the selected command.

mod config;
mod pipe;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use envelope::CipherKey;
use tracing::info;

use config::{Cli, Command};
use pipe::Direction;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Arguments
    // -----------------------------------------------------------------------
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cli.log_level)?;

    // -----------------------------------------------------------------------
    // 3. Command
    // -----------------------------------------------------------------------
    match cli.command {
        Command::Encrypt(args) => {
            let key = args.key.load()?;
            pipe::run(Direction::Encrypt, &key, &args.input, &args.output).await?;
        }
        Command::Decrypt(args) => {
            let key = args.key.load()?;
            pipe::run(Direction::Decrypt, &key, &args.input, &args.output).await?;
        }
        Command::Keygen(args) => {
            envelope::KeyFile::new(&args.output)
                .create(&CipherKey::generate())
                .with_context(|| format!("failed to write key file {}", args.output.display()))?;
            info!(output = %args.output.display(), "key file written");
        }
    }

    Ok(())
}
