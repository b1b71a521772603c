// Command line harness
// Builds the configuration, runs the round trip against the software
// provider and prints the recovered block with a verdict.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::ProbeConfig;
use crate::keys::KeyLifecycleManager;
use crate::probe::{run_probe, REFERENCE_INPUT};
use crate::provider::SoftwareProvider;
use crate::verify::format_hex_bytes;

/// Observe the PKCS#1 v1.5 padding an RSA key-exchange key produces
#[derive(Parser, Debug)]
#[command(name = "rsa-pad-probe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding key store files
    #[arg(long, global = true)]
    pub store_root: Option<PathBuf>,

    /// Key store name
    #[arg(long, global = true)]
    pub store_name: Option<String>,

    /// Modulus size for a newly generated key pair
    #[arg(long, global = true)]
    pub key_bits: Option<u32>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Round trip the input and check the recovered padding layout (default).
    Run {
        /// Input bytes as hex instead of the built-in 48-byte vector.
        #[arg(long)]
        input_hex: Option<String>,
    },

    /// Print the key store name and key size, creating them if needed.
    KeyInfo,
}

/// What a successful invocation found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Expected,
    Unexpected,
}

impl Cli {
    /// Defaults, then config file, then environment, then flags
    pub fn load_config(&self) -> Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::from_file(path)?,
            None => ProbeConfig::default(),
        };
        config.apply_env()?;

        if let Some(root) = &self.store_root {
            config.store_root = root.clone();
        }
        if let Some(name) = &self.store_name {
            config.store_name = name.clone();
        }
        if let Some(bits) = self.key_bits {
            config.key_bits = bits;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Parse hex input, ignoring whitespace, commas and `0x` prefixes
pub fn parse_input_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|tok| tok.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    hex::decode(&digits).with_context(|| format!("invalid hex input `{}`", text))
}

pub fn execute<W: Write>(cli: &Cli, out: &mut W) -> Result<Outcome> {
    let config = cli.load_config()?;
    tracing::debug!(?config, "loaded configuration");
    let provider = SoftwareProvider::new(&config.store_root);

    match &cli.command {
        None => run_round_trip(&provider, &config, None, out),
        Some(Commands::Run { input_hex }) => {
            run_round_trip(&provider, &config, input_hex.as_deref(), out)
        }
        Some(Commands::KeyInfo) => {
            let manager = KeyLifecycleManager::from_config(&provider, &config);
            let key = manager.acquire_exchange_key_pair(&config.store_name)?;
            let bits = key.bit_length()?;
            writeln!(out, "store: {}", key.store_name())?;
            writeln!(out, "root: {}", provider.root().display())?;
            writeln!(out, "key bits: {}", bits)?;
            Ok(Outcome::Expected)
        }
    }
}

fn run_round_trip<W: Write>(
    provider: &SoftwareProvider,
    config: &ProbeConfig,
    input_hex: Option<&str>,
    out: &mut W,
) -> Result<Outcome> {
    let input = match input_hex {
        Some(text) => parse_input_hex(text)?,
        None => REFERENCE_INPUT.to_vec(),
    };

    let recovered = run_probe(provider, config, &input)
        .with_context(|| format!("round trip against key store `{}`", config.store_name))?;

    let report = recovered.verify(&input);
    writeln!(out, "{}", format_hex_bytes(&recovered.into_inner()))?;

    if report.is_expected() {
        writeln!(out, "\nThis is the expected result.")?;
        Ok(Outcome::Expected)
    } else {
        writeln!(out, "\n** NOTE WELL: THIS IS NOT THE EXPECTED RESULT **")?;
        for violation in report.violations() {
            writeln!(out, "  - {}", violation)?;
        }
        tracing::warn!(
            violations = report.violations().len(),
            "recovered block does not match the block-type-2 layout"
        );
        Ok(Outcome::Unexpected)
    }
}
