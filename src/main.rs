use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rsa_pad_probe::cli::{execute, Cli, Outcome};

fn main() {
    // RUST_LOG=rsa_pad_probe=debug shows each lifecycle branch taken
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rsa_pad_probe=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();

    match execute(&cli, &mut stdout) {
        Ok(Outcome::Expected) => {}
        Ok(Outcome::Unexpected) => process::exit(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
