//! Passkey CLI - software authenticator and key tooling for passkey-gate.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use passkey_core::KeyAlgorithm;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  65  Data error (rejected response, unusable key)
  66  Input file missing or unreadable
  73  Output file exists (use --force)
  74  Cannot write output";

#[derive(Parser)]
#[command(name = "passkey")]
#[command(author, version, about = "Software passkey authenticator and key inspection", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Log progress to stderr (RUST_LOG overrides the level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    /// EdDSA over Ed25519 (COSE -8)
    Ed25519,
    /// ECDSA P-256 with SHA-256 (COSE -7)
    Es256,
}

impl From<AlgorithmArg> for KeyAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Ed25519 => KeyAlgorithm::Ed25519,
            AlgorithmArg::Es256 => KeyAlgorithm::EcdsaP256Sha256,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a software authenticator key file
    Keygen {
        /// Signature algorithm
        #[arg(short, long, value_enum, default_value = "ed25519")]
        algorithm: AlgorithmArg,

        /// Where to write the key file
        #[arg(short, long, default_value = "passkey.json")]
        output: PathBuf,

        /// Replace an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Answer registration options with a registration response
    Register {
        /// Key file written by `passkey keygen`
        #[arg(short, long)]
        key: PathBuf,

        /// Registration options JSON from POST /passkey/register/options
        #[arg(value_name = "OPTIONS")]
        options: PathBuf,

        /// Origin the browser would report, e.g. https://ledger.example
        #[arg(long)]
        origin: String,

        /// Write the response here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Answer login options with a signed assertion
    Assert {
        /// Key file written by `passkey keygen`
        #[arg(short, long)]
        key: PathBuf,

        /// Login options JSON from POST /passkey/login/options
        #[arg(value_name = "OPTIONS")]
        options: PathBuf,

        /// Origin the browser would report
        #[arg(long)]
        origin: String,

        /// Write the response here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that a stored public key decodes for its algorithm
    Inspect {
        /// COSE algorithm identifier (-8, -7 or -257)
        #[arg(short, long, allow_hyphen_values = true)]
        algorithm: i32,

        /// Stored key text (base64, base64url or PEM)
        #[arg(value_name = "PUBLIC_KEY")]
        public_key: String,

        /// Print a JSON report
        #[arg(long)]
        json: bool,
    },

    /// Verify a captured login response against a stored key
    Check {
        /// Login response JSON
        #[arg(value_name = "RESPONSE")]
        response: PathBuf,

        /// Stored key text
        #[arg(long)]
        public_key: String,

        /// COSE algorithm identifier of the stored key
        #[arg(short, long, allow_hyphen_values = true)]
        algorithm: i32,

        /// Challenge that was issued, base64url
        #[arg(long)]
        challenge: String,

        /// Relying party id
        #[arg(long)]
        rp_id: String,

        /// Expected origin; skipped when omitted
        #[arg(long)]
        origin: Option<String>,

        /// Sign count currently stored for the credential
        #[arg(long, default_value_t = 0)]
        stored_count: u64,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "passkey=debug,passkey_core=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Keygen {
            algorithm,
            output,
            force,
        } => commands::keygen::execute(algorithm.into(), output, force, quiet),
        Commands::Register {
            key,
            options,
            origin,
            output,
        } => commands::register::execute(key, options, origin, output),
        Commands::Assert {
            key,
            options,
            origin,
            output,
        } => commands::assert::execute(key, options, origin, output),
        Commands::Inspect {
            algorithm,
            public_key,
            json,
        } => commands::inspect::execute(algorithm, public_key, json),
        Commands::Check {
            response,
            public_key,
            algorithm,
            challenge,
            rp_id,
            origin,
            stored_count,
        } => commands::check::execute(
            commands::check::CheckArgs {
                response,
                public_key,
                algorithm,
                challenge,
                rp_id,
                origin,
                stored_count,
            },
            quiet,
        ),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli) {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
