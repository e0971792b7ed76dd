mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::create::CreateArgs;
use commands::{Failure, EXIT_FAILURE, MAX_VERBOSITY};
use distronode_core::constants::{CONTAINERFILE_NAME, DEFAULT_CONTEXT_DIR, DOCKERFILE_NAME};
use distronode_core::Engine;
use distronode_schema::DEFAULT_DEFINITION_FILE;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "distronode-builder",
    version,
    about = "Compile execution environment definitions into container build contexts"
)]
struct Cli {
    /// Output verbosity, 0 to 3.
    #[arg(short = 'v', long, default_value_t = 2, global = true)]
    verbosity: u8,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContainerRuntime {
    Podman,
    Docker,
}

impl ContainerRuntime {
    pub fn default_filename(self) -> &'static str {
        match self {
            Self::Podman => CONTAINERFILE_NAME,
            Self::Docker => DOCKERFILE_NAME,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write the build context for an execution environment definition.
    Create {
        /// Execution environment definition file.
        #[arg(short = 'f', long, default_value = DEFAULT_DEFINITION_FILE)]
        file: PathBuf,
        /// Directory the build context is written to.
        #[arg(short = 'c', long, default_value = DEFAULT_CONTEXT_DIR)]
        context: PathBuf,
        /// Name of the generated build script. Defaults by container runtime.
        #[arg(long)]
        output_filename: Option<String>,
        /// Container runtime the context is meant for.
        #[arg(long, value_enum, default_value_t = ContainerRuntime::Podman)]
        container_runtime: ContainerRuntime,
        /// Keyring used to verify collection signatures.
        #[arg(long)]
        galaxy_keyring: Option<PathBuf>,
        /// GPG status code to ignore during signature verification (repeatable).
        #[arg(long = "galaxy-ignore-signature-status-code")]
        galaxy_ignore_signature_status_codes: Vec<String>,
        /// Number of signatures that must verify for each collection.
        #[arg(long)]
        galaxy_required_valid_signature_count: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbosity > MAX_VERBOSITY {
        eprintln!("error: maximum verbosity is {MAX_VERBOSITY}");
        return ExitCode::from(EXIT_FAILURE);
    }

    let default_level = match cli.verbosity {
        0 => "error",
        1 | 2 => "warn",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("DISTRONODE_BUILDER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let engine = Engine::new();

    let result = match cli.command {
        Commands::Create {
            file,
            context,
            output_filename,
            container_runtime,
            galaxy_keyring,
            galaxy_ignore_signature_status_codes,
            galaxy_required_valid_signature_count,
        } => commands::create::run(
            &engine,
            CreateArgs {
                output_filename: output_filename
                    .unwrap_or_else(|| container_runtime.default_filename().to_owned()),
                file,
                context,
                galaxy_keyring,
                galaxy_ignore_signature_status_codes,
                galaxy_required_valid_signature_count,
            },
            cli.verbosity,
            cli.json,
        ),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(Failure { code, message }) => {
            eprintln!("error: {message}");
            ExitCode::from(code)
        }
    }
}
