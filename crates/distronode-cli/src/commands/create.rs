use super::{json_pretty, spin_fail, spin_ok, spinner, Failure, EXIT_SUCCESS, MAX_VERBOSITY};
use console::style;
use distronode_core::{CompileOptions, Engine, SignatureVerification};
use std::path::PathBuf;

#[derive(Debug)]
pub struct CreateArgs {
    pub file: PathBuf,
    pub context: PathBuf,
    pub output_filename: String,
    pub galaxy_keyring: Option<PathBuf>,
    pub galaxy_ignore_signature_status_codes: Vec<String>,
    pub galaxy_required_valid_signature_count: Option<String>,
}

pub fn run(engine: &Engine, args: CreateArgs, verbosity: u8, json: bool) -> Result<u8, Failure> {
    if verbosity >= MAX_VERBOSITY && !json {
        println!("Distronode Builder is generating your execution environment build context.");
    }

    let options = CompileOptions {
        context_dir: args.context,
        output_filename: args.output_filename,
        verification: SignatureVerification {
            keyring: args.galaxy_keyring,
            ignore_signature_status_codes: args.galaxy_ignore_signature_status_codes,
            required_valid_signature_count: args.galaxy_required_valid_signature_count,
        },
    };

    let pb = if json {
        None
    } else {
        Some(spinner("generating build context..."))
    };

    let result = match engine.compile(&args.file, &options) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "build context generated");
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "build context generation failed");
            }
            return Err(e.into());
        }
    };

    if json {
        println!("{}", json_pretty(&result)?);
    } else {
        println!(
            "The build context can be found at: {}",
            style(result.context_dir.display()).bold()
        );
    }
    Ok(EXIT_SUCCESS)
}
