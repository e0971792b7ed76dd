//! Definition parsing and normalization for Distronode Builder.
//!
//! This crate is the schema layer: it reads an execution environment
//! definition in any supported schema generation (`RawDefinition`), validates
//! it, and folds it into one canonical `Definition` with every default from an
//! explicit `Defaults` record applied. Nothing downstream ever branches on raw
//! YAML again.

pub mod defaults;
pub mod definition;
pub mod normalize;
pub mod options;
pub mod types;

pub use defaults::{Defaults, DEFAULT_DEFINITION_FILE, FINAL_IMAGE_BIN_PATH};
pub use definition::{parse_definition_bytes, parse_definition_str, RawDefinition, SchemaError};
pub use normalize::{
    BuildArgs, BuildFile, Definition, Dependencies, DependencySource, Exclusions, ImageRef,
    ImageSet, StageSteps,
};
pub use options::{BuildOptions, ContainerInit, Presence};
pub use types::{ImageName, PipSpec, SchemaVersion, Stage};

use std::path::{Path, PathBuf};

/// Parse and normalize definition bytes read from `path`.
///
/// Relative dependency and build-file paths resolve against the directory
/// containing the definition.
pub fn load_definition(
    path: &Path,
    bytes: &[u8],
    defaults: &Defaults,
) -> Result<Definition, SchemaError> {
    let raw = parse_definition_bytes(path, bytes)?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    raw.normalize(base_dir, defaults)
}
