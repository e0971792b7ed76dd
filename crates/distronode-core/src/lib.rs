//! Build context compiler for Distronode execution environments.
//!
//! Takes a normalized [`distronode_schema::Definition`], resolves its
//! dependency sources into manifests, lays out the `_build/` directory, and
//! renders a multi-stage Containerfile. The [`Engine`] runs the whole
//! pipeline and never writes anything until every input has been read.

pub mod assemble;
pub mod constants;
pub mod containerfile;
pub mod engine;
pub mod fs;
pub mod galaxy;
pub mod layout;
pub mod render;
pub mod requirements;
pub mod scripts;

pub use assemble::{BuildContext, ContextAssembler, ContextError};
pub use containerfile::{Containerfile, Directive};
pub use engine::{CompileOptions, CompileResult, Engine};
pub use fs::{ContextFs, LocalFs, WriteOutcome};
pub use galaxy::{GalaxyError, GalaxyRequirements};
pub use layout::ContextLayout;
pub use render::{Renderer, StagePlan};
pub use requirements::{
    ManifestKind, Requirements, RequirementsError, RequirementsManifest, SignatureVerification,
};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Definition(#[from] distronode_schema::SchemaError),
    #[error("definition file {} does not exist", .0.display())]
    DefinitionNotFound(PathBuf),
    #[error(transparent)]
    Requirements(#[from] RequirementsError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Errors caused by the definition itself rather than its inputs or the output directory.
    pub fn is_definition_error(&self) -> bool {
        matches!(self, Self::Definition(_) | Self::DefinitionNotFound(_))
    }
}
