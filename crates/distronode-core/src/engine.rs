use crate::assemble::{BuildContext, ContextAssembler};
use crate::constants::{CONTAINERFILE_NAME, DEFAULT_CONTEXT_DIR};
use crate::fs::{ContextFs, LocalFs};
use crate::layout::ContextLayout;
use crate::render::Renderer;
use crate::requirements::{Requirements, SignatureVerification};
use crate::BuildError;
use distronode_schema::{load_definition, Defaults, Definition, SchemaError, SchemaVersion, Stage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options for one compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Output directory for the build context.
    pub context_dir: PathBuf,
    /// Name of the generated build script inside `context_dir`.
    pub output_filename: String,
    pub verification: SignatureVerification,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            context_dir: PathBuf::from(DEFAULT_CONTEXT_DIR),
            output_filename: CONTAINERFILE_NAME.to_owned(),
            verification: SignatureVerification::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileResult {
    pub version: SchemaVersion,
    pub context_dir: PathBuf,
    pub containerfile: PathBuf,
    pub stages: Vec<Stage>,
    /// Image tags requested by the definition, for whoever runs the build.
    pub tags: Vec<String>,
    /// blake3 over the build script and every generated manifest.
    pub digest: String,
    pub script_changed: bool,
    pub context: BuildContext,
}

/// Compiles execution environment definitions into build contexts.
pub struct Engine {
    fs: Box<dyn ContextFs>,
    defaults: Defaults,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_fs(Box::new(LocalFs))
    }

    pub fn with_fs(fs: Box<dyn ContextFs>) -> Self {
        Self {
            fs,
            defaults: Defaults::default(),
        }
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Parse and normalize the definition at `path`.
    pub fn load(&self, path: &Path) -> Result<Definition, BuildError> {
        let bytes = self
            .fs
            .read(path)
            .map_err(|source| SchemaError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| BuildError::DefinitionNotFound(path.to_path_buf()))?;
        let definition = load_definition(path, &bytes, &self.defaults)?;
        debug!("detected schema version {}", definition.version);
        Ok(definition)
    }

    pub fn compile(&self, path: &Path, options: &CompileOptions) -> Result<CompileResult, BuildError> {
        info!("compiling execution environment from {}", path.display());
        let definition = self.load(path)?;
        self.compile_definition(&definition, options)
    }

    /// Aggregate, assemble, and render an already normalized definition.
    ///
    /// Every input is read before the first write; the build script is
    /// written last.
    pub fn compile_definition(
        &self,
        definition: &Definition,
        options: &CompileOptions,
    ) -> Result<CompileResult, BuildError> {
        let fs = self.fs.as_ref();
        let requirements = Requirements::aggregate(definition, &options.verification, fs)?;

        let layout = ContextLayout::new(&options.context_dir)
            .with_script_name(options.output_filename.as_str());
        let context = ContextAssembler::new(fs, &layout).assemble(definition, &requirements)?;

        let renderer = Renderer::new(definition, &context, &requirements.verification);
        let stages: Vec<Stage> = renderer.plan().into_iter().map(|p| p.stage).collect();
        let script = renderer.render().render();

        let mut hasher = blake3::Hasher::new();
        hasher.update(script.as_bytes());
        for manifest in requirements.manifests() {
            hasher.update(manifest.kind.file_name().as_bytes());
            hasher.update(manifest.content.as_bytes());
        }
        let digest = hasher.finalize().to_hex().to_string();

        let script_path = layout.script_path();
        let outcome = fs
            .write(&script_path, script.as_bytes(), false)
            .map_err(|source| BuildError::Write {
                path: script_path.clone(),
                source,
            })?;

        info!(
            "wrote {} ({} stages, digest {})",
            script_path.display(),
            stages.len(),
            &digest[..12]
        );

        Ok(CompileResult {
            version: definition.version,
            context_dir: layout.root().to_path_buf(),
            containerfile: script_path,
            stages,
            tags: definition.options.tags.clone(),
            digest,
            script_changed: outcome.changed(),
            context,
        })
    }
}
