//! Build context assembly.
//!
//! Lays out `_build/` under the output directory: helper scripts, generated
//! manifests, the galaxy keyring, the legacy config file, and user-supplied
//! build files. Every input is checked before the first write.

use crate::constants::{KEYRING_FILE, LEGACY_CONFIG_FILE, SCRIPTS_SUBFOLDER};
use crate::fs::{ContextFs, WriteOutcome};
use crate::layout::ContextLayout;
use crate::requirements::{ManifestKind, Requirements};
use crate::scripts::SCRIPTS;
use distronode_schema::Definition;
use serde::Serialize;
use std::ffi::OsStr;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("{} does not exist", .0.display())]
    MissingSource(PathBuf),
    #[error(
        "additional build file {} would replace generated {} in the build context",
        src.display(),
        entry
    )]
    Reserved { src: PathBuf, entry: String },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write build context at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What ended up in the build context. The renderer reads this to decide
/// which COPY and install directives to emit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildContext {
    pub root: PathBuf,
    pub manifests: Vec<ManifestKind>,
    pub keyring: bool,
    pub distronode_config: bool,
    pub user_files: usize,
    pub files_changed: usize,
    pub files_unchanged: usize,
}

impl BuildContext {
    pub fn has(&self, kind: ManifestKind) -> bool {
        self.manifests.contains(&kind)
    }

    fn record(&mut self, outcome: WriteOutcome) {
        if outcome.changed() {
            self.files_changed += 1;
        } else {
            self.files_unchanged += 1;
        }
    }
}

pub struct ContextAssembler<'a> {
    fs: &'a dyn ContextFs,
    layout: &'a ContextLayout,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(fs: &'a dyn ContextFs, layout: &'a ContextLayout) -> Self {
        Self { fs, layout }
    }

    pub fn assemble(
        &self,
        definition: &Definition,
        requirements: &Requirements,
    ) -> Result<BuildContext, ContextError> {
        let config = self.read_legacy_config(definition)?;
        let user_files = self.check_user_files(definition)?;

        info!("assembling build context in {}", self.layout.root().display());
        self.layout
            .initialize(self.fs)
            .map_err(|source| ContextError::Write {
                path: self.layout.scripts_dir(),
                source,
            })?;

        let mut context = BuildContext {
            root: self.layout.root().to_path_buf(),
            ..BuildContext::default()
        };

        let scripts_dir = self.layout.scripts_dir();
        for script in SCRIPTS {
            let outcome = self.write(&scripts_dir.join(script.name), script.body.as_bytes(), true)?;
            context.record(outcome);
        }

        for manifest in requirements.manifests() {
            let path = self.layout.manifest_path(manifest.kind);
            let outcome = self.write(&path, manifest.content.as_bytes(), false)?;
            context.record(outcome);
            context.manifests.push(manifest.kind);
        }

        if let Some(keyring) = &requirements.keyring {
            let outcome = self.write(&self.layout.keyring_path(), keyring, false)?;
            context.record(outcome);
            context.keyring = true;
        }

        if let Some(config) = config {
            let outcome = self.write(&self.layout.config_path(), &config, false)?;
            context.record(outcome);
            context.distronode_config = true;
        }

        for (src, dest) in user_files {
            let copied = self
                .fs
                .copy_recursive(&src, &dest)
                .map_err(|source| ContextError::Write {
                    path: dest.clone(),
                    source,
                })?;
            debug!("copied {copied} file(s) from {} to {}", src.display(), dest.display());
            context.user_files += copied;
        }

        debug!(
            "build context ready: {} changed, {} unchanged, {} user file(s)",
            context.files_changed, context.files_unchanged, context.user_files
        );
        Ok(context)
    }

    fn read_legacy_config(&self, definition: &Definition) -> Result<Option<Vec<u8>>, ContextError> {
        let Some(rel) = &definition.distronode_config else {
            return Ok(None);
        };
        let path = definition.resolve_path(rel);
        self.fs
            .read(&path)
            .map_err(|source| ContextError::Read {
                path: path.clone(),
                source,
            })?
            .map(Some)
            .ok_or(ContextError::MissingSource(path))
    }

    /// Resolve `(source, destination)` pairs, failing on the first missing
    /// source or on a destination that would replace a generated entry.
    ///
    /// A file lands inside its destination directory under its own name; a
    /// directory has its contents merged into the destination.
    fn check_user_files(
        &self,
        definition: &Definition,
    ) -> Result<Vec<(PathBuf, PathBuf)>, ContextError> {
        let mut pairs = Vec::with_capacity(definition.additional_build_files.len());
        for file in &definition.additional_build_files {
            let src = definition.resolve_path(&file.src);
            if !self.fs.exists(&src) {
                return Err(ContextError::MissingSource(src));
            }
            let is_dir = self.fs.is_dir(&src);
            let mut relative: PathBuf = file
                .dest
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .collect();
            if !is_dir {
                if let Some(name) = src.file_name() {
                    relative.push(name);
                }
            }

            let clash = match relative.components().next() {
                Some(Component::Normal(top)) => is_reserved(top).then_some(top.to_owned()),
                // A directory merged straight into `_build/` clashes through its children.
                _ => reserved_entries()
                    .find(|name| self.fs.exists(&src.join(name)))
                    .map(Into::into),
            };
            if let Some(entry) = clash {
                return Err(ContextError::Reserved {
                    src,
                    entry: entry.to_string_lossy().into_owned(),
                });
            }

            pairs.push((src, self.layout.user_dest(&relative)));
        }
        Ok(pairs)
    }

    fn write(&self, path: &Path, contents: &[u8], executable: bool) -> Result<WriteOutcome, ContextError> {
        self.fs
            .write(path, contents, executable)
            .map_err(|source| ContextError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Top-level `_build/` entries owned by the generated context.
fn reserved_entries() -> impl Iterator<Item = &'static str> {
    ManifestKind::ALL
        .into_iter()
        .map(ManifestKind::file_name)
        .chain([KEYRING_FILE, LEGACY_CONFIG_FILE, SCRIPTS_SUBFOLDER])
}

fn is_reserved(name: &OsStr) -> bool {
    reserved_entries().any(|entry| name == entry)
}
