//! Path layout of a generated build context.

use crate::constants::{
    BUILD_SUBFOLDER, CONTAINERFILE_NAME, KEYRING_FILE, LEGACY_CONFIG_FILE, SCRIPTS_SUBFOLDER,
};
use crate::fs::ContextFs;
use crate::requirements::ManifestKind;
use std::io;
use std::path::{Path, PathBuf};

/// Directory layout of a generated build context.
///
/// ```text
/// <root>/
///   Containerfile
///   _build/
///     requirements.txt, bindep.txt, requirements.yml, exclude-*.txt
///     keyring.gpg, distronode.cfg
///     scripts/
///     <additional build files>
/// ```
#[derive(Debug, Clone)]
pub struct ContextLayout {
    root: PathBuf,
    script_name: String,
}

impl ContextLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            script_name: CONTAINERFILE_NAME.to_owned(),
        }
    }

    #[must_use]
    pub fn with_script_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = name.into();
        self
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    #[inline]
    pub fn script_path(&self) -> PathBuf {
        self.root.join(&self.script_name)
    }

    #[inline]
    pub fn build_dir(&self) -> PathBuf {
        self.root.join(BUILD_SUBFOLDER)
    }

    #[inline]
    pub fn scripts_dir(&self) -> PathBuf {
        self.build_dir().join(SCRIPTS_SUBFOLDER)
    }

    #[inline]
    pub fn manifest_path(&self, kind: ManifestKind) -> PathBuf {
        self.build_dir().join(kind.file_name())
    }

    #[inline]
    pub fn keyring_path(&self) -> PathBuf {
        self.build_dir().join(KEYRING_FILE)
    }

    #[inline]
    pub fn config_path(&self) -> PathBuf {
        self.build_dir().join(LEGACY_CONFIG_FILE)
    }

    /// Where a user-supplied file or directory lands inside `_build/`.
    #[inline]
    pub fn user_dest(&self, dest: &Path) -> PathBuf {
        self.build_dir().join(dest)
    }

    pub fn initialize(&self, fs: &dyn ContextFs) -> io::Result<()> {
        fs.create_dir_all(&self.scripts_dir())
    }
}
