//! Requirement aggregation: turns every dependency source of a definition into
//! the manifest text that lands in the build context.
//!
//! All reads happen here, before anything is written, so a missing file stops
//! the pipeline with the output directory untouched.

use crate::constants::{
    EXCLUDE_COLLECTIONS_FILE, EXCLUDE_PYTHON_FILE, EXCLUDE_SYSTEM_FILE, GALAXY_REQUIREMENTS_FILE,
    PYTHON_REQUIREMENTS_FILE, SYSTEM_REQUIREMENTS_FILE,
};
use crate::fs::ContextFs;
use crate::galaxy::{GalaxyError, GalaxyRequirements};
use distronode_schema::{Definition, DependencySource};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RequirementsError {
    #[error("{} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not valid UTF-8")]
    Encoding(String),
    #[error("invalid galaxy requirements in {origin}: {source}")]
    Galaxy {
        origin: String,
        #[source]
        source: GalaxyError,
    },
}

/// One generated manifest file in the build context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestKind {
    Python,
    System,
    Galaxy,
    ExcludePython,
    ExcludeSystem,
    ExcludeCollections,
}

impl ManifestKind {
    pub const ALL: [Self; 6] = [
        Self::Python,
        Self::System,
        Self::Galaxy,
        Self::ExcludePython,
        Self::ExcludeSystem,
        Self::ExcludeCollections,
    ];

    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Python => PYTHON_REQUIREMENTS_FILE,
            Self::System => SYSTEM_REQUIREMENTS_FILE,
            Self::Galaxy => GALAXY_REQUIREMENTS_FILE,
            Self::ExcludePython => EXCLUDE_PYTHON_FILE,
            Self::ExcludeSystem => EXCLUDE_SYSTEM_FILE,
            Self::ExcludeCollections => EXCLUDE_COLLECTIONS_FILE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementsManifest {
    pub kind: ManifestKind,
    pub content: String,
}

/// Galaxy signature verification inputs supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignatureVerification {
    /// Host path of the keyring. Relative paths resolve against the working directory.
    pub keyring: Option<PathBuf>,
    pub ignore_signature_status_codes: Vec<String>,
    pub required_valid_signature_count: Option<String>,
}

/// Everything the assembler writes besides scripts and user files.
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    manifests: BTreeMap<ManifestKind, RequirementsManifest>,
    pub keyring: Option<Vec<u8>>,
    pub verification: SignatureVerification,
}

impl Requirements {
    /// Resolve every dependency source and verification input of `definition`.
    pub fn aggregate(
        definition: &Definition,
        verification: &SignatureVerification,
        fs: &dyn ContextFs,
    ) -> Result<Self, RequirementsError> {
        let deps = &definition.dependencies;
        let mut manifests = BTreeMap::new();

        let sources = [
            (ManifestKind::Python, deps.python.as_ref()),
            (ManifestKind::System, deps.system.as_ref()),
            (ManifestKind::Galaxy, deps.galaxy.as_ref()),
        ];
        for (kind, source) in sources {
            if let Some(source) = source {
                let manifest = resolve(kind, source, &definition.base_dir, fs)?;
                manifests.insert(kind, manifest);
            }
        }

        let exclusions = [
            (ManifestKind::ExcludePython, &deps.exclude.python),
            (ManifestKind::ExcludeSystem, &deps.exclude.system),
            (ManifestKind::ExcludeCollections, &deps.exclude.all_from_collections),
        ];
        for (kind, entries) in exclusions {
            if !entries.is_empty() {
                let content = normalize_lines(&entries.join("\n"));
                manifests.insert(kind, RequirementsManifest { kind, content });
            }
        }

        let keyring = match &verification.keyring {
            Some(path) => Some(read_required(path, fs)?),
            None => {
                if !verification.ignore_signature_status_codes.is_empty()
                    || verification.required_valid_signature_count.is_some()
                {
                    warn!("galaxy signature options have no effect without a keyring");
                }
                None
            }
        };

        debug!(
            "aggregated {} manifests{}",
            manifests.len(),
            if keyring.is_some() { " and a keyring" } else { "" }
        );

        Ok(Self {
            manifests,
            keyring,
            verification: verification.clone(),
        })
    }

    pub fn get(&self, kind: ManifestKind) -> Option<&RequirementsManifest> {
        self.manifests.get(&kind)
    }

    pub fn has(&self, kind: ManifestKind) -> bool {
        self.manifests.contains_key(&kind)
    }

    pub fn manifests(&self) -> impl Iterator<Item = &RequirementsManifest> {
        self.manifests.values()
    }
}

/// Turn one dependency source into manifest text.
///
/// Python and system sources keep one entry per line with comments and blank
/// lines intact. Galaxy text is validated as YAML and kept as written; galaxy
/// data is serialized with collections before roles.
pub fn resolve(
    kind: ManifestKind,
    source: &DependencySource,
    base_dir: &Path,
    fs: &dyn ContextFs,
) -> Result<RequirementsManifest, RequirementsError> {
    let (origin, text) = match source {
        DependencySource::File(rel) => {
            let path = base_dir.join(rel);
            let bytes = read_required(&path, fs)?;
            let text = String::from_utf8(bytes)
                .map_err(|_| RequirementsError::Encoding(path.display().to_string()))?;
            (path.display().to_string(), text)
        }
        DependencySource::Inline(text) => ("inline definition".to_owned(), text.clone()),
        DependencySource::Structured(value) => {
            let content = GalaxyRequirements::from_value(value)
                .and_then(|galaxy| galaxy.to_yaml())
                .map_err(|source| RequirementsError::Galaxy {
                    origin: "inline definition".to_owned(),
                    source,
                })?;
            return Ok(RequirementsManifest { kind, content });
        }
    };

    if kind == ManifestKind::Galaxy {
        GalaxyRequirements::parse(&text)
            .map_err(|source| RequirementsError::Galaxy { origin, source })?;
    }

    Ok(RequirementsManifest {
        kind,
        content: normalize_lines(&text),
    })
}

fn read_required(path: &Path, fs: &dyn ContextFs) -> Result<Vec<u8>, RequirementsError> {
    fs.read(path)
        .map_err(|source| RequirementsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| RequirementsError::Missing(path.to_path_buf()))
}

/// Unix line endings, no trailing whitespace, exactly one final newline.
fn normalize_lines(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
