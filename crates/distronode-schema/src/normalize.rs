//! Folding each schema generation into the canonical [`Definition`].
//!
//! v1 and v2 share the legacy layout (`build_arg_defaults` images, flat
//! `additional_build_steps`); v3 adds the `images` block, per-stage steps and
//! build options. All three end in the same struct.

use crate::defaults::Defaults;
use crate::definition::{
    describe_scalar, DefinitionV1, DefinitionV2, DefinitionV3, DependenciesV3, Images,
    LegacyBuildSteps, LegacyDependencies, OptionsV3, RawDefinition, RawImage, SchemaError,
    StepBlock,
};
use crate::options::{BuildOptions, Presence};
use crate::types::{ImageName, PipSpec, SchemaVersion, Stage};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Build args every schema may set through `build_arg_defaults`.
const GALAXY_COLLECTION_OPTS: &str = "DISTRONODE_GALAXY_CLI_COLLECTION_OPTS";
const GALAXY_ROLE_OPTS: &str = "DISTRONODE_GALAXY_CLI_ROLE_OPTS";
const PKGMGR_PRESERVE_CACHE: &str = "PKGMGR_PRESERVE_CACHE";
const EE_BASE_IMAGE: &str = "EE_BASE_IMAGE";
const EE_BUILDER_IMAGE: &str = "EE_BUILDER_IMAGE";

/// Canonical, version-independent execution environment definition.
///
/// Every default has been applied and every validation has passed. The
/// renderer consumes only this type and never needs to know which schema
/// generation it came from beyond [`Definition::version`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Definition {
    pub version: SchemaVersion,
    /// Directory relative dependency and build file paths resolve against.
    pub base_dir: PathBuf,
    pub images: ImageSet,
    pub build_args: BuildArgs,
    pub dependencies: Dependencies,
    pub additional_build_files: Vec<BuildFile>,
    pub build_steps: BTreeMap<Stage, StageSteps>,
    pub options: BuildOptions,
    /// Legacy (v1/v2) config file added to the galaxy stage.
    pub distronode_config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub name: ImageName,
    pub signature_original_name: Option<String>,
}

impl ImageRef {
    fn from_raw(raw: &RawImage) -> Result<Self, SchemaError> {
        let name = raw.name.trim();
        if name.is_empty() {
            return Err(SchemaError::Invalid("image name must not be empty".to_owned()));
        }
        Ok(Self {
            name: ImageName::new(name),
            signature_original_name: raw.signature_original_name.clone(),
        })
    }

    fn named(name: ImageName) -> Self {
        Self {
            name,
            signature_original_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSet {
    pub base: ImageRef,
    /// Always set for v1/v2. For v3 only when the definition names one.
    pub builder: Option<ImageRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildArgs {
    pub galaxy_collection_opts: String,
    pub galaxy_role_opts: String,
    pub pkgmgr_preserve_cache: String,
}

/// Where one dependency kind comes from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DependencySource {
    /// Path relative to [`Definition::base_dir`], as written.
    File(PathBuf),
    /// Literal text, one entry per line.
    Inline(String),
    /// Literal YAML data (galaxy only).
    Structured(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dependencies {
    pub python: Option<DependencySource>,
    pub system: Option<DependencySource>,
    pub galaxy: Option<DependencySource>,
    pub distronode_core: Option<PipSpec>,
    pub distronode_runner: Option<PipSpec>,
    pub python_path: String,
    pub python_package_system: Option<String>,
    pub exclude: Exclusions,
}

impl Dependencies {
    /// Whether any dependency needs the intermediate galaxy/builder stages.
    pub fn needs_build_stages(&self) -> bool {
        self.python.is_some() || self.system.is_some() || self.galaxy.is_some()
    }

    /// `DISTRONODE_INSTALL_REFS` value, or `None` when nothing is pinned.
    pub fn install_refs(&self) -> Option<String> {
        let refs: Vec<&str> = [&self.distronode_core, &self.distronode_runner]
            .into_iter()
            .flatten()
            .map(PipSpec::as_str)
            .collect();
        if refs.is_empty() {
            None
        } else {
            Some(refs.join(" "))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Exclusions {
    pub python: Vec<String>,
    pub system: Vec<String>,
    pub all_from_collections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildFile {
    pub src: PathBuf,
    pub dest: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageSteps {
    pub prepend: Vec<String>,
    pub append: Vec<String>,
}

impl StageSteps {
    fn is_empty(&self) -> bool {
        self.prepend.is_empty() && self.append.is_empty()
    }
}

impl Definition {
    pub fn steps(&self, stage: Stage) -> Option<&StageSteps> {
        self.build_steps.get(&stage)
    }

    pub fn resolve_path(&self, relative: &Path) -> PathBuf {
        self.base_dir.join(relative)
    }
}

impl RawDefinition {
    /// Normalize into the canonical model using `defaults` for every unset value.
    pub fn normalize(
        &self,
        base_dir: impl Into<PathBuf>,
        defaults: &Defaults,
    ) -> Result<Definition, SchemaError> {
        let base_dir = base_dir.into();
        match self {
            Self::V1(def) => normalize_v1(def, base_dir, defaults),
            Self::V2(def) => normalize_v2(def, base_dir, defaults),
            Self::V3(def) => normalize_v3(def, base_dir, defaults),
        }
    }
}

fn normalize_v1(
    def: &DefinitionV1,
    base_dir: PathBuf,
    defaults: &Defaults,
) -> Result<Definition, SchemaError> {
    let mut args = def.build_arg_defaults.clone();
    let base = args
        .remove(EE_BASE_IMAGE)
        .map(|v| scalar_text(EE_BASE_IMAGE, &v))
        .transpose()?
        .filter(|s| !s.trim().is_empty())
        .map_or_else(|| defaults.base_image.clone(), ImageName::new);
    let builder = args
        .remove(EE_BUILDER_IMAGE)
        .map(|v| scalar_text(EE_BUILDER_IMAGE, &v))
        .transpose()?
        .filter(|s| !s.trim().is_empty())
        .map_or_else(|| defaults.builder_image.clone(), ImageName::new);

    Ok(Definition {
        version: SchemaVersion::V1,
        images: ImageSet {
            base: ImageRef::named(base),
            builder: Some(ImageRef::named(builder)),
        },
        build_args: build_args(&args, SchemaVersion::V1)?,
        dependencies: legacy_dependencies(&def.dependencies, defaults)?,
        additional_build_files: Vec::new(),
        build_steps: legacy_steps(def.additional_build_steps.as_ref()),
        options: legacy_options(defaults),
        distronode_config: def.distronode_config.as_deref().map(PathBuf::from),
        base_dir,
    })
}

fn normalize_v2(
    def: &DefinitionV2,
    base_dir: PathBuf,
    defaults: &Defaults,
) -> Result<Definition, SchemaError> {
    reject_image_build_args(&def.build_arg_defaults, SchemaVersion::V2)?;
    let images = image_set(&def.images, defaults, true)?;

    Ok(Definition {
        version: SchemaVersion::V2,
        images,
        build_args: build_args(&def.build_arg_defaults, SchemaVersion::V2)?,
        dependencies: legacy_dependencies(&def.dependencies, defaults)?,
        additional_build_files: Vec::new(),
        build_steps: legacy_steps(def.additional_build_steps.as_ref()),
        options: legacy_options(defaults),
        distronode_config: def.distronode_config.as_deref().map(PathBuf::from),
        base_dir,
    })
}

fn normalize_v3(
    def: &DefinitionV3,
    base_dir: PathBuf,
    defaults: &Defaults,
) -> Result<Definition, SchemaError> {
    reject_image_build_args(&def.build_arg_defaults, SchemaVersion::V3)?;
    let images = image_set(&def.images, defaults, false)?;

    let additional_build_files = def
        .additional_build_files
        .iter()
        .map(|f| build_file(&f.src, &f.dest))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Definition {
        version: SchemaVersion::V3,
        images,
        build_args: build_args(&def.build_arg_defaults, SchemaVersion::V3)?,
        dependencies: v3_dependencies(&def.dependencies, defaults)?,
        additional_build_files,
        build_steps: v3_steps(def.additional_build_steps.as_ref())?,
        options: v3_options(&def.options, defaults)?,
        distronode_config: None,
        base_dir,
    })
}

/// Base and builder fall back independently: naming one never changes the other.
fn image_set(
    images: &Images,
    defaults: &Defaults,
    default_builder: bool,
) -> Result<ImageSet, SchemaError> {
    let base = match &images.base_image {
        Some(raw) => ImageRef::from_raw(raw)?,
        None => ImageRef::named(defaults.base_image.clone()),
    };
    let builder = match &images.builder_image {
        Some(raw) => Some(ImageRef::from_raw(raw)?),
        None if default_builder => Some(ImageRef::named(defaults.builder_image.clone())),
        None => None,
    };
    Ok(ImageSet { base, builder })
}

fn reject_image_build_args(
    args: &BTreeMap<String, Value>,
    version: SchemaVersion,
) -> Result<(), SchemaError> {
    for key in [EE_BASE_IMAGE, EE_BUILDER_IMAGE] {
        if args.contains_key(key) {
            return Err(SchemaError::Invalid(format!(
                "{key} is not allowed in build_arg_defaults for schema version {version}; use 'images' instead"
            )));
        }
    }
    Ok(())
}

fn build_args(
    args: &BTreeMap<String, Value>,
    version: SchemaVersion,
) -> Result<BuildArgs, SchemaError> {
    let mut out = BuildArgs::default();
    for (key, value) in args {
        let text = scalar_text(key, value)?;
        match key.as_str() {
            GALAXY_COLLECTION_OPTS => out.galaxy_collection_opts = text,
            GALAXY_ROLE_OPTS => out.galaxy_role_opts = text,
            PKGMGR_PRESERVE_CACHE if version == SchemaVersion::V3 => {
                out.pkgmgr_preserve_cache = text;
            }
            other => {
                return Err(SchemaError::Invalid(format!(
                    "unknown build_arg_defaults key '{other}' for schema version {version}"
                )))
            }
        }
    }
    Ok(out)
}

fn scalar_text(key: &str, value: &Value) -> Result<String, SchemaError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(describe_scalar(value)),
        _ => Err(SchemaError::Invalid(format!(
            "build_arg_defaults.{key} must be a scalar value"
        ))),
    }
}

fn legacy_dependencies(
    deps: &LegacyDependencies,
    defaults: &Defaults,
) -> Result<Dependencies, SchemaError> {
    Ok(Dependencies {
        python: line_source("python", deps.python.as_ref())?,
        system: line_source("system", deps.system.as_ref())?,
        galaxy: galaxy_source(deps.galaxy.as_ref())?,
        python_path: defaults.python_path.clone(),
        ..Dependencies::default()
    })
}

fn v3_dependencies(
    deps: &DependenciesV3,
    defaults: &Defaults,
) -> Result<Dependencies, SchemaError> {
    let interpreter = deps.python_interpreter.clone().unwrap_or_default();
    let exclude = deps.exclude.clone().unwrap_or_default();
    Ok(Dependencies {
        python: line_source("python", deps.python.as_ref())?,
        system: line_source("system", deps.system.as_ref())?,
        galaxy: galaxy_source(deps.galaxy.as_ref())?,
        distronode_core: deps
            .distronode_core
            .as_ref()
            .map(|p| PipSpec::new(p.package_pip.trim())),
        distronode_runner: deps
            .distronode_runner
            .as_ref()
            .map(|p| PipSpec::new(p.package_pip.trim())),
        python_path: interpreter
            .python_path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| defaults.python_path.clone()),
        python_package_system: interpreter.package_system.filter(|p| !p.trim().is_empty()),
        exclude: Exclusions {
            python: exclude.python,
            system: exclude.system,
            all_from_collections: exclude.all_from_collections,
        },
    })
}

/// Python and system sources: a path, literal text, or a list of lines.
fn line_source(kind: &str, value: Option<&Value>) -> Result<Option<DependencySource>, SchemaError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(text_source(s)),
        Value::Sequence(items) => {
            let mut lines = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => lines.push(s.clone()),
                    Value::Number(_) | Value::Bool(_) => lines.push(describe_scalar(item)),
                    _ => {
                        return Err(SchemaError::Invalid(format!(
                            "dependencies.{kind} entries must be strings"
                        )))
                    }
                }
            }
            Ok(Some(DependencySource::Inline(lines.join("\n"))))
        }
        _ => Err(SchemaError::Invalid(format!(
            "dependencies.{kind} must be a file path, text, or a list"
        ))),
    }
}

fn galaxy_source(value: Option<&Value>) -> Result<Option<DependencySource>, SchemaError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(text_source(s)),
        Some(v @ (Value::Mapping(_) | Value::Sequence(_))) => {
            Ok(Some(DependencySource::Structured(v.clone())))
        }
        Some(_) => Err(SchemaError::Invalid(
            "dependencies.galaxy must be a file path, YAML text, or a mapping".to_owned(),
        )),
    }
}

/// A single-line string names a file; anything with a newline is literal content.
fn text_source(s: &str) -> Option<DependencySource> {
    if s.contains('\n') {
        Some(DependencySource::Inline(s.to_owned()))
    } else if s.trim().is_empty() {
        None
    } else {
        Some(DependencySource::File(PathBuf::from(s.trim())))
    }
}

fn build_file(src: &str, dest: &str) -> Result<BuildFile, SchemaError> {
    if src.trim().is_empty() {
        return Err(SchemaError::Invalid(
            "additional_build_files entries need a non-empty src".to_owned(),
        ));
    }
    let dest_path = PathBuf::from(dest.trim());
    let escapes = dest_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(SchemaError::Invalid(format!(
            "additional_build_files dest '{dest}' must be a relative path inside the build context"
        )));
    }
    Ok(BuildFile {
        src: PathBuf::from(src.trim()),
        dest: dest_path,
    })
}

fn block_lines(block: &StepBlock) -> Vec<String> {
    let raw: Vec<&str> = match block {
        StepBlock::Text(text) => text.lines().collect(),
        StepBlock::Lines(lines) => lines.iter().flat_map(|l| l.lines()).collect(),
    };
    let mut lines: Vec<String> = raw.iter().map(|l| l.trim_end().to_owned()).collect();
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    let leading = lines.iter().take_while(|l| l.is_empty()).count();
    lines.drain(..leading);
    lines
}

/// v1/v2 steps wrap only the final assembly point.
fn legacy_steps(steps: Option<&LegacyBuildSteps>) -> BTreeMap<Stage, StageSteps> {
    let mut out = BTreeMap::new();
    if let Some(steps) = steps {
        let stage = StageSteps {
            prepend: steps.prepend.as_ref().map(block_lines).unwrap_or_default(),
            append: steps.append.as_ref().map(block_lines).unwrap_or_default(),
        };
        if !stage.is_empty() {
            out.insert(Stage::Final, stage);
        }
    }
    out
}

fn v3_steps(steps: Option<&Mapping>) -> Result<BTreeMap<Stage, StageSteps>, SchemaError> {
    let mut out: BTreeMap<Stage, StageSteps> = BTreeMap::new();
    let Some(steps) = steps else {
        return Ok(out);
    };

    for (key, value) in steps {
        let Value::String(key) = key else {
            return Err(SchemaError::Invalid(
                "additional_build_steps keys must be strings".to_owned(),
            ));
        };

        if let Some((position, stage)) = key.split_once('_') {
            let stage = parse_stage(stage)?;
            let lines = step_block(key, value)?;
            let entry = out.entry(stage).or_default();
            match position {
                "prepend" => entry.prepend.extend(lines),
                "append" => entry.append.extend(lines),
                _ => return Err(SchemaError::UnknownStage(key.clone())),
            }
            continue;
        }

        let stage = parse_stage(key)?;
        if value.is_null() {
            continue;
        }
        let parsed: LegacyBuildSteps = serde_yaml::from_value(value.clone())
            .map_err(SchemaError::Parse)?;
        let entry = out.entry(stage).or_default();
        entry
            .prepend
            .extend(parsed.prepend.as_ref().map(block_lines).unwrap_or_default());
        entry
            .append
            .extend(parsed.append.as_ref().map(block_lines).unwrap_or_default());
    }

    out.retain(|_, steps| !steps.is_empty());
    Ok(out)
}

fn parse_stage(name: &str) -> Result<Stage, SchemaError> {
    name.parse::<Stage>().map_err(SchemaError::UnknownStage)
}

fn step_block(key: &str, value: &Value) -> Result<Vec<String>, SchemaError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let block: StepBlock = serde_yaml::from_value(value.clone()).map_err(|_| {
        SchemaError::Invalid(format!(
            "additional_build_steps.{key} must be a string or a list of strings"
        ))
    })?;
    Ok(block_lines(&block))
}

/// v1/v2 predate build options; none of the v3 final-stage extras apply.
fn legacy_options(defaults: &Defaults) -> BuildOptions {
    BuildOptions {
        skip_distronode_check: true,
        relax_passwd_permissions: false,
        workdir: None,
        user: None,
        container_init: None,
        package_manager_path: defaults.package_manager_path.clone(),
        tags: Vec::new(),
    }
}

fn v3_options(options: &OptionsV3, defaults: &Defaults) -> Result<BuildOptions, SchemaError> {
    let container_init = match options.container_init.clone() {
        Presence::Absent => Some(defaults.container_init.clone()),
        Presence::Empty => None,
        Presence::Value(init) => Some(init.normalized()).filter(|i| !i.is_empty()),
    };

    Ok(BuildOptions {
        skip_distronode_check: options.skip_distronode_check.unwrap_or(false),
        relax_passwd_permissions: options.relax_passwd_permissions.unwrap_or(true),
        workdir: text_option("workdir", &options.workdir, &defaults.workdir, workdir_text)?,
        user: text_option("user", &options.user, &defaults.user, user_text)?,
        container_init,
        package_manager_path: options
            .package_manager_path
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| defaults.package_manager_path.clone()),
        tags: options.tags.clone(),
    })
}

/// Resolve a free-text option. Blank text disables the option like an explicit null.
fn text_option(
    key: &str,
    presence: &Presence<Value>,
    default: &str,
    accept: fn(&Value) -> Result<String, &'static str>,
) -> Result<Option<String>, SchemaError> {
    let Some(value) = presence.clone().resolve(|| Value::from(default)) else {
        return Ok(None);
    };
    let text = accept(&value)
        .map_err(|expected| SchemaError::Invalid(format!("options.{key} must be {expected}")))?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_owned()))
}

fn workdir_text(value: &Value) -> Result<String, &'static str> {
    value.as_str().map(str::to_owned).ok_or("a path string")
}

/// User names are text; numeric ids must be whole numbers and keep their digits.
fn user_text(value: &Value) -> Result<String, &'static str> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) if n.is_u64() => Ok(n.to_string()),
        _ => Err("a user name or a numeric user id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::parse_definition_str;

    fn normalize(input: &str) -> Definition {
        parse_definition_str(input)
            .unwrap()
            .normalize("/defs", &Defaults::default())
            .unwrap()
    }

    fn normalize_err(input: &str) -> SchemaError {
        parse_definition_str(input)
            .and_then(|raw| raw.normalize("/defs", &Defaults::default()))
            .unwrap_err()
    }

    #[test]
    fn v2_images_default_independently() {
        let only_builder = normalize(
            "version: 2\nimages:\n  builder_image:\n    name: quay.io/distronode/awx-ee:latest\n",
        );
        assert_eq!(
            only_builder.images.base.name,
            crate::defaults::DEFAULT_BASE_IMAGE
        );
        assert_eq!(
            only_builder.images.builder.unwrap().name,
            "quay.io/distronode/awx-ee:latest"
        );

        let only_base = normalize(
            "version: 2\nimages:\n  base_image:\n    name: quay.io/distronode/awx-ee:latest\n",
        );
        assert_eq!(only_base.images.base.name, "quay.io/distronode/awx-ee:latest");
        assert_eq!(
            only_base.images.builder.unwrap().name,
            crate::defaults::DEFAULT_BUILDER_IMAGE
        );
    }

    #[test]
    fn v1_images_come_from_build_args() {
        let def = normalize(
            "build_arg_defaults:\n  EE_BASE_IMAGE: example.com/base:1\n  DISTRONODE_GALAXY_CLI_COLLECTION_OPTS: --pre\n",
        );
        assert_eq!(def.images.base.name, "example.com/base:1");
        assert_eq!(
            def.images.builder.unwrap().name,
            crate::defaults::DEFAULT_BUILDER_IMAGE
        );
        assert_eq!(def.build_args.galaxy_collection_opts, "--pre");
    }

    #[test]
    fn v3_rejects_image_build_args() {
        let err = normalize_err("version: 3\nbuild_arg_defaults:\n  EE_BASE_IMAGE: foo\n");
        assert!(err.to_string().contains("use 'images' instead"));
    }

    #[test]
    fn unknown_build_arg_is_rejected() {
        let err = normalize_err("version: 2\nbuild_arg_defaults:\n  FOO: bar\n");
        assert!(err.to_string().contains("FOO"));
    }

    #[test]
    fn v3_has_no_default_builder_image() {
        let def = normalize("version: 3\n");
        assert!(def.images.builder.is_none());
        assert_eq!(def.images.base.name, crate::defaults::DEFAULT_BASE_IMAGE);
    }

    #[test]
    fn v3_option_defaults() {
        let def = normalize("version: 3\n");
        assert_eq!(def.options.workdir.as_deref(), Some("/runner"));
        assert_eq!(def.options.user.as_deref(), Some("1001"));
        assert!(def.options.relax_passwd_permissions);
        assert!(!def.options.skip_distronode_check);
        assert_eq!(
            def.options.container_init,
            Some(Defaults::default().container_init)
        );
        assert_eq!(def.options.package_manager_path, "/usr/bin/dnf");
    }

    #[test]
    fn explicit_empty_options_disable_features() {
        let def = normalize(
            "version: 3\noptions:\n  workdir:\n  container_init: {}\n  relax_passwd_permissions: false\n",
        );
        assert_eq!(def.options.workdir, None);
        assert_eq!(def.options.container_init, None);
        assert!(!def.options.relax_passwd_permissions);

        let def = normalize("version: 3\noptions:\n  workdir: ''\n");
        assert_eq!(def.options.workdir, None);
    }

    #[test]
    fn custom_options_are_kept() {
        let def = normalize(
            r#"
version: 3
options:
  workdir: /srv/ee
  user: bob
  container_init:
    package_pip: custominit==1.2.3
    entrypoint: |
      ["custominit"]
"#,
        );
        assert_eq!(def.options.workdir.as_deref(), Some("/srv/ee"));
        assert_eq!(def.options.user.as_deref(), Some("bob"));
        let init = def.options.container_init.unwrap();
        assert_eq!(init.package_pip.unwrap(), "custominit==1.2.3");
        assert_eq!(init.entrypoint.as_deref(), Some(r#"["custominit"]"#));
        assert_eq!(init.cmd, None);
    }

    #[test]
    fn legacy_steps_wrap_final_stage() {
        let def = normalize("additional_build_steps:\n  prepend: |\n    RUN echo hi\n");
        let steps = def.steps(Stage::Final).unwrap();
        assert_eq!(steps.prepend, vec!["RUN echo hi"]);
        assert!(def.steps(Stage::Base).is_none());
    }

    #[test]
    fn v3_steps_nested_and_flat_forms_agree() {
        let nested = normalize(
            "version: 3\nadditional_build_steps:\n  base:\n    prepend:\n      - ARG PRE_BASE1\n      - ARG PRE_BASE2\n  final:\n    append: ARG POST_FINAL\n",
        );
        let flat = normalize(
            "version: 3\nadditional_build_steps:\n  prepend_base: |\n    ARG PRE_BASE1\n    ARG PRE_BASE2\n  append_final: ARG POST_FINAL\n",
        );
        assert_eq!(nested.build_steps, flat.build_steps);
        assert_eq!(
            nested.steps(Stage::Base).unwrap().prepend,
            vec!["ARG PRE_BASE1", "ARG PRE_BASE2"]
        );
    }

    #[test]
    fn v3_unknown_stage_is_rejected() {
        let err = normalize_err("version: 3\nadditional_build_steps:\n  assemble:\n    prepend: RUN x\n");
        assert!(matches!(err, SchemaError::UnknownStage(ref s) if s == "assemble"));

        let err = normalize_err("version: 3\nadditional_build_steps:\n  prepend_runtime: RUN x\n");
        assert!(matches!(err, SchemaError::UnknownStage(_)));
    }

    #[test]
    fn dependency_sources_are_classified() {
        let def = normalize(
            r"
version: 3
dependencies:
  python: requirements.txt
  system:
    - git [platform:rpm]
    - make
  galaxy:
    collections:
      - name: community.general
",
        );
        assert_eq!(
            def.dependencies.python,
            Some(DependencySource::File(PathBuf::from("requirements.txt")))
        );
        assert_eq!(
            def.dependencies.system,
            Some(DependencySource::Inline("git [platform:rpm]\nmake".to_owned()))
        );
        assert!(matches!(
            def.dependencies.galaxy,
            Some(DependencySource::Structured(_))
        ));
        assert!(def.dependencies.needs_build_stages());
    }

    #[test]
    fn multiline_string_is_inline_content() {
        let def = normalize("version: 3\ndependencies:\n  python: |\n    six\n    pyyaml\n");
        assert_eq!(
            def.dependencies.python,
            Some(DependencySource::Inline("six\npyyaml\n".to_owned()))
        );
    }

    #[test]
    fn install_refs_join_core_and_runner() {
        let def = normalize(
            r"
version: 3
dependencies:
  distronode_core:
    package_pip: distronode-core==2.13
  distronode_runner:
    package_pip: distronode-runner==2.3.1
  python_interpreter:
    package_system: mypython3
    python_path: /usr/local/bin/mypython
",
        );
        assert_eq!(
            def.dependencies.install_refs().as_deref(),
            Some("distronode-core==2.13 distronode-runner==2.3.1")
        );
        assert_eq!(def.dependencies.python_path, "/usr/local/bin/mypython");
        assert_eq!(
            def.dependencies.python_package_system.as_deref(),
            Some("mypython3")
        );
        assert!(!def.dependencies.needs_build_stages());
    }

    #[test]
    fn build_file_dest_must_stay_inside_context() {
        let err = normalize_err(
            "version: 3\nadditional_build_files:\n  - src: a.cfg\n    dest: ../outside\n",
        );
        assert!(err.to_string().contains("relative path"));

        let err = normalize_err(
            "version: 3\nadditional_build_files:\n  - src: a.cfg\n    dest: /etc\n",
        );
        assert!(matches!(err, SchemaError::Invalid(_)));
    }

    #[test]
    fn custom_defaults_are_honored() {
        let defaults = Defaults {
            base_image: ImageName::new("registry.local/base:1"),
            user: "4242".to_owned(),
            ..Defaults::default()
        };
        let def = parse_definition_str("version: 3\n")
            .unwrap()
            .normalize("/defs", &defaults)
            .unwrap();
        assert_eq!(def.images.base.name, "registry.local/base:1");
        assert_eq!(def.options.user.as_deref(), Some("4242"));
    }

    #[test]
    fn numeric_user_keeps_its_digits() {
        let def = normalize("version: 3\noptions:\n  user: 0\n");
        assert_eq!(def.options.user.as_deref(), Some("0"));
    }

    #[test]
    fn non_text_options_are_rejected_by_name() {
        let err = normalize_err("version: 3\noptions:\n  user: 1.0\n");
        assert_eq!(
            err.to_string(),
            "invalid definition: options.user must be a user name or a numeric user id"
        );

        let err = normalize_err("version: 3\noptions:\n  workdir: 123\n");
        assert_eq!(
            err.to_string(),
            "invalid definition: options.workdir must be a path string"
        );

        let err = normalize_err("version: 3\noptions:\n  user: [bob]\n");
        assert!(matches!(err, SchemaError::Invalid(_)));
    }

    #[test]
    fn legacy_options_disable_v3_extras() {
        let def = normalize("version: 2\n");
        assert!(def.options.container_init.is_none());
        assert!(def.options.workdir.is_none());
        assert!(def.options.user.is_none());
        assert!(def.options.skip_distronode_check);
    }
}
