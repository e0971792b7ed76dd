//! Raw definition documents, one struct family per schema generation.
//!
//! These types mirror the YAML exactly and reject unknown keys. They carry no
//! defaults of their own; [`crate::normalize`] turns any of them into the
//! single canonical [`crate::Definition`].

use crate::options::{ContainerInit, Presence};
use crate::types::SchemaVersion;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("An error occurred while parsing the definition file: {0}")]
    Parse(#[source] serde_yaml::Error),
    #[error("could not read definition file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("definition file {} is not valid UTF-8: {source}", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("unsupported version: {0} (expected 1, 2 or 3)")]
    UnsupportedVersion(String),
    #[error("unknown stage '{0}' in additional_build_steps (expected base, galaxy, builder or final)")]
    UnknownStage(String),
    #[error("invalid definition: {0}")]
    Invalid(String),
}

/// A parsed definition document tagged with its schema generation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDefinition {
    V1(DefinitionV1),
    V2(DefinitionV2),
    V3(DefinitionV3),
}

impl RawDefinition {
    pub fn version(&self) -> SchemaVersion {
        match self {
            Self::V1(_) => SchemaVersion::V1,
            Self::V2(_) => SchemaVersion::V2,
            Self::V3(_) => SchemaVersion::V3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionV1 {
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default)]
    pub build_arg_defaults: BTreeMap<String, Value>,
    #[serde(default)]
    pub distronode_config: Option<String>,
    #[serde(default)]
    pub dependencies: LegacyDependencies,
    #[serde(default)]
    pub additional_build_steps: Option<LegacyBuildSteps>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionV2 {
    pub version: Value,
    #[serde(default)]
    pub images: Images,
    #[serde(default)]
    pub build_arg_defaults: BTreeMap<String, Value>,
    #[serde(default)]
    pub distronode_config: Option<String>,
    #[serde(default)]
    pub dependencies: LegacyDependencies,
    #[serde(default)]
    pub additional_build_steps: Option<LegacyBuildSteps>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionV3 {
    pub version: Value,
    #[serde(default)]
    pub images: Images,
    #[serde(default)]
    pub build_arg_defaults: BTreeMap<String, Value>,
    #[serde(default)]
    pub dependencies: DependenciesV3,
    #[serde(default)]
    pub additional_build_files: Vec<RawBuildFile>,
    /// Either `{stage: {prepend, append}}` or flat `prepend_<stage>` keys.
    #[serde(default)]
    pub additional_build_steps: Option<Mapping>,
    #[serde(default)]
    pub options: OptionsV3,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Images {
    #[serde(default)]
    pub base_image: Option<RawImage>,
    #[serde(default)]
    pub builder_image: Option<RawImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawImage {
    pub name: String,
    #[serde(default)]
    pub signature_original_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyDependencies {
    #[serde(default)]
    pub python: Option<Value>,
    #[serde(default)]
    pub system: Option<Value>,
    #[serde(default)]
    pub galaxy: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependenciesV3 {
    #[serde(default)]
    pub python: Option<Value>,
    #[serde(default)]
    pub system: Option<Value>,
    #[serde(default)]
    pub galaxy: Option<Value>,
    #[serde(default)]
    pub distronode_core: Option<PipPackage>,
    #[serde(default)]
    pub distronode_runner: Option<PipPackage>,
    #[serde(default)]
    pub python_interpreter: Option<RawPythonInterpreter>,
    #[serde(default)]
    pub exclude: Option<RawExclude>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipPackage {
    pub package_pip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPythonInterpreter {
    #[serde(default)]
    pub package_system: Option<String>,
    #[serde(default)]
    pub python_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawExclude {
    #[serde(default)]
    pub python: Vec<String>,
    #[serde(default)]
    pub system: Vec<String>,
    #[serde(default)]
    pub all_from_collections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBuildFile {
    pub src: String,
    pub dest: String,
}

/// A block of build-script lines, written as one string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StepBlock {
    Text(String),
    Lines(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyBuildSteps {
    #[serde(default)]
    pub prepend: Option<StepBlock>,
    #[serde(default)]
    pub append: Option<StepBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsV3 {
    #[serde(default)]
    pub skip_distronode_check: Option<bool>,
    #[serde(default)]
    pub relax_passwd_permissions: Option<bool>,
    #[serde(default)]
    pub workdir: Presence<Value>,
    #[serde(default)]
    pub user: Presence<Value>,
    #[serde(default)]
    pub container_init: Presence<ContainerInit>,
    #[serde(default)]
    pub package_manager_path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub fn parse_definition_str(input: &str) -> Result<RawDefinition, SchemaError> {
    let doc: Value = serde_yaml::from_str(input).map_err(SchemaError::Parse)?;
    let doc = match doc {
        // An empty file is a valid v1 definition with every default applied.
        Value::Null => Value::Mapping(Mapping::new()),
        Value::Mapping(_) => doc,
        _ => {
            return Err(SchemaError::Invalid(
                "the definition must be a YAML mapping".to_owned(),
            ))
        }
    };

    match detect_version(&doc)? {
        SchemaVersion::V1 => Ok(RawDefinition::V1(
            serde_yaml::from_value(doc).map_err(SchemaError::Parse)?,
        )),
        SchemaVersion::V2 => Ok(RawDefinition::V2(
            serde_yaml::from_value(doc).map_err(SchemaError::Parse)?,
        )),
        SchemaVersion::V3 => Ok(RawDefinition::V3(
            serde_yaml::from_value(doc).map_err(SchemaError::Parse)?,
        )),
    }
}

/// Parse definition bytes read from `path`. Invalid UTF-8 is rejected, never replaced.
pub fn parse_definition_bytes(path: &Path, bytes: &[u8]) -> Result<RawDefinition, SchemaError> {
    let content = std::str::from_utf8(bytes).map_err(|source| SchemaError::Encoding {
        path: path.to_path_buf(),
        source,
    })?;
    parse_definition_str(content)
}

fn detect_version(doc: &Value) -> Result<SchemaVersion, SchemaError> {
    let Some(raw) = doc.get("version") else {
        return Ok(SchemaVersion::V1);
    };
    let number = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    number
        .and_then(SchemaVersion::from_u64)
        .ok_or_else(|| SchemaError::UnsupportedVersion(describe_scalar(raw)))
}

pub(crate) fn describe_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_owned(),
        _ => "<non-scalar>".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_version_means_v1() {
        let def = parse_definition_str("dependencies:\n  galaxy: requirements.yml\n").unwrap();
        assert_eq!(def.version(), SchemaVersion::V1);
    }

    #[test]
    fn empty_document_is_v1() {
        assert_eq!(
            parse_definition_str("").unwrap().version(),
            SchemaVersion::V1
        );
    }

    #[test]
    fn version_accepts_quoted_number() {
        let def = parse_definition_str("version: '3'\n").unwrap();
        assert_eq!(def.version(), SchemaVersion::V3);
    }

    #[test]
    fn rejects_unsupported_versions() {
        for input in ["version: 0\n", "version: 4\n", "version: latest\n"] {
            let err = parse_definition_str(input).unwrap_err();
            assert!(matches!(err, SchemaError::UnsupportedVersion(_)), "{input}");
            assert!(err.to_string().contains("unsupported version"));
        }
    }

    #[test]
    fn rejects_unknown_top_level_keys() {
        let err = parse_definition_str("version: 3\nfrobnicate: true\n").unwrap_err();
        assert!(matches!(err, SchemaError::Parse(_)));
        assert!(err
            .to_string()
            .contains("An error occurred while parsing the definition file"));
    }

    #[test]
    fn images_key_not_known_to_v1() {
        let err = parse_definition_str("images:\n  base_image:\n    name: foo\n").unwrap_err();
        assert!(matches!(err, SchemaError::Parse(_)));
    }

    #[test]
    fn syntax_errors_are_wrapped() {
        let err = parse_definition_str("version: 3\nimages: [unclosed\n").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("An error occurred while parsing the definition file"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn non_mapping_document_is_invalid() {
        let err = parse_definition_str("- a\n- b\n").unwrap_err();
        assert!(matches!(err, SchemaError::Invalid(_)));
    }

    #[test]
    fn parses_v3_options() {
        let def = parse_definition_str(
            r"
version: 3
options:
  workdir:
  user: 1001
  container_init: {}
  skip_distronode_check: true
",
        )
        .unwrap();
        let RawDefinition::V3(v3) = def else {
            panic!("expected v3");
        };
        assert_eq!(v3.options.workdir, Presence::Empty);
        assert_eq!(v3.options.user, Presence::Value(Value::from(1001)));
        assert_eq!(
            v3.options.container_init,
            Presence::Value(ContainerInit::default())
        );
        assert_eq!(v3.options.skip_distronode_check, Some(true));
    }

    #[test]
    fn step_blocks_accept_text_or_list() {
        let def = parse_definition_str(
            r"
additional_build_steps:
  prepend: |
    RUN whoami
  append:
    - RUN echo one
    - RUN echo two
",
        )
        .unwrap();
        let RawDefinition::V1(v1) = def else {
            panic!("expected v1");
        };
        let steps = v1.additional_build_steps.unwrap();
        assert_eq!(
            steps.prepend,
            Some(StepBlock::Text("RUN whoami\n".to_owned()))
        );
        assert!(matches!(steps.append, Some(StepBlock::Lines(ref l)) if l.len() == 2));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let bytes = b"version: 3\nimages:\n  base_image:\n    name: registry.example.com/img\xff:1\n";
        let err = parse_definition_bytes(Path::new("ee.yml"), bytes).unwrap_err();
        assert!(matches!(err, SchemaError::Encoding { .. }));
        assert!(err.to_string().contains("ee.yml is not valid UTF-8"));
    }
}
