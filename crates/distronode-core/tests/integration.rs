use distronode_core::{BuildError, CompileOptions, Engine, SignatureVerification};
use std::fs;
use std::path::{Path, PathBuf};

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        Self { _dir: dir, root }
    }

    fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn options(&self) -> CompileOptions {
        CompileOptions {
            context_dir: self.root.join("context"),
            ..CompileOptions::default()
        }
    }

    fn containerfile(&self) -> String {
        fs::read_to_string(self.root.join("context/Containerfile")).unwrap()
    }
}

fn compile(fixture: &Fixture, definition: &Path) {
    Engine::new().compile(definition, &fixture.options()).unwrap();
}

#[test]
fn empty_definition_uses_default_images() {
    let fx = Fixture::new();
    let def = fx.file("execution-environment.yml", "");
    compile(&fx, &def);

    let out = fx.containerfile();
    assert!(out.contains(r#"ARG EE_BASE_IMAGE="quay.io/distronode/distronode-runner:latest""#));
    assert!(out.contains(r#"ARG EE_BUILDER_IMAGE="quay.io/distronode/distronode-builder:latest""#));
}

#[test]
fn legacy_custom_steps_wrap_builder_copy() {
    let fx = Fixture::new();
    let def = fx.file(
        "ee.yml",
        "version: 1\nadditional_build_steps:\n  prepend:\n    - RUN echo pre\n  append: |\n    RUN echo post\n",
    );
    compile(&fx, &def);

    let out = fx.containerfile();
    let pre = out.find("RUN echo pre").unwrap();
    let copy = out.find("COPY --from=builder").unwrap();
    let post = out.find("RUN echo post").unwrap();
    assert!(pre < copy && copy < post);
}

#[test]
fn v2_builder_image_defaults_independently() {
    let fx = Fixture::new();
    let def = fx.file(
        "ee.yml",
        "version: 2\nimages:\n  base_image:\n    name: quay.io/distronode/awx-ee:latest\n",
    );
    compile(&fx, &def);

    let out = fx.containerfile();
    assert!(out.contains(r#"ARG EE_BASE_IMAGE="quay.io/distronode/awx-ee:latest""#));
    assert!(out.contains(r#"ARG EE_BUILDER_IMAGE="quay.io/distronode/distronode-builder:latest""#));
}

#[test]
fn missing_requirements_file_aborts_before_writing() {
    let fx = Fixture::new();
    let def = fx.file("ee.yml", "version: 3\ndependencies:\n  python: requirements.txt\n");

    let err = Engine::new().compile(&def, &fx.options()).unwrap_err();
    assert!(matches!(err, BuildError::Requirements(_)));
    assert_eq!(
        err.to_string(),
        format!("{} does not exist", fx.root.join("requirements.txt").display())
    );
    assert!(!fx.root.join("context").exists());
}

#[test]
fn dependency_files_are_copied_into_context() {
    let fx = Fixture::new();
    fx.file("requirements.txt", "six\npyyaml\n");
    fx.file("bindep.txt", "git [platform:rpm]\n");
    fx.file("requirements.yml", "collections:\n  - name: community.general\n");
    let def = fx.file(
        "ee.yml",
        "version: 3\ndependencies:\n  python: requirements.txt\n  system: bindep.txt\n  galaxy: requirements.yml\n",
    );
    compile(&fx, &def);

    let build = fx.root.join("context/_build");
    assert_eq!(fs::read_to_string(build.join("requirements.txt")).unwrap(), "six\npyyaml\n");
    assert_eq!(fs::read_to_string(build.join("bindep.txt")).unwrap(), "git [platform:rpm]\n");
    assert!(build.join("requirements.yml").is_file());
    assert!(build.join("scripts/assemble").is_file());

    let out = fx.containerfile();
    assert!(out.contains("COPY _build/requirements.txt requirements.txt"));
    assert!(out.contains("COPY --from=galaxy /usr/share/distronode /usr/share/distronode"));
    assert!(out.contains("COPY --from=builder /output/ /output/"));
}

#[test]
fn galaxy_keyring_is_copied_under_canonical_name() {
    let fx = Fixture::new();
    let keyring = fx.file("mykeyring.gpg", "not really a keyring");
    let def = fx.file(
        "ee.yml",
        "version: 3\ndependencies:\n  galaxy:\n    collections:\n      - name: distronode.netcommon\n",
    );
    let options = CompileOptions {
        verification: SignatureVerification {
            keyring: Some(keyring),
            ignore_signature_status_codes: vec!["NODATA".to_owned()],
            required_valid_signature_count: Some("2".to_owned()),
        },
        ..fx.options()
    };

    let result = Engine::new().compile(&def, &options).unwrap();
    assert!(result.context.keyring);
    assert!(fx.root.join("context/_build/keyring.gpg").is_file());

    let out = fx.containerfile();
    assert!(out.contains("--ignore-signature-status-code NODATA"));
    assert!(out.contains("--required-valid-signature-count 2"));
    assert!(out.contains(r#"--keyring "keyring.gpg""#));
    assert!(!out.contains("DISTRONODE_GALAXY_DISABLE_GPG_VERIFY"));
}

#[test]
fn v3_complete_definition() {
    let fx = Fixture::new();
    fx.file("files/random.cfg", "[defaults]\n");
    fx.file("files/data/a.dat", "a");
    fx.file("files/data/text_files/a.txt", "t");
    let def = fx.file(
        "ee.yml",
        r#"
version: 3
images:
  base_image:
    name: registry.example.com/ee-base:1
dependencies:
  python:
    - pyyaml
  galaxy: |
    # lab collections
    collections:
      - name: community.windows
additional_build_files:
  - src: files/random.cfg
    dest: myconfigs
  - src: files/data
    dest: mydata
additional_build_steps:
  prepend_base:
    - ARG PRE_BASE1
  append_final: |
    RUN echo done
options:
  workdir: /srv/ee
  user: bob
  tags:
    - ee:latest
"#,
    );
    let result = Engine::new().compile(&def, &fx.options()).unwrap();
    assert_eq!(result.tags, ["ee:latest"]);

    let build = fx.root.join("context/_build");
    assert!(build.join("myconfigs/random.cfg").is_file());
    assert!(build.join("mydata/a.dat").is_file());
    assert!(build.join("mydata/text_files/a.txt").is_file());
    assert!(fs::read_to_string(build.join("requirements.yml"))
        .unwrap()
        .starts_with("# lab collections\n"));

    let out = fx.containerfile();
    assert!(out.contains("FROM base AS galaxy"));
    assert!(out.contains("FROM base AS builder"));
    assert!(out.contains("WORKDIR /srv/ee"));
    assert!(out.contains("USER bob"));
    let pre = out.find("ARG PRE_BASE1").unwrap();
    assert!(pre > out.find("FROM $EE_BASE_IMAGE AS base").unwrap());
    assert!(out.find("RUN echo done").unwrap() < out.find("RUN rm -rf /output").unwrap());
}

#[test]
fn v3_without_dependencies_builds_from_base() {
    let fx = Fixture::new();
    let def = fx.file("ee.yml", "version: 3\n");
    let result = Engine::new().compile(&def, &fx.options()).unwrap();

    assert_eq!(result.stages.len(), 2);
    let out = fx.containerfile();
    assert!(!out.contains("AS builder"));
    assert!(!out.contains("--from=builder"));
    assert!(!out.contains("EE_BUILDER_IMAGE"));
}

#[test]
fn recompiling_is_idempotent() {
    let fx = Fixture::new();
    fx.file("requirements.txt", "six\n");
    let def = fx.file("ee.yml", "version: 3\ndependencies:\n  python: requirements.txt\n");
    let engine = Engine::new();

    let first = engine.compile(&def, &fx.options()).unwrap();
    let script = fx.containerfile();
    let second = engine.compile(&def, &fx.options()).unwrap();

    assert!(first.script_changed);
    assert!(!second.script_changed);
    assert_eq!(second.context.files_changed, 0);
    assert_eq!(first.digest, second.digest);
    assert_eq!(script, fx.containerfile());
}

#[test]
fn custom_output_filename() {
    let fx = Fixture::new();
    let def = fx.file("ee.yml", "version: 3\n");
    let options = CompileOptions {
        output_filename: "Dockerfile".to_owned(),
        ..fx.options()
    };
    let result = Engine::new().compile(&def, &options).unwrap();

    assert_eq!(result.containerfile, fx.root.join("context/Dockerfile"));
    assert!(result.containerfile.is_file());
    assert!(!fx.root.join("context/Containerfile").exists());
}

#[test]
fn unsupported_version_is_a_definition_error() {
    let fx = Fixture::new();
    let def = fx.file("ee.yml", "version: 4\n");
    let err = Engine::new().compile(&def, &fx.options()).unwrap_err();
    assert!(err.is_definition_error());
    assert!(err.to_string().contains("unsupported version"));
}

#[test]
fn missing_definition_file() {
    let fx = Fixture::new();
    let err = Engine::new()
        .compile(&fx.root.join("nope.yml"), &fx.options())
        .unwrap_err();
    assert!(matches!(err, BuildError::DefinitionNotFound(_)));
    assert!(err.is_definition_error());
}

#[test]
fn unknown_key_is_rejected() {
    let fx = Fixture::new();
    let def = fx.file("ee.yml", "version: 3\nbogus: true\n");
    let err = Engine::new().compile(&def, &fx.options()).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("An error occurred while parsing the definition file"));
}

#[test]
fn non_utf8_definition_is_rejected() {
    let fx = Fixture::new();
    let def = fx.root.join("ee.yml");
    fs::write(
        &def,
        b"version: 3\nimages:\n  base_image:\n    name: registry.example.com/img\xff:1\n",
    )
    .unwrap();

    let err = Engine::new().compile(&def, &fx.options()).unwrap_err();
    assert!(err.is_definition_error());
    assert!(err.to_string().contains("not valid UTF-8"));
    assert!(!fx.root.join("context").exists());
}
