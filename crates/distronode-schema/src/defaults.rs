//! Fixed names and the overridable default values applied during normalization.

use crate::options::ContainerInit;
use crate::types::{ImageName, PipSpec};

pub const DEFAULT_BASE_IMAGE: &str = "quay.io/distronode/distronode-runner:latest";
pub const DEFAULT_BUILDER_IMAGE: &str = "quay.io/distronode/distronode-builder:latest";
pub const DEFAULT_PYTHON_PATH: &str = "/usr/bin/python3";
pub const DEFAULT_PACKAGE_MANAGER_PATH: &str = "/usr/bin/dnf";
pub const DEFAULT_WORKDIR: &str = "/runner";
pub const DEFAULT_USER: &str = "1001";
pub const DEFAULT_INIT_PACKAGE: &str = "dumb-init==1.2.5";

/// Directory inside the final image holding the builder-provided entrypoint.
pub const FINAL_IMAGE_BIN_PATH: &str = "/opt/builder/bin";

/// Definition file name looked up when the caller names none.
pub const DEFAULT_DEFINITION_FILE: &str = "execution-environment.yml";

/// Immutable record of every default the normalizer may fill in.
///
/// Passed explicitly so tests and embedders can swap any value without
/// touching global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub base_image: ImageName,
    pub builder_image: ImageName,
    pub python_path: String,
    pub package_manager_path: String,
    pub workdir: String,
    pub user: String,
    pub container_init: ContainerInit,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            base_image: ImageName::new(DEFAULT_BASE_IMAGE),
            builder_image: ImageName::new(DEFAULT_BUILDER_IMAGE),
            python_path: DEFAULT_PYTHON_PATH.to_owned(),
            package_manager_path: DEFAULT_PACKAGE_MANAGER_PATH.to_owned(),
            workdir: DEFAULT_WORKDIR.to_owned(),
            user: DEFAULT_USER.to_owned(),
            container_init: ContainerInit {
                package_pip: Some(PipSpec::new(DEFAULT_INIT_PACKAGE)),
                entrypoint: Some(format!(
                    r#"["{FINAL_IMAGE_BIN_PATH}/entrypoint", "dumb-init"]"#
                )),
                cmd: Some(r#"["bash"]"#.to_owned()),
            },
        }
    }
}
