//! Fixed names inside the build context and the container filesystem.

/// Context subfolder holding generated manifests, scripts, and user files.
pub const BUILD_SUBFOLDER: &str = "_build";
pub const SCRIPTS_SUBFOLDER: &str = "scripts";

pub const PYTHON_REQUIREMENTS_FILE: &str = "requirements.txt";
pub const SYSTEM_REQUIREMENTS_FILE: &str = "bindep.txt";
pub const GALAXY_REQUIREMENTS_FILE: &str = "requirements.yml";
pub const EXCLUDE_PYTHON_FILE: &str = "exclude-requirements.txt";
pub const EXCLUDE_SYSTEM_FILE: &str = "exclude-bindep.txt";
pub const EXCLUDE_COLLECTIONS_FILE: &str = "exclude-collections.txt";

/// Name the galaxy keyring is copied to, whatever it was called on the host.
pub const KEYRING_FILE: &str = "keyring.gpg";
pub const LEGACY_CONFIG_FILE: &str = "distronode.cfg";

pub const DEFAULT_CONTEXT_DIR: &str = "context";
pub const CONTAINERFILE_NAME: &str = "Containerfile";
pub const DOCKERFILE_NAME: &str = "Dockerfile";

// Paths inside the image.
pub const OUTPUT_DIR: &str = "/output";
pub const OUTPUT_SCRIPTS_DIR: &str = "/output/scripts";
pub const IMAGE_BUILD_DIR: &str = "/build";
pub const DISTRONODE_SHARE_DIR: &str = "/usr/share/distronode";
pub const COLLECTIONS_PATH: &str = "/usr/share/distronode/collections";
pub const ROLES_PATH: &str = "/usr/share/distronode/roles";
pub const INTROSPECT_PIP_OUT: &str = "/tmp/src/requirements.txt";
pub const INTROSPECT_BINDEP_OUT: &str = "/tmp/src/bindep.txt";

/// Label identifying images produced from a generated build context.
pub const EE_LABEL: &str = "distronode-execution-environment=true";
