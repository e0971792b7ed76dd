//! Helper scripts embedded in the binary and written to `_build/scripts/`.

/// Helper script shipped into every build context under `_build/scripts/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Script {
    pub name: &'static str,
    pub body: &'static str,
}

pub const ENTRYPOINT: &str = "entrypoint";

/// All helper scripts, in the order they are written. Every one is executable.
pub const SCRIPTS: &[Script] = &[
    Script {
        name: "assemble",
        body: include_str!("../assets/scripts/assemble"),
    },
    Script {
        name: "check_distronode",
        body: include_str!("../assets/scripts/check_distronode"),
    },
    Script {
        name: "check_galaxy",
        body: include_str!("../assets/scripts/check_galaxy"),
    },
    Script {
        name: ENTRYPOINT,
        body: include_str!("../assets/scripts/entrypoint"),
    },
    Script {
        name: "install-from-bindep",
        body: include_str!("../assets/scripts/install-from-bindep"),
    },
    Script {
        name: "introspect.py",
        body: include_str!("../assets/scripts/introspect.py"),
    },
    Script {
        name: "pip_install",
        body: include_str!("../assets/scripts/pip_install"),
    },
];
