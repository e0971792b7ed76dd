//! Build options: the tri-state key model and the resolved option record.

use crate::types::PipSpec;
use serde::{Deserialize, Deserializer, Serialize};

/// Three-state view of an optional definition key.
///
/// `Absent` means the key was not written at all and the default applies.
/// `Empty` means the key was written with a null value and the feature is
/// explicitly turned off. `Value` carries what the user wrote.
///
/// Fields of this type must be marked `#[serde(default)]` so a missing key
/// lands on `Absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence<T> {
    Absent,
    Empty,
    Value(T),
}

impl<T> Default for Presence<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Presence<T> {
    /// Collapse to an `Option`: absent keys take `default`, explicit empties become `None`.
    pub fn resolve(self, default: impl FnOnce() -> T) -> Option<T> {
        match self {
            Self::Absent => Some(default()),
            Self::Empty => None,
            Self::Value(v) => Some(v),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Presence<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            None => Self::Empty,
            Some(v) => Self::Value(v),
        })
    }
}

/// Init process installed into the final image.
///
/// Each field is emitted only when set; an all-`None` value emits nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerInit {
    #[serde(default)]
    pub package_pip: Option<PipSpec>,
    #[serde(default)]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub cmd: Option<String>,
}

impl ContainerInit {
    /// Trim block-scalar whitespace and drop empty fields.
    pub fn normalized(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
        }
        Self {
            package_pip: self
                .package_pip
                .map(|p| PipSpec::new(p.trim()))
                .filter(|p| !p.is_empty()),
            entrypoint: clean(self.entrypoint),
            cmd: clean(self.cmd),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.package_pip.is_none() && self.entrypoint.is_none() && self.cmd.is_none()
    }
}

/// Resolved build options. Every field is final; the renderer never looks
/// for defaults of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOptions {
    pub skip_distronode_check: bool,
    pub relax_passwd_permissions: bool,
    pub workdir: Option<String>,
    pub user: Option<String>,
    /// `None` disables init injection entirely.
    pub container_init: Option<ContainerInit>,
    pub package_manager_path: String,
    pub tags: Vec<String>,
}
