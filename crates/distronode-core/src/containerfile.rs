//! Typed Containerfile directives.
//!
//! The renderer builds a [`Containerfile`] from these instead of formatting
//! strings inline, which keeps quoting in one place.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Blank,
    Comment(String),
    /// `ARG NAME` or `ARG NAME="default"`.
    Arg {
        name: String,
        default: Option<String>,
    },
    From {
        image: String,
        alias: String,
    },
    Env {
        key: String,
        value: String,
    },
    Run(String),
    Copy {
        from: Option<String>,
        src: String,
        dest: String,
    },
    Add {
        src: String,
        dest: String,
    },
    Workdir(String),
    User(String),
    Label(String),
    /// Exec or shell form, emitted exactly as given.
    Entrypoint(String),
    Cmd(String),
    /// A user-supplied line, emitted unmodified.
    Raw(String),
}

impl Directive {
    pub fn arg(name: &str) -> Self {
        Self::Arg {
            name: name.to_owned(),
            default: None,
        }
    }

    pub fn arg_default(name: &str, default: impl Into<String>) -> Self {
        Self::Arg {
            name: name.to_owned(),
            default: Some(default.into()),
        }
    }

    pub fn stage(image: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::From {
            image: image.into(),
            alias: alias.into(),
        }
    }

    pub fn env(key: &str, value: &str) -> Self {
        Self::Env {
            key: key.to_owned(),
            value: value.to_owned(),
        }
    }

    pub fn run(command: impl Into<String>) -> Self {
        Self::Run(command.into())
    }

    pub fn copy(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self::Copy {
            from: None,
            src: src.into(),
            dest: dest.into(),
        }
    }

    pub fn copy_from(stage: &str, src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self::Copy {
            from: Some(stage.to_owned()),
            src: src.into(),
            dest: dest.into(),
        }
    }
}

/// Double-quote a value for `ARG` defaults.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => Ok(()),
            Self::Comment(text) => write!(f, "# {text}"),
            Self::Arg {
                name,
                default: None,
            } => write!(f, "ARG {name}"),
            Self::Arg {
                name,
                default: Some(value),
            } => write!(f, "ARG {name}={}", quote(value)),
            Self::From { image, alias } => write!(f, "FROM {image} AS {alias}"),
            Self::Env { key, value } => write!(f, "ENV {key}={value}"),
            Self::Run(cmd) => write!(f, "RUN {cmd}"),
            Self::Copy {
                from: None,
                src,
                dest,
            } => write!(f, "COPY {src} {dest}"),
            Self::Copy {
                from: Some(stage),
                src,
                dest,
            } => write!(f, "COPY --from={stage} {src} {dest}"),
            Self::Add { src, dest } => write!(f, "ADD {src} {dest}"),
            Self::Workdir(dir) => write!(f, "WORKDIR {dir}"),
            Self::User(user) => write!(f, "USER {user}"),
            Self::Label(label) => write!(f, "LABEL {label}"),
            Self::Entrypoint(value) => write!(f, "ENTRYPOINT {value}"),
            Self::Cmd(value) => write!(f, "CMD {value}"),
            Self::Raw(line) => f.write_str(line),
        }
    }
}

/// Ordered list of directives forming one build script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Containerfile {
    directives: Vec<Directive>,
}

impl Containerfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, directive: Directive) {
        self.directives.push(directive);
    }

    pub fn extend(&mut self, directives: impl IntoIterator<Item = Directive>) {
        self.directives.extend(directives);
    }

    /// One directive per line, newline-terminated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for directive in &self.directives {
            out.push_str(&directive.to_string());
            out.push('\n');
        }
        out
    }
}
