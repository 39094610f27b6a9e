use std::path::{Component, Path, PathBuf};

use super::errors::{Error, ErrorKind, Result};

/// A root-relative path to a managed file.
///
/// Baselines name targets as absolute paths (`/etc/ssh/sshd_config`); the same baseline is
/// applied to hosts mounted at different roots, so the host root is only bound when the
/// path is resolved. Construction rejects anything that could escape the root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SafePath {
    rel: PathBuf,
}

impl SafePath {
    /// Parse an absolute target locator.
    ///
    /// # Errors
    ///
    /// Fails for relative paths, `..` components, and paths that name the root itself.
    pub fn parse(target: &Path) -> Result<Self> {
        if !target.is_absolute() {
            return Err(Error {
                kind: ErrorKind::InvalidPath,
                msg: "target must be absolute".into(),
            });
        }
        let mut rel = PathBuf::new();
        for seg in target.components() {
            match seg {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(p) => rel.push(p),
                Component::ParentDir => {
                    return Err(Error {
                        kind: ErrorKind::Policy,
                        msg: "dotdot".into(),
                    });
                }
                Component::Prefix(_) => {
                    return Err(Error {
                        kind: ErrorKind::InvalidPath,
                        msg: "unsupported component".into(),
                    });
                }
            }
        }
        if rel.as_os_str().is_empty() {
            return Err(Error {
                kind: ErrorKind::InvalidPath,
                msg: "target names the root directory".into(),
            });
        }
        Ok(SafePath { rel })
    }

    /// Full path of this target on a host mounted at `root`.
    #[must_use]
    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(&self.rel)
    }

    #[must_use]
    pub fn rel(&self) -> &Path {
        &self.rel
    }
}
