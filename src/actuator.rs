// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem effects.
//!
//! Every mutation that dotsmith performs on a filesystem goes through an
//! __actuator__. Reconciliation decides _what_ to do, the actuator decides
//! whether and how it actually happens.
//!
//! # Variants
//!
//! - [`FsActuator`] performs effects against the real filesystem.
//! - [`DryRunActuator`] records effects without touching anything.
//! - [`LoggingActuator`] describes each effect before handing it to the
//!   actuator it wraps.
//!
//! Actuators compose. Wrapping a [`DryRunActuator`] in a [`LoggingActuator`]
//! previews changes without applying them.

use similar::TextDiff;
use std::{
    fs::{self, DirBuilder, OpenOptions, Permissions},
    io::{self, ErrorKind, Write},
    os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt},
    path::{Path, PathBuf},
    str::from_utf8,
};
use tracing::{debug, info};

/// Filesystem effect capability.
pub trait Actuator {
    /// Create a single directory with target mode.
    fn mkdir(&mut self, path: &Path, mode: u32) -> io::Result<()>;

    /// Remove path and everything below it.
    fn remove_all(&mut self, path: &Path) -> io::Result<()>;

    /// Write full contents of a file with target mode.
    ///
    /// The `previous` contents are only informational, e.g., for diffs.
    fn write_file(
        &mut self,
        path: &Path,
        contents: &[u8],
        mode: u32,
        previous: Option<&[u8]>,
    ) -> io::Result<()>;

    /// Change permissions of path.
    fn chmod(&mut self, path: &Path, mode: u32) -> io::Result<()>;
}

impl<A> Actuator for &mut A
where
    A: Actuator + ?Sized,
{
    fn mkdir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        (**self).mkdir(path, mode)
    }

    fn remove_all(&mut self, path: &Path) -> io::Result<()> {
        (**self).remove_all(path)
    }

    fn write_file(
        &mut self,
        path: &Path,
        contents: &[u8],
        mode: u32,
        previous: Option<&[u8]>,
    ) -> io::Result<()> {
        (**self).write_file(path, contents, mode, previous)
    }

    fn chmod(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        (**self).chmod(path, mode)
    }
}

impl<A> Actuator for Box<A>
where
    A: Actuator + ?Sized,
{
    fn mkdir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        (**self).mkdir(path, mode)
    }

    fn remove_all(&mut self, path: &Path) -> io::Result<()> {
        (**self).remove_all(path)
    }

    fn write_file(
        &mut self,
        path: &Path,
        contents: &[u8],
        mode: u32,
        previous: Option<&[u8]>,
    ) -> io::Result<()> {
        (**self).write_file(path, contents, mode, previous)
    }

    fn chmod(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        (**self).chmod(path, mode)
    }
}

/// Actuator that applies effects to the real filesystem.
///
/// Permissions are set explicitly after creation, so the resulting mode is
/// exactly the one requested regardless of the process umask.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsActuator;

impl FsActuator {
    /// Construct new filesystem actuator.
    pub fn new() -> Self {
        Self
    }
}

impl Actuator for FsActuator {
    fn mkdir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        DirBuilder::new().mode(mode).create(path)?;
        fs::set_permissions(path, Permissions::from_mode(mode))
    }

    fn remove_all(&mut self, path: &Path) -> io::Result<()> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };

        if metadata.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn write_file(
        &mut self,
        path: &Path,
        contents: &[u8],
        mode: u32,
        _previous: Option<&[u8]>,
    ) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)?;
        file.write_all(contents)?;
        file.set_permissions(Permissions::from_mode(mode))
    }

    fn chmod(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        fs::set_permissions(path, Permissions::from_mode(mode))
    }
}

/// Single effect recorded by [`DryRunActuator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Directory would be created.
    Mkdir { path: PathBuf, mode: u32 },

    /// Path would be removed recursively.
    RemoveAll { path: PathBuf },

    /// File would be written.
    WriteFile {
        path: PathBuf,
        contents: Vec<u8>,
        mode: u32,
    },

    /// Permissions would change.
    Chmod { path: PathBuf, mode: u32 },
}

/// Actuator that only records what would happen.
#[derive(Debug, Default, Clone)]
pub struct DryRunActuator {
    effects: Vec<Effect>,
}

impl DryRunActuator {
    /// Construct new dry-run actuator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Effects recorded so far, in order.
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }
}

impl Actuator for DryRunActuator {
    fn mkdir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        self.effects.push(Effect::Mkdir {
            path: path.into(),
            mode,
        });
        Ok(())
    }

    fn remove_all(&mut self, path: &Path) -> io::Result<()> {
        self.effects.push(Effect::RemoveAll { path: path.into() });
        Ok(())
    }

    fn write_file(
        &mut self,
        path: &Path,
        contents: &[u8],
        mode: u32,
        _previous: Option<&[u8]>,
    ) -> io::Result<()> {
        self.effects.push(Effect::WriteFile {
            path: path.into(),
            contents: contents.to_vec(),
            mode,
        });
        Ok(())
    }

    fn chmod(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        self.effects.push(Effect::Chmod {
            path: path.into(),
            mode,
        });
        Ok(())
    }
}

/// Actuator decorator that logs each effect before delegating it.
#[derive(Debug, Default, Clone)]
pub struct LoggingActuator<A>
where
    A: Actuator,
{
    inner: A,
}

impl<A> LoggingActuator<A>
where
    A: Actuator,
{
    /// Wrap target actuator.
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    /// Unwrap into the decorated actuator.
    pub fn into_inner(self) -> A {
        self.inner
    }
}

impl<A> Actuator for LoggingActuator<A>
where
    A: Actuator,
{
    fn mkdir(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        info!("mkdir -m {mode:o} {}", path.display());
        self.inner.mkdir(path, mode)
    }

    fn remove_all(&mut self, path: &Path) -> io::Result<()> {
        info!("rm -rf {}", path.display());
        self.inner.remove_all(path)
    }

    fn write_file(
        &mut self,
        path: &Path,
        contents: &[u8],
        mode: u32,
        previous: Option<&[u8]>,
    ) -> io::Result<()> {
        info!("install -m {mode:o} /dev/null {}", path.display());
        if let Some(diff) = describe_diff(path, previous.unwrap_or_default(), contents) {
            info!("{diff}");
        }

        self.inner.write_file(path, contents, mode, previous)
    }

    fn chmod(&mut self, path: &Path, mode: u32) -> io::Result<()> {
        info!("chmod {mode:o} {}", path.display());
        self.inner.chmod(path, mode)
    }
}

/// Unified diff between previous and new contents of path.
///
/// Returns [`None`] when there is nothing to show. Non-UTF-8 contents are
/// only reported as differing.
pub fn describe_diff(path: &Path, previous: &[u8], contents: &[u8]) -> Option<String> {
    if previous == contents {
        return None;
    }

    let (Ok(old), Ok(new)) = (from_utf8(previous), from_utf8(contents)) else {
        debug!("skip text diff of binary contents {:?}", path.display());
        return Some(format!("binary files a{0} and b{0} differ", path.display()));
    };

    let old_name = format!("a{}", path.display());
    let new_name = format!("b{}", path.display());
    let diff = TextDiff::from_lines(old, new);
    let mut unified = diff.unified_diff();
    unified.header(&old_name, &new_name);

    Some(unified.to_string())
}
