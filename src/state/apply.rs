// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reconcile a target tree with the target state.
//!
//! Reconciliation walks the target state depth-first, parents before
//! children, files before directories, each in lexicographic order. Every
//! node compares itself against the real entry at its target path and asks
//! the actuator for the smallest set of effects that make the two agree.
//! The target state itself is never modified.
//!
//! Apply is not transactional. The first error stops the walk, leaving
//! whatever has been reconciled so far in place.

use crate::{
    actuator::Actuator,
    state::{Dirs, DirState, FileState, Files, Result, RootState, StateError},
};

use std::{
    fs::{self, Metadata},
    io::ErrorKind,
    os::unix::fs::PermissionsExt,
    path::Path,
};
use tracing::{debug, instrument};

impl RootState {
    /// Make target directory match target state through actuator.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Access`] if a target path cannot be inspected
    ///   or read.
    /// - Return [`StateError::Actuator`] if the actuator fails.
    #[instrument(skip(self, actuator), level = "debug")]
    pub fn apply(&self, actuator: &mut impl Actuator) -> Result<()> {
        debug!("apply target state to {:?}", self.target_dir.display());
        apply_children(&self.dirs, &self.files, &self.target_dir, self.umask, actuator)
    }
}

impl DirState {
    /// Make directory at target path match directory state.
    pub(crate) fn apply(&self, target_path: &Path, umask: u32, actuator: &mut impl Actuator) -> Result<()> {
        let mode = self.mode & !umask & 0o777;
        match stat(target_path)? {
            Some(metadata) if metadata.is_dir() => {
                if permissions(&metadata) != mode {
                    actuator.chmod(target_path, mode)?;
                }
            }
            Some(_) => {
                actuator.remove_all(target_path)?;
                actuator.mkdir(target_path, mode)?;
            }
            None => actuator.mkdir(target_path, mode)?,
        }

        apply_children(&self.dirs, &self.files, target_path, umask, actuator)
    }
}

impl FileState {
    /// Make file at target path match file state.
    pub(crate) fn apply(&self, target_path: &Path, umask: u32, actuator: &mut impl Actuator) -> Result<()> {
        let mode = self.mode & !umask & 0o777;
        let mut previous = None;
        match stat(target_path)? {
            Some(metadata) if metadata.is_file() => {
                if self.is_absent() {
                    actuator.remove_all(target_path)?;
                    return Ok(());
                }

                let current = fs::read(target_path).map_err(|err| StateError::Access {
                    source: err,
                    path: target_path.into(),
                })?;
                if current == self.contents {
                    if permissions(&metadata) != mode {
                        actuator.chmod(target_path, mode)?;
                    }
                    return Ok(());
                }

                previous = Some(current);
            }
            Some(_) => actuator.remove_all(target_path)?,
            None => (),
        }

        if self.is_absent() {
            return Ok(());
        }

        actuator.write_file(target_path, &self.contents, mode, previous.as_deref())?;

        Ok(())
    }
}

fn apply_children(
    dirs: &Dirs,
    files: &Files,
    target_path: &Path,
    umask: u32,
    actuator: &mut impl Actuator,
) -> Result<()> {
    for (name, state) in files {
        state.apply(&target_path.join(name), umask, actuator)?;
    }

    for (name, state) in dirs {
        state.apply(&target_path.join(name), umask, actuator)?;
    }

    Ok(())
}

/// Inspect target path without following symlinks.
///
/// Returns [`None`] if nothing exists at target path. A parent that is not
/// a directory counts as nothing, which happens when a dry run only recorded
/// the replacement of that parent.
fn stat(target_path: &Path) -> Result<Option<Metadata>> {
    match fs::symlink_metadata(target_path) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => Ok(None),
        Err(err) => Err(StateError::Access {
            source: err,
            path: target_path.into(),
        }),
    }
}

fn permissions(metadata: &Metadata) -> u32 {
    metadata.permissions().mode() & 0o777
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actuator::{DryRunActuator, Effect, FsActuator},
        template::Data,
    };

    use pretty_assertions::assert_eq;
    use std::{fs::Permissions, os::unix::fs::symlink};
    use tempfile::tempdir;

    fn root_with_file(target: &Path, state: FileState) -> RootState {
        let mut root = RootState::new(target, 0o022, target.join(".dotsmith"), Data::new());
        root.files.insert("foo".into(), state);
        root
    }

    #[test]
    fn apply_creates_missing_entries() -> anyhow::Result<()> {
        let target = tempdir()?;
        let mut root = root_with_file(target.path(), FileState::new("foo", false, 0o666, "bar"));
        let mut dir = DirState::new("private_dir", 0o700);
        dir.files
            .insert("baz".into(), FileState::new("private_dir/executable_baz", false, 0o777, "#!/bin/sh\n"));
        root.dirs.insert("dir".into(), dir);

        let mut actuator = DryRunActuator::new();
        root.apply(&mut actuator)?;
        let expect = vec![
            Effect::WriteFile {
                path: target.path().join("foo"),
                contents: b"bar".to_vec(),
                mode: 0o644,
            },
            Effect::Mkdir {
                path: target.path().join("dir"),
                mode: 0o700,
            },
            Effect::WriteFile {
                path: target.path().join("dir/baz"),
                contents: b"#!/bin/sh\n".to_vec(),
                mode: 0o755,
            },
        ];
        assert_eq!(actuator.effects(), expect.as_slice());

        Ok(())
    }

    #[test]
    fn apply_fixes_only_permissions() -> anyhow::Result<()> {
        let target = tempdir()?;
        let path = target.path().join("foo");
        fs::write(&path, "bar")?;
        fs::set_permissions(&path, Permissions::from_mode(0o600))?;

        let root = root_with_file(target.path(), FileState::new("foo", false, 0o666, "bar"));
        let mut actuator = DryRunActuator::new();
        root.apply(&mut actuator)?;
        assert_eq!(actuator.effects(), &[Effect::Chmod { path, mode: 0o644 }]);

        Ok(())
    }

    #[test]
    fn apply_fixes_directory_permissions() -> anyhow::Result<()> {
        let target = tempdir()?;
        let path = target.path().join("dir");
        fs::create_dir(&path)?;
        fs::set_permissions(&path, Permissions::from_mode(0o777))?;

        let mut root = RootState::new(target.path(), 0o022, target.path().join(".dotsmith"), Data::new());
        root.dirs.insert("dir".into(), DirState::new("dir", 0o777));

        let mut actuator = DryRunActuator::new();
        root.apply(&mut actuator)?;
        assert_eq!(
            actuator.effects(),
            &[Effect::Chmod {
                path: path.clone(),
                mode: 0o755
            }]
        );

        root.apply(&mut FsActuator::new())?;
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o755);

        let mut actuator = DryRunActuator::new();
        root.apply(&mut actuator)?;
        assert!(actuator.effects().is_empty());

        Ok(())
    }

    #[test]
    fn dry_run_replaces_file_with_populated_directory() -> anyhow::Result<()> {
        let target = tempdir()?;
        let path = target.path().join(".vim");
        fs::write(&path, "not a directory")?;

        let mut dir = DirState::new("dot_vim", 0o777);
        dir.files
            .insert("vimrc".into(), FileState::new("dot_vim/vimrc", false, 0o666, "set nu\n"));
        let mut root = RootState::new(target.path(), 0o022, target.path().join(".dotsmith"), Data::new());
        root.dirs.insert(".vim".into(), dir);

        let mut actuator = DryRunActuator::new();
        root.apply(&mut actuator)?;
        let expect = vec![
            Effect::RemoveAll { path: path.clone() },
            Effect::Mkdir {
                path: path.clone(),
                mode: 0o755,
            },
            Effect::WriteFile {
                path: path.join("vimrc"),
                contents: b"set nu\n".to_vec(),
                mode: 0o644,
            },
        ];
        assert_eq!(actuator.effects(), expect.as_slice());
        assert_eq!(fs::read_to_string(&path)?, "not a directory");

        Ok(())
    }

    #[test]
    fn apply_removes_absent_file() -> anyhow::Result<()> {
        let target = tempdir()?;
        let path = target.path().join("foo");
        fs::write(&path, "stale")?;

        let root = root_with_file(target.path(), FileState::new("foo.tmpl", false, 0o666, ""));
        root.apply(&mut FsActuator::new())?;
        assert!(!path.exists());

        // Absent and already gone is a no-op.
        let mut actuator = DryRunActuator::new();
        root.apply(&mut actuator)?;
        assert!(actuator.effects().is_empty());

        Ok(())
    }

    #[test]
    fn apply_writes_intentionally_empty_file() -> anyhow::Result<()> {
        let target = tempdir()?;
        let path = target.path().join("foo");

        let root = root_with_file(target.path(), FileState::new("empty_foo", true, 0o666, ""));
        root.apply(&mut FsActuator::new())?;
        assert_eq!(fs::read(&path)?, Vec::<u8>::new());

        Ok(())
    }

    #[test]
    fn apply_replaces_directory_with_file() -> anyhow::Result<()> {
        let target = tempdir()?;
        let path = target.path().join("foo");
        fs::create_dir_all(path.join("nested"))?;

        let root = root_with_file(target.path(), FileState::new("foo", false, 0o666, "bar"));
        let mut actuator = DryRunActuator::new();
        root.apply(&mut actuator)?;
        let expect = vec![
            Effect::RemoveAll { path: path.clone() },
            Effect::WriteFile {
                path: path.clone(),
                contents: b"bar".to_vec(),
                mode: 0o644,
            },
        ];
        assert_eq!(actuator.effects(), expect.as_slice());

        root.apply(&mut FsActuator::new())?;
        assert_eq!(fs::read_to_string(&path)?, "bar");

        Ok(())
    }

    #[test]
    fn apply_replaces_file_and_symlink_with_directory() -> anyhow::Result<()> {
        let target = tempdir()?;
        fs::write(target.path().join("file"), "x")?;
        symlink(target.path().join("file"), target.path().join("link"))?;

        let mut root = RootState::new(target.path(), 0o022, target.path().join(".dotsmith"), Data::new());
        root.dirs.insert("file".into(), DirState::new("file", 0o777));
        root.dirs.insert("link".into(), DirState::new("link", 0o777));
        root.apply(&mut FsActuator::new())?;

        for name in ["file", "link"] {
            let metadata = fs::symlink_metadata(target.path().join(name))?;
            assert!(metadata.is_dir());
            assert_eq!(metadata.permissions().mode() & 0o777, 0o755);
        }

        Ok(())
    }

    #[test]
    fn apply_stops_at_first_error() -> anyhow::Result<()> {
        let target = tempdir()?;
        fs::write(target.path().join("blocker"), "x")?;

        let mut dir = DirState::new("dir", 0o777);
        dir.files
            .insert("foo".into(), FileState::new("dir/foo", false, 0o666, "bar"));
        let mut root = RootState::new(target.path().join("blocker"), 0o022, target.path(), Data::new());
        root.dirs.insert("dir".into(), dir);

        let result = root.apply(&mut FsActuator::new());
        assert!(matches!(result, Err(StateError::Access { .. })));
        assert_eq!(fs::read_to_string(target.path().join("blocker"))?, "x");

        Ok(())
    }
}
