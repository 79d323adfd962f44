// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Absorb existing target entries into the source tree.

use crate::{
    actuator::Actuator,
    naming::{decode_dir, decode_file, encode_dir, encode_file},
    state::{path_components, DirState, EntryKind, FileState, Result, RootState, StateError},
    template::auto_template,
};

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Component, Path, PathBuf},
    str::from_utf8,
};
use tracing::{debug, info, instrument};

/// Placeholder written into empty source directories.
///
/// Version control systems do not track empty directories. The placeholder
/// begins with "." so population never picks it up.
pub const KEEP_FILE: &str = ".keep";

/// How new targets get encoded into the source tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    /// Add files that have no contents.
    pub empty: bool,

    /// Add files as templates.
    pub template: bool,
}

impl RootState {
    /// Add target entry to source tree and target state.
    ///
    /// Missing parent directories are added first. Adding something that is
    /// already part of the target state is a no-op, and so is adding a file
    /// without contents unless [`AddOptions::empty`] is set.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::OutsideTarget`] if target does not lie within
    ///   target directory.
    /// - Return [`StateError::Access`] if target cannot be inspected or read.
    /// - Return [`StateError::Conflict`] if target name is already claimed by
    ///   an entry of the other kind.
    /// - Return [`StateError::Unencodable`] if target name would decode to a
    ///   different name, e.g., `foo.tmpl` or `dot_foo`.
    /// - Return [`StateError::NotFileOrDir`] if target is neither a regular
    ///   file nor a directory.
    /// - Return [`StateError::Actuator`] if actuator fails.
    #[instrument(skip(self, target, actuator), level = "debug")]
    pub fn add(
        &mut self,
        target: impl AsRef<Path>,
        options: AddOptions,
        actuator: &mut impl Actuator,
    ) -> Result<()> {
        let target = target.as_ref();
        let target_name = self.target_name(target)?;
        let components = path_components(&target_name)?;
        let Some((name, parents)) = components.split_last() else {
            return Err(self.outside_target(target));
        };

        let metadata = fs::symlink_metadata(target).map_err(|err| StateError::Access {
            source: err,
            path: target.into(),
        })?;

        if !parents.is_empty() && self.find_dir(parents).is_none() {
            let parent = self.target_dir.join(parents.iter().collect::<PathBuf>());
            debug!("add missing parent {:?}", parent.display());
            self.add(&parent, AddOptions::default(), actuator)?;
        }

        let parent_source = self.parent_source_name(parents)?;
        let (has_dir, has_file) = match self.children(parents) {
            Some((dirs, files)) => (dirs.contains_key(name), files.contains_key(name)),
            None => (false, false),
        };
        let mode = metadata.permissions().mode() & 0o777;
        let file_mode = 0o666 & !self.umask;

        if metadata.is_file() {
            if has_file {
                debug!("{:?} already added", target_name.display());
                return Ok(());
            }

            if has_dir {
                return Err(StateError::Conflict {
                    path: target_name,
                    existing: EntryKind::Dir,
                });
            }

            let empty = metadata.len() == 0;
            if empty && !options.empty {
                debug!("skip empty file {:?}", target_name.display());
                return Ok(());
            }

            let contents = fs::read(target).map_err(|err| StateError::Access {
                source: err,
                path: target.into(),
            })?;

            // INVARIANT: Templates must be UTF-8 to render at all.
            let template = options.template && from_utf8(&contents).is_ok();
            if options.template && !template {
                debug!("add binary file {:?} verbatim", target_name.display());
            }

            let source_contents = if template {
                auto_template(&contents, &self.data)
            } else {
                contents.clone()
            };

            let encoded = encode_file(name, mode, empty, template);
            if decode_file(&encoded).name != *name {
                return Err(StateError::Unencodable { path: target_name });
            }

            let source_name = parent_source.join(encoded);
            info!("add {:?} as {:?}", target_name.display(), source_name.display());
            actuator.write_file(&self.source_dir.join(&source_name), &source_contents, file_mode, None)?;

            if let Some((_, files)) = self.children_mut(parents) {
                files.insert(name.clone(), FileState::new(source_name, empty, mode, contents));
            }
        } else if metadata.is_dir() {
            if has_dir {
                debug!("{:?} already added", target_name.display());
                return Ok(());
            }

            if has_file {
                return Err(StateError::Conflict {
                    path: target_name,
                    existing: EntryKind::File,
                });
            }

            let encoded = encode_dir(name, mode);
            if decode_dir(&encoded).name != *name {
                return Err(StateError::Unencodable { path: target_name });
            }

            let source_name = parent_source.join(encoded);
            let source_path = self.source_dir.join(&source_name);
            info!("add {:?} as {:?}", target_name.display(), source_name.display());
            actuator.mkdir(&source_path, 0o777 & !self.umask)?;

            let is_empty = fs::read_dir(target)
                .map_err(|err| StateError::Access {
                    source: err,
                    path: target.into(),
                })?
                .next()
                .is_none();
            if is_empty {
                actuator.write_file(&source_path.join(KEEP_FILE), &[], file_mode, None)?;
            }

            if let Some((dirs, _)) = self.children_mut(parents) {
                dirs.insert(name.clone(), DirState::new(source_name, mode));
            }
        } else {
            return Err(StateError::NotFileOrDir { path: target_name });
        }

        Ok(())
    }

    /// Relative path of target inside target directory.
    fn target_name(&self, target: &Path) -> Result<PathBuf> {
        let relative = target
            .strip_prefix(&self.target_dir)
            .map_err(|_| self.outside_target(target))?;

        // INVARIANT: No way to climb back out through "..".
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(self.outside_target(target));
        }

        Ok(relative.to_path_buf())
    }

    fn parent_source_name(&self, parents: &[String]) -> Result<PathBuf> {
        if parents.is_empty() {
            return Ok(PathBuf::new());
        }

        self.find_dir(parents)
            .map(|state| state.source_name.clone())
            .ok_or_else(|| StateError::Conflict {
                path: parents.iter().collect(),
                existing: EntryKind::File,
            })
    }

    fn outside_target(&self, target: &Path) -> StateError {
        StateError::OutsideTarget {
            path: target.into(),
            target_dir: self.target_dir.clone(),
        }
    }
}
