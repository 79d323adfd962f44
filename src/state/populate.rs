// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build target state from the source tree.

use crate::{
    naming::{decode_dir, decode_file},
    state::{path_components, Dirs, DirState, EntryKind, FileState, Files, Result, RootState, StateError},
    template::{Renderer, TeraRenderer},
};

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};
use walkdir::{DirEntry, WalkDir};

impl RootState {
    /// Populate target state from source directory.
    ///
    /// Templates are rendered with [`TeraRenderer`].
    ///
    /// # Errors
    ///
    /// - Return [`StateError`] if walk fails for any reason. See
    ///   [`RootState::populate_with`].
    pub fn populate(&mut self) -> Result<()> {
        self.populate_with(&TeraRenderer::new())
    }

    /// Populate target state from source directory with template renderer.
    ///
    /// Walks the source directory in lexicographic order, so every directory
    /// is inserted before anything inside of it. Entries whose own name
    /// begins with "." are skipped, and so is everything below them. A
    /// missing source directory yields an empty target state.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Walk`] if source directory cannot be walked.
    /// - Return [`StateError::Access`] if source file cannot be read.
    /// - Return [`StateError::UnsupportedFileType`] if source tree contains
    ///   anything besides regular files and directories.
    /// - Return [`StateError::Template`] if template rendering fails.
    /// - Return [`StateError::Conflict`] or [`StateError::Duplicate`] if two
    ///   source entries claim the same target name.
    /// - Return [`StateError::NonUnicode`] if a source name is not UTF-8.
    #[instrument(skip(self, renderer), level = "debug")]
    pub fn populate_with(&mut self, renderer: &impl Renderer) -> Result<()> {
        match fs::symlink_metadata(&self.source_dir) {
            Ok(_) => (),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("source directory {:?} does not exist", self.source_dir.display());
                return Ok(());
            }
            Err(err) => {
                return Err(StateError::Access {
                    source: err,
                    path: self.source_dir.clone(),
                })
            }
        }

        let walker = WalkDir::new(&self.source_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry));

        for entry in walker {
            let entry = entry?;
            let path = entry.path();

            // INVARIANT: Walked paths always start with the source directory.
            let source_name = path.strip_prefix(&self.source_dir).unwrap_or(path);
            let components = path_components(source_name)?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                debug!("populate directory {:?}", source_name.display());
                self.insert_source_dir(source_name, &components)?;
            } else if file_type.is_file() {
                debug!("populate file {:?}", source_name.display());
                self.insert_source_file(path, source_name, &components, renderer)?;
            } else {
                return Err(StateError::UnsupportedFileType { path: path.into() });
            }
        }

        Ok(())
    }

    fn insert_source_dir(&mut self, source_name: &Path, components: &[String]) -> Result<()> {
        let Some((last, parents)) = components.split_last() else {
            return Ok(());
        };

        let attributes = decode_dir(last);
        let target_name = target_name(parents).join(&attributes.name);
        let (dirs, files) = self.ensure_dirs(parents)?;
        if files.contains_key(&attributes.name) {
            return Err(StateError::Conflict {
                path: target_name,
                existing: EntryKind::File,
            });
        }

        if let Some(existing) = dirs.get(&attributes.name) {
            return Err(StateError::Duplicate {
                path: target_name,
                existing_source: existing.source_name.clone(),
            });
        }

        dirs.insert(attributes.name, DirState::new(source_name, attributes.mode));

        Ok(())
    }

    fn insert_source_file(
        &mut self,
        path: &Path,
        source_name: &Path,
        components: &[String],
        renderer: &impl Renderer,
    ) -> Result<()> {
        let Some((last, parents)) = components.split_last() else {
            return Ok(());
        };

        let attributes = decode_file(last);
        let mut contents = fs::read(path).map_err(|err| StateError::Access {
            source: err,
            path: path.into(),
        })?;
        if attributes.template {
            contents = renderer.render(path, &contents, &self.data)?;
        }

        let target_name = target_name(parents).join(&attributes.name);
        let (dirs, files) = self.ensure_dirs(parents)?;
        if dirs.contains_key(&attributes.name) {
            return Err(StateError::Conflict {
                path: target_name,
                existing: EntryKind::Dir,
            });
        }

        if let Some(existing) = files.get(&attributes.name) {
            return Err(StateError::Duplicate {
                path: target_name,
                existing_source: existing.source_name.clone(),
            });
        }

        files.insert(
            attributes.name,
            FileState::new(source_name, attributes.empty, attributes.mode, contents),
        );

        Ok(())
    }

    /// Walk down chain of source directory names, inserting missing nodes.
    fn ensure_dirs(&mut self, components: &[String]) -> Result<(&mut Dirs, &mut Files)> {
        let mut dirs = &mut self.dirs;
        let mut files = &mut self.files;
        let mut source_name = PathBuf::new();
        let mut target_name = PathBuf::new();

        for component in components {
            source_name.push(component);
            let attributes = decode_dir(component);
            target_name.push(&attributes.name);
            if files.contains_key(&attributes.name) {
                return Err(StateError::Conflict {
                    path: target_name,
                    existing: EntryKind::File,
                });
            }

            let mode = attributes.mode;
            let state = dirs
                .entry(attributes.name)
                .or_insert_with(|| DirState::new(source_name.clone(), mode));
            dirs = &mut state.dirs;
            files = &mut state.files;
        }

        Ok((dirs, files))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().as_encoded_bytes().starts_with(b".")
}

fn target_name(components: &[String]) -> PathBuf {
    components
        .iter()
        .map(|component| decode_dir(component).name)
        .collect()
}
