// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Target state model.
//!
//! The __target state__ is the in-memory description of what the target
//! tree should look like. It is derived from the source tree, where each
//! entry name encodes the attributes of its target through the naming
//! convention in [`naming`](crate::naming).
//!
//! # Layout
//!
//! A [`RootState`] owns the whole tree. Each level holds a mapping of
//! target directory names to [`DirState`] nodes and a mapping of target file
//! names to [`FileState`] nodes. Nodes are never shared between parents.
//! Mappings are ordered, so every walk over the tree visits children in
//! lexicographic order of their target names, files before directories.
//!
//! # Lifecycle
//!
//! 1. Construct a [`RootState`] with fixed target directory, source
//!    directory, umask, and template data.
//! 2. Fill it through [`RootState::populate`] or repeated calls to
//!    [`RootState::add`].
//! 3. Reconcile a target tree with [`RootState::apply`], or export it with
//!    [`RootState::archive`]. Neither mutates the model.
//!
//! # Absent Files
//!
//! A [`FileState`] with no contents that is not marked as empty denotes
//! _absence_. Applying it removes any such file from the target tree instead
//! of creating a zero byte file.

mod add;
mod apply;
mod archive;
mod populate;

pub use add::{AddOptions, KEEP_FILE};
pub use archive::ArchiveHeader;

use crate::template::Data;

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Component, Path, PathBuf},
};

/// Desired state of a single target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileState {
    pub(crate) source_name: PathBuf,

    /// File must exist even when contents are empty.
    pub empty: bool,

    /// Permission bits before umask.
    pub mode: u32,

    /// Exact contents after template rendering.
    pub contents: Vec<u8>,
}

impl FileState {
    /// Construct new file state.
    pub fn new(source_name: impl Into<PathBuf>, empty: bool, mode: u32, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            source_name: source_name.into(),
            empty,
            mode,
            contents: contents.into(),
        }
    }

    /// Path of encoded entry relative to source directory.
    pub fn source_name(&self) -> &Path {
        &self.source_name
    }

    /// Check if file should not exist in the target tree at all.
    pub fn is_absent(&self) -> bool {
        self.contents.is_empty() && !self.empty
    }
}

/// Desired state of a single target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirState {
    pub(crate) source_name: PathBuf,

    /// Permission bits before umask.
    pub mode: u32,

    /// Subdirectories keyed by target name.
    pub dirs: BTreeMap<String, DirState>,

    /// Files keyed by target name.
    pub files: BTreeMap<String, FileState>,
}

impl DirState {
    /// Construct new empty directory state.
    pub fn new(source_name: impl Into<PathBuf>, mode: u32) -> Self {
        Self {
            source_name: source_name.into(),
            mode,
            dirs: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    /// Path of encoded entry relative to source directory.
    pub fn source_name(&self) -> &Path {
        &self.source_name
    }
}

/// Either kind of node in the target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stater<'a> {
    Dir(&'a DirState),
    File(&'a FileState),
}

impl<'a> Stater<'a> {
    /// Path of encoded entry relative to source directory.
    pub fn source_name(&self) -> &'a Path {
        match self {
            Self::Dir(state) => state.source_name(),
            Self::File(state) => state.source_name(),
        }
    }

    /// Kind of node.
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Dir(_) => EntryKind::Dir,
            Self::File(_) => EntryKind::File,
        }
    }
}

/// Kind of entry claiming a target name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

impl Display for EntryKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Dir => fmt.write_str("directory"),
            Self::File => fmt.write_str("file"),
        }
    }
}

/// Root of the target state.
#[derive(Debug, Clone, PartialEq)]
pub struct RootState {
    pub(crate) target_dir: PathBuf,
    pub(crate) umask: u32,
    pub(crate) source_dir: PathBuf,
    pub(crate) data: Data,

    /// Top-level directories keyed by target name.
    pub dirs: BTreeMap<String, DirState>,

    /// Top-level files keyed by target name.
    pub files: BTreeMap<String, FileState>,
}

impl RootState {
    /// Construct new empty root state.
    ///
    /// Both directories are expected to be absolute paths, and stay fixed for
    /// the lifetime of the root state.
    pub fn new(
        target_dir: impl Into<PathBuf>,
        umask: u32,
        source_dir: impl Into<PathBuf>,
        data: Data,
    ) -> Self {
        Self {
            target_dir: target_dir.into(),
            umask,
            source_dir: source_dir.into(),
            data,
            dirs: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn umask(&self) -> u32 {
        self.umask
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    /// Look up node by target path relative to target directory.
    pub fn get(&self, target_name: impl AsRef<Path>) -> Option<Stater<'_>> {
        let components = path_components(target_name.as_ref()).ok()?;
        let (name, parents) = components.split_last()?;
        let (dirs, files) = self.children(parents)?;

        if let Some(state) = dirs.get(name) {
            return Some(Stater::Dir(state));
        }

        files.get(name).map(Stater::File)
    }

    /// Every node in the target state keyed by relative target path.
    pub fn all_states(&self) -> BTreeMap<PathBuf, Stater<'_>> {
        let mut result = BTreeMap::new();
        collect_states(&self.dirs, &self.files, Path::new(""), &mut result);
        result
    }

    pub(crate) fn children(&self, components: &[String]) -> Option<(&Dirs, &Files)> {
        let mut dirs = &self.dirs;
        let mut files = &self.files;
        for component in components {
            let state = dirs.get(component)?;
            dirs = &state.dirs;
            files = &state.files;
        }

        Some((dirs, files))
    }

    pub(crate) fn children_mut(&mut self, components: &[String]) -> Option<(&mut Dirs, &mut Files)> {
        let mut dirs = &mut self.dirs;
        let mut files = &mut self.files;
        for component in components {
            let state = dirs.get_mut(component)?;
            dirs = &mut state.dirs;
            files = &mut state.files;
        }

        Some((dirs, files))
    }

    pub(crate) fn find_dir(&self, components: &[String]) -> Option<&DirState> {
        let (name, parents) = components.split_last()?;
        self.children(parents)?.0.get(name)
    }
}

pub(crate) type Dirs = BTreeMap<String, DirState>;
pub(crate) type Files = BTreeMap<String, FileState>;

fn collect_states<'a>(
    dirs: &'a Dirs,
    files: &'a Files,
    prefix: &Path,
    result: &mut BTreeMap<PathBuf, Stater<'a>>,
) {
    for (name, state) in files {
        result.insert(prefix.join(name), Stater::File(state));
    }

    for (name, state) in dirs {
        let path = prefix.join(name);
        collect_states(&state.dirs, &state.files, &path, result);
        result.insert(path, Stater::Dir(state));
    }
}

/// Split relative path into UTF-8 components.
///
/// # Errors
///
/// - Return [`StateError::NonUnicode`] if any component is not UTF-8.
pub(crate) fn path_components(path: &Path) -> Result<Vec<String>> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .map(|name| {
            name.to_str()
                .map(str::to_owned)
                .ok_or_else(|| StateError::NonUnicode { path: path.into() })
        })
        .collect()
}

/// Target state error types.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Path cannot be inspected or read.
    #[error("failed to access {:?}", path.display())]
    Access {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Source tree cannot be walked.
    #[error("failed to walk source directory")]
    Walk(#[from] walkdir::Error),

    /// Actuator failed to perform an effect.
    #[error(transparent)]
    Actuator(#[from] std::io::Error),

    /// Source tree contains something other than files or directories.
    #[error("unsupported file type: {:?}", path.display())]
    UnsupportedFileType { path: PathBuf },

    /// Added target is neither a regular file nor a directory.
    #[error("{:?}: not a regular file or directory", path.display())]
    NotFileOrDir { path: PathBuf },

    /// Target name is already claimed by an entry of the other kind.
    #[error("{:?}: already added as a {existing}", path.display())]
    Conflict { path: PathBuf, existing: EntryKind },

    /// Two source entries map to the same target name.
    #[error("{:?}: already provided by {:?}", path.display(), existing_source.display())]
    Duplicate { path: PathBuf, existing_source: PathBuf },

    /// Target name cannot be expressed through the naming convention.
    #[error("{:?}: name clashes with source naming convention", path.display())]
    Unencodable { path: PathBuf },

    /// Added target lies outside of target directory.
    #[error("{:?}: outside target directory {:?}", path.display(), target_dir.display())]
    OutsideTarget { path: PathBuf, target_dir: PathBuf },

    /// Archive entry cannot be written.
    #[error("failed to archive {:?}", path.display())]
    Archive {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Path is not valid unicode.
    #[error("{:?}: path is not valid unicode", path.display())]
    NonUnicode { path: PathBuf },

    /// Template rendering fails.
    #[error(transparent)]
    Template(#[from] crate::template::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = StateError> = std::result::Result<T, E>;
