// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Export target state as a tar archive.
//!
//! Entries are named by their path relative to the target directory, and
//! appear in the same order that [`RootState::apply`] visits them. Absent
//! files have no entry.

use crate::state::{Dirs, Files, Result, RootState, StateError};

use std::{
    fs::Metadata,
    io::Write,
    os::unix::fs::MetadataExt,
    path::Path,
};
use tar::{Builder, EntryType, Header};
use tracing::{debug, instrument};

/// Ownership and timestamp shared by every archive entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub uid: u64,
    pub gid: u64,
    pub username: String,
    pub groupname: String,
    pub mtime: u64,
}

impl ArchiveHeader {
    /// Take ownership and modification time from existing file metadata.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            uid: u64::from(metadata.uid()),
            gid: u64::from(metadata.gid()),
            mtime: u64::try_from(metadata.mtime()).unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Set user and group names.
    pub fn with_names(mut self, username: impl Into<String>, groupname: impl Into<String>) -> Self {
        self.username = username.into();
        self.groupname = groupname.into();
        self
    }

    fn entry(&self, entry_type: EntryType, mode: u32, size: u64, path: &Path) -> Result<Header> {
        let mut header = Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_mode(mode);
        header.set_size(size);
        header.set_uid(self.uid);
        header.set_gid(self.gid);
        header.set_mtime(self.mtime);
        header
            .set_username(&self.username)
            .and_then(|_| header.set_groupname(&self.groupname))
            .map_err(|err| StateError::Archive {
                source: err,
                path: path.into(),
            })?;

        Ok(header)
    }
}

impl RootState {
    /// Write every present node of target state into tar archive.
    ///
    /// Permissions are written with the umask already applied. The archive
    /// is not finished, so callers can keep appending to it.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Archive`] if an entry cannot be written.
    #[instrument(skip(self, builder, header), level = "debug")]
    pub fn archive<W: Write>(&self, builder: &mut Builder<W>, header: &ArchiveHeader) -> Result<()> {
        archive_children(&self.dirs, &self.files, Path::new(""), self.umask, builder, header)
    }
}

fn archive_children<W: Write>(
    dirs: &Dirs,
    files: &Files,
    prefix: &Path,
    umask: u32,
    builder: &mut Builder<W>,
    header: &ArchiveHeader,
) -> Result<()> {
    for (name, state) in files {
        if state.is_absent() {
            continue;
        }

        let path = prefix.join(name);
        debug!("archive file {:?}", path.display());
        let mut entry = header.entry(
            EntryType::Regular,
            state.mode & !umask & 0o777,
            state.contents.len() as u64,
            &path,
        )?;
        builder
            .append_data(&mut entry, &path, state.contents.as_slice())
            .map_err(|err| StateError::Archive {
                source: err,
                path: path.clone(),
            })?;
    }

    for (name, state) in dirs {
        let path = prefix.join(name);
        debug!("archive directory {:?}", path.display());
        let mut entry = header.entry(EntryType::Directory, state.mode & !umask & 0o777, 0, &path)?;
        builder
            .append_data(&mut entry, &path, std::io::empty())
            .map_err(|err| StateError::Archive {
                source: err,
                path: path.clone(),
            })?;
        archive_children(&state.dirs, &state.files, &path, umask, builder, header)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::{DirState, FileState},
        template::Data,
    };

    use pretty_assertions::assert_eq;
    use std::io::Read;
    use tar::Archive;

    #[test]
    fn archive_lists_entries_in_apply_order() -> anyhow::Result<()> {
        let mut root = RootState::new("/home/user", 0o022, "/home/user/.dotsmith", Data::new());
        root.files
            .insert(".bashrc".into(), FileState::new("dot_bashrc", false, 0o666, "bar"));
        root.files
            .insert("absent".into(), FileState::new("absent.tmpl", false, 0o666, ""));
        root.files
            .insert("empty".into(), FileState::new("empty_empty", true, 0o666, ""));
        let mut ssh = DirState::new("private_dot_ssh", 0o700);
        ssh.files
            .insert("config".into(), FileState::new("private_dot_ssh/config", false, 0o600, "Host *\n"));
        root.dirs.insert(".ssh".into(), ssh);

        let header = ArchiveHeader {
            uid: 1000,
            gid: 100,
            username: "user".into(),
            groupname: "users".into(),
            mtime: 1_700_000_000,
        };
        let mut builder = Builder::new(Vec::new());
        root.archive(&mut builder, &header)?;
        let bytes = builder.into_inner()?;

        let mut archive = Archive::new(bytes.as_slice());
        let mut result = Vec::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            let mut contents = String::new();
            entry.read_to_string(&mut contents)?;
            let entry_header = entry.header();
            assert_eq!(entry_header.uid()?, 1000);
            assert_eq!(entry_header.gid()?, 100);
            assert_eq!(entry_header.mtime()?, 1_700_000_000);
            assert_eq!(entry_header.username()?, Some("user"));
            result.push((
                entry.path()?.to_string_lossy().into_owned(),
                entry_header.mode()?,
                contents,
            ));
        }

        let expect = vec![
            (".bashrc".to_string(), 0o644, "bar".to_string()),
            ("empty".to_string(), 0o644, String::new()),
            (".ssh".to_string(), 0o700, String::new()),
            (".ssh/config".to_string(), 0o600, "Host *\n".to_string()),
        ];
        assert_eq!(result, expect);

        Ok(())
    }
}
