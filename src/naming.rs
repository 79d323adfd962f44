// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source naming convention.
//!
//! Entries in the source tree carry the attributes of their target through
//! a fixed set of __naming markers__. Prefixes are always applied in the
//! same order:
//!
//! 1. `private_` if the mode has no group or other permission bits.
//! 2. `empty_` if the file should exist even when it has no contents.
//! 3. `executable_` if the file has any execute bit set.
//! 4. `dot_` replacing a leading `.` of the target name.
//!
//! Files rendered as templates also get a `.tmpl` suffix. Directories only
//! ever use the `private_` and `dot_` markers.
//!
//! Decoding is total. A missing marker simply means the attribute is off, so
//! there is no such thing as a malformed source name.

pub const PRIVATE_PREFIX: &str = "private_";
pub const EMPTY_PREFIX: &str = "empty_";
pub const EXECUTABLE_PREFIX: &str = "executable_";
pub const DOT_PREFIX: &str = "dot_";
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

/// Target attributes of a file decoded from its source name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    /// Name of the file in the target tree.
    pub name: String,

    /// Canonical permission bits before umask.
    pub mode: u32,

    /// File must exist even with zero bytes of content.
    pub empty: bool,

    /// Contents must be rendered as a template.
    pub template: bool,
}

impl FileAttributes {
    /// Encode attributes into a source file name.
    pub fn source_name(&self) -> String {
        encode_file(&self.name, self.mode, self.empty, self.template)
    }
}

/// Target attributes of a directory decoded from its source name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirAttributes {
    /// Name of the directory in the target tree.
    pub name: String,

    /// Canonical permission bits before umask.
    pub mode: u32,
}

impl DirAttributes {
    /// Encode attributes into a source directory name.
    pub fn source_name(&self) -> String {
        encode_dir(&self.name, self.mode)
    }
}

/// Encode target file attributes into a source file name.
pub fn encode_file(name: &str, mode: u32, empty: bool, template: bool) -> String {
    let mut source_name = String::new();
    if is_private(mode) {
        source_name.push_str(PRIVATE_PREFIX);
    }

    if empty {
        source_name.push_str(EMPTY_PREFIX);
    }

    if mode & 0o111 != 0 {
        source_name.push_str(EXECUTABLE_PREFIX);
    }

    push_dotted(&mut source_name, name);
    if template {
        source_name.push_str(TEMPLATE_SUFFIX);
    }

    source_name
}

/// Encode target directory attributes into a source directory name.
pub fn encode_dir(name: &str, mode: u32) -> String {
    let mut source_name = String::new();
    if is_private(mode) {
        source_name.push_str(PRIVATE_PREFIX);
    }

    push_dotted(&mut source_name, name);

    source_name
}

/// Decode a single source file name.
pub fn decode_file(source_name: &str) -> FileAttributes {
    let (private, name) = strip(source_name, PRIVATE_PREFIX);
    let (empty, name) = strip(name, EMPTY_PREFIX);
    let (executable, name) = strip(name, EXECUTABLE_PREFIX);
    let mut name = undotted(name);
    let template = match name.strip_suffix(TEMPLATE_SUFFIX) {
        Some(stripped) => {
            name = stripped.to_string();
            true
        }
        None => false,
    };

    let mut mode = 0o666;
    if executable {
        mode |= 0o111;
    }

    if private {
        mode &= 0o700;
    }

    FileAttributes {
        name,
        mode,
        empty,
        template,
    }
}

/// Decode a single source directory name.
pub fn decode_dir(source_name: &str) -> DirAttributes {
    let (private, name) = strip(source_name, PRIVATE_PREFIX);
    let mode = if private { 0o700 } else { 0o777 };

    DirAttributes {
        name: undotted(name),
        mode,
    }
}

fn is_private(mode: u32) -> bool {
    mode & 0o077 == 0
}

fn strip<'a>(name: &'a str, prefix: &str) -> (bool, &'a str) {
    match name.strip_prefix(prefix) {
        Some(stripped) => (true, stripped),
        None => (false, name),
    }
}

fn push_dotted(source_name: &mut String, name: &str) {
    match name.strip_prefix('.') {
        Some(rest) => {
            source_name.push_str(DOT_PREFIX);
            source_name.push_str(rest);
        }
        None => source_name.push_str(name),
    }
}

fn undotted(name: &str) -> String {
    match name.strip_prefix(DOT_PREFIX) {
        Some(rest) => format!(".{rest}"),
        None => name.to_string(),
    }
}
