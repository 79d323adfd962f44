// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations of the source directory, the target
//! directory, and the configuration file.

use std::path::PathBuf;

/// Determine absolute path to user's home directory.
///
/// Serves as the default target directory. Does not check if the path
/// returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to source directory.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/dotsmith`. Does not check if
/// the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_source_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("dotsmith"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/dotsmith/config.toml`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("dotsmith").join("config.toml"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HOME", "/home/blah"), ("XDG_DATA_HOME", "/home/blah/.local/share"), ("XDG_CONFIG_HOME", "/home/blah/.config")])]
    fn default_paths_follow_xdg() -> anyhow::Result<()> {
        assert_eq!(home_dir()?, PathBuf::from("/home/blah"));
        assert_eq!(default_source_dir()?, PathBuf::from("/home/blah/.local/share/dotsmith"));
        assert_eq!(
            default_config_path()?,
            PathBuf::from("/home/blah/.config/dotsmith/config.toml")
        );

        Ok(())
    }
}
