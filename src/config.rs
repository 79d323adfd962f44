// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that dotsmith uses to
//! simplify the process of serialization and deserialization. File I/O is
//! left to the caller to figure out.

use crate::template::Data;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Umask used when nothing else is configured.
pub const DEFAULT_UMASK: u32 = 0o022;

/// Configuration file layout.
///
/// Every setting is optional. Missing directories are resolved by the caller
/// through [`path`](crate::path), while the `[data]` table becomes the
/// context of every template in the source tree.
///
/// # General Layout
///
/// ```toml
/// source_dir = "$HOME/dotfiles"
/// target_dir = "~"
/// umask = "022"
/// dry_run = false
/// verbose = false
///
/// [data]
/// email = "john@example.com"
/// ```
#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the encoded source tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<PathBuf>,

    /// Directory that source tree gets applied to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<PathBuf>,

    /// Permission bits to clear from every mode, written in octal.
    #[serde(with = "octal")]
    pub umask: u32,

    /// Only report what would be done.
    pub dry_run: bool,

    /// Show every change made to the target directory.
    pub verbose: bool,

    /// Template data.
    pub data: Data,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: None,
            target_dir: None,
            umask: DEFAULT_UMASK,
            dry_run: false,
            verbose: false,
            data: Data::new(),
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on directory fields.
        config.source_dir = config.source_dir.map(expand).transpose()?;
        config.target_dir = config.target_dir.map(expand).transpose()?;

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(path: PathBuf) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(&path.to_string_lossy())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Umask as an octal string, or as a plain integer.
mod octal {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(u32),
        Str(String),
    }

    pub(super) fn serialize<S: Serializer>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{mode:03o}"))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let mode = match Repr::deserialize(deserializer)? {
            Repr::Int(mode) => mode,
            Repr::Str(text) => {
                let digits = text.trim_start_matches("0o");
                u32::from_str_radix(digits, 8).map_err(serde::de::Error::custom)?
            }
        };

        if mode > 0o777 {
            return Err(serde::de::Error::custom(format!("umask {mode:o} exceeds 777")));
        }

        Ok(mode)
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah")])]
    fn deserialize_config() -> anyhow::Result<()> {
        let result: Config = r#"
            source_dir = "$BLAH/dotfiles"
            target_dir = "${BLAH}"
            umask = "077"
            dry_run = true

            [data]
            email = "blah@example.com"

            [data.git]
            signing = true
        "#
        .parse()?;

        let mut data = Data::new();
        data.insert("email".into(), "blah@example.com".into());
        let mut git = Data::new();
        git.insert("signing".into(), true.into());
        data.insert("git".into(), git.into());
        let expect = Config {
            source_dir: Some("/home/blah/dotfiles".into()),
            target_dir: Some("/home/blah".into()),
            umask: 0o077,
            dry_run: true,
            verbose: false,
            data,
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_empty_config() -> anyhow::Result<()> {
        let result: Config = "".parse()?;
        assert_eq!(result, Config::default());
        assert_eq!(result.umask, 0o022);

        let result: Config = "umask = 0o027".parse()?;
        assert_eq!(result.umask, 0o027);

        Ok(())
    }

    #[test]
    fn reject_bad_umask() {
        assert!("umask = \"999\"".parse::<Config>().is_err());
        assert!("umask = \"7777\"".parse::<Config>().is_err());
    }

    #[sealed_test]
    fn reject_unset_variable() {
        let result = "source_dir = \"$DOTSMITH_NOT_SET/foo\"".parse::<Config>();
        assert!(matches!(result, Err(ConfigError::ShellExpansion(..))));
    }

    #[test]
    fn serialize_config() {
        let mut data = Data::new();
        data.insert("email".into(), "blah@example.com".into());
        let result = Config {
            source_dir: Some("/home/blah/dotfiles".into()),
            target_dir: None,
            umask: 0o022,
            dry_run: false,
            verbose: true,
            data,
        }
        .to_string();

        let expect = indoc! {r#"
            source_dir = "/home/blah/dotfiles"
            umask = "022"
            dry_run = false
            verbose = true

            [data]
            email = "blah@example.com"
        "#};

        assert_eq!(result, expect);
    }
}
