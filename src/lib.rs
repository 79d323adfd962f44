// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile manager core.
//!
//! A __source tree__ holds one encoded entry per managed dotfile. Entry names
//! carry target attributes through the [naming convention](naming), so
//! `private_dot_ssh/config` manages `~/.ssh/config` with owner-only access.
//! Files ending in `.tmpl` are rendered against user data through the
//! [template] module before they reach the __target tree__.
//!
//! The [`RootState`](state::RootState) is the in-memory model linking the
//! two trees. It can be filled from the source tree, extended by absorbing
//! existing target entries, and reconciled against the target tree through
//! an [`Actuator`](actuator::Actuator).

pub mod actuator;
pub mod config;
pub mod naming;
pub mod path;
pub mod state;
pub mod template;
