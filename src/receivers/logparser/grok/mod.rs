// SPDX-License-Identifier: Apache-2.0

//! Grok pattern grammars.
//!
//! A grok pattern is a regular expression that may reference named
//! definitions from a [`PatternLibrary`] with `%{NAME}` (inlined, not
//! captured) or `%{NAME:capture}` (inlined and reported as `capture`).
//! [`Grammar::compile`] expands those references recursively and compiles
//! the result once.

mod grammar;
mod library;
mod patterns;

pub use grammar::{Capture, Grammar};
pub use library::PatternLibrary;
