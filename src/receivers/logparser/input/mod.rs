// SPDX-License-Identifier: Apache-2.0

mod finder;

pub use finder::FileFinder;
