// SPDX-License-Identifier: Apache-2.0

mod grok;
mod traits;

pub use grok::GrokParser;
pub use traits::{LineParser, ParserFactory};
