// SPDX-License-Identifier: Apache-2.0

use crate::init::args::AgentRun;
use crate::receivers::logparser::config::LogParserConfig;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::Path;
use tower::BoxError;

const ENV_PREFIX: &str = "LOGPARSER_";

/// Resolve the receiver configuration.
///
/// With `--config`, the TOML file is the base and `LOGPARSER_*` variables
/// override it (nested keys use `__`, e.g. `LOGPARSER_GROK__PATTERN`).
/// Without it, the command line flags are used. Either way the result is
/// validated.
pub fn get_logparser_config(agent: &AgentRun) -> Result<LogParserConfig, BoxError> {
    let config = match &agent.config {
        Some(path) => load_config_file(path)?,
        None => agent.logparser.build_config(),
    };

    config
        .validate()
        .map_err(|e| format!("invalid logparser config: {}", e))?;
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<LogParserConfig, BoxError> {
    // The flag form of `files` is comma separated and does not fit the
    // TOML list, so it is only taken from the file.
    let figment = Figment::new()
        .merge(Toml::file_exact(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["files"]));

    match figment.extract() {
        Ok(config) => Ok(config),
        Err(e) => Err(format!("failed to parse config file {}: {}", path.display(), e).into()),
    }
}
