//! `repogate config`

use super::ConfigCommand;
use anyhow::{Context, Result};
use repogate_common::RepogateConfig;
use repogate_common::config::default_config_path;
use std::path::Path;
use std::process::ExitCode;

pub fn run(
    command: &ConfigCommand,
    config: &RepogateConfig,
    explicit_path: Option<&Path>,
) -> Result<ExitCode> {
    match command {
        ConfigCommand::Show => {
            let source = explicit_path
                .map(Path::to_path_buf)
                .or_else(default_config_path)
                .filter(|p| p.exists());
            match source {
                Some(path) => println!("# loaded from {}", path.display()),
                None => println!("# no config file; built-in defaults"),
            }
            println!(
                "# trust store: {}",
                config.trust_store.resolved_root().display()
            );
            print!(
                "{}",
                config
                    .to_toml()
                    .context("Failed to render configuration as TOML")?
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}
