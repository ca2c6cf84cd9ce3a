//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = super::resolve_path(global);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let path = super::resolve_path(global);
            let mut config = ihc_config::load_config_from(&path)
                .map_err(|e| CliError::from_config(e, &path))?;
            if config.controller.password.is_some() {
                config.controller.password = Some(REDACTED.into());
            }
            let rendered = toml::to_string_pretty(&config)?;
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }
    }
}
