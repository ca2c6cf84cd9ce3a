//! `validate`: load the config and print the item table.

use tracing::{debug, warn};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, ItemRow};

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (config, path) = super::load(global)?;
    debug!(path = %path.display(), items = config.items.len(), "config loaded");

    match config.endpoint() {
        Ok(endpoint) => debug!(url = %endpoint.url, user = %endpoint.username, "controller endpoint"),
        // Items alone are enough for a simulated run.
        Err(e) => warn!(error = %e, "controller endpoint incomplete"),
    }

    if config.items.is_empty() {
        output::print_output("No items configured.", global.quiet);
        return Ok(());
    }

    let rows: Vec<ItemRow> = config.items.iter().map(ItemRow::from).collect();
    output::print_output(&output::render_table(&rows), global.quiet);
    Ok(())
}
