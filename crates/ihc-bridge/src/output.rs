//! Output helpers: item tables via `tabled`, quiet-aware printing.

use std::io::{self, Write};

use tabled::{Table, Tabled, settings::Style};

use ihc_config::ItemEntry;

/// One row of the item table.
#[derive(Tabled)]
pub struct ItemRow {
    #[tabled(rename = "Item")]
    pub name: String,
    #[tabled(rename = "Resource")]
    pub resource: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Refresh")]
    pub refresh: String,
    #[tabled(rename = "Direction")]
    pub direction: &'static str,
}

impl From<&ItemEntry> for ItemRow {
    fn from(item: &ItemEntry) -> Self {
        Self {
            name: item.name.clone(),
            resource: format!("{} (0x{:x})", item.resource, item.resource),
            kind: item.kind.to_lowercase(),
            refresh: if item.refresh == 0 {
                "-".into()
            } else {
                format!("{}s", item.refresh)
            },
            direction: if item.out_only { "out" } else { "in/out" },
        }
    }
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
