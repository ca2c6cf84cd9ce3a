// ── Domain model ──
//
// Item bindings and the semantic states published to items.

pub mod binding;
pub mod state;

pub use binding::{ItemBinding, ItemKind};
pub use state::{Decimal, ItemUpdate, OnOff, OpenClosed, State, UpdateSource};
