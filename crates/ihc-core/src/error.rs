// ── Core error types ──
//
// Errors raised while turning controller data into item updates. None of
// these escape the background loops; they are logged at the loop or item
// boundary. `CoreError` exists so helpers can use `?` and callers of the
// synchronous entry points get something typed.

use thiserror::Error;

use crate::convert::ConversionError;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("No active controller session")]
    ControllerUnavailable,

    #[error("Controller communication failed: {0}")]
    Communication(#[from] ihc_api::Error),

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Item not found or of unsupported type: {item}")]
    ItemNotFound { item: String },

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` if the underlying controller error is a transport
    /// failure worth reconnecting for.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Communication(e) if e.is_transport())
    }
}
