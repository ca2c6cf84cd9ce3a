// ── Coordination store ──
//
// Lock-free timestamps shared by the engine's scheduling contexts.

mod coordination;

pub use coordination::CoordinationState;
