//! Wire vocabulary for IHC / ELKO LS controllers.
//!
//! Defines the typed resource values a controller reports, its
//! self-reported lifecycle state, and the two async traits the binding
//! engine drives: [`Communicator`] (one session) and [`ConnectionManager`]
//! (owner of that session). The protocol encoding itself lives in the
//! implementations of those traits.

pub mod error;
pub mod session;
#[cfg(feature = "sim")]
pub mod sim;
pub mod value;

pub use error::Error;
pub use session::{Communicator, ConnectionManager};
pub use value::{ControllerState, ResourceId, ResourceValue, Value};
