//! Binding engine between an IHC home-automation controller and a
//! host's item model.
//!
//! An [`IhcBinding`] polls resources on a per-item interval, forwards
//! runtime value notifications, and reconnects when the controller
//! restarts its program. Values are converted into semantic [`State`]s
//! and posted through an [`EventPublisher`].
//!
//! ```text
//!   ConnectionManager ─┬─ RefreshScheduler ───────┐
//!                      ├─ NotificationListener ───┼─► convert ─► EventPublisher
//!                      └─ ControllerStateListener │
//!   BindingRegistry ───────────────────────────────┘
//! ```

pub mod binding;
pub mod config;
mod context;
pub mod convert;
pub mod error;
pub mod listener;
pub mod model;
pub mod publisher;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use binding::IhcBinding;
pub use config::{BindingConfig, ControllerEndpoint};
pub use convert::{ConversionError, convert};
pub use error::CoreError;
pub use listener::ListenerPhase;
pub use model::{
    Decimal, ItemBinding, ItemKind, ItemUpdate, OnOff, OpenClosed, State, UpdateSource,
};
pub use publisher::{BroadcastPublisher, EventPublisher};
pub use registry::{BindingProvider, BindingRegistry, ItemRegistry, StaticProvider};
pub use scheduler::TickSummary;
pub use store::CoordinationState;
