//! Session and connection traits.
//!
//! The wire encoding of the controller protocol lives behind these two
//! traits. [`Communicator`] is one authenticated session; the
//! [`ConnectionManager`] owns it and knows how to (re)establish it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::value::{ControllerState, ResourceId, ResourceValue};

/// One open session with a controller.
///
/// Both `wait_*` calls block for at most `timeout`. Running out of time
/// is reported either as an empty result or as [`Error::Timeout`], never
/// as a transport failure.
#[async_trait]
pub trait Communicator: Send + Sync {
    /// Read the current value of a resource. `None` if the controller
    /// has no value to report.
    async fn resource_query(&self, id: ResourceId) -> Result<Option<ResourceValue>, Error>;

    /// Subscribe to runtime value changes for `ids`, replacing any
    /// earlier subscription of this session.
    async fn enable_runtime_value_notifications(&self, ids: &[ResourceId]) -> Result<(), Error>;

    /// Long-poll for changed values of subscribed resources.
    async fn wait_resource_value_notifications(
        &self,
        timeout: Duration,
    ) -> Result<Vec<ResourceValue>, Error>;

    async fn query_controller_state(&self) -> Result<ControllerState, Error>;

    /// Long-poll until the controller leaves `prior` or `timeout` passes.
    /// Returns the state current at that moment.
    async fn wait_state_change_notifications(
        &self,
        prior: &ControllerState,
        timeout: Duration,
    ) -> Result<ControllerState, Error>;
}

/// Owner of the controller session.
///
/// All lifecycle calls are idempotent. A failed call leaves the manager
/// in a state where a later call may succeed.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// The active session, or `None` while disconnected.
    fn communicator(&self) -> Option<Arc<dyn Communicator>>;

    /// Establish a session from scratch.
    async fn connect(&self) -> Result<(), Error>;

    /// Tear down the current session and establish a new one.
    async fn reconnect(&self) -> Result<(), Error>;

    /// Reopen the transport of the current session without a full login.
    async fn open_connection(&self) -> Result<(), Error>;

    /// When the transport was last (re)opened. Fresh sessions carry no
    /// subscriptions.
    fn last_open_time(&self) -> Option<DateTime<Utc>>;
}
