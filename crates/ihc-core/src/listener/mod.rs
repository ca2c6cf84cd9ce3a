// ── Background listeners ──
//
// Two long-poll loops run for the lifetime of a started binding: one
// forwards runtime value notifications, the other watches the controller
// state and reconnects after a controller reboot or program upload.

pub(crate) mod controller_state;
pub(crate) mod notification;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use notification::ListenerPhase;

/// Sleep for `delay` unless cancelled first. Returns `false` on cancel.
pub(crate) async fn backoff(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}
