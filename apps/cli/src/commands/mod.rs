//! Command implementations for the `vocalis` binary.

pub mod check_audio;
pub mod create_voice;
pub mod prepare;
pub mod status;
pub mod synthesize;
pub mod upload;

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Token cancelled on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight work");
            child.cancel();
        }
    });
    token
}
