//! The transmission primitive and the channel that serializes access to it.

use std::path::Path;

use async_trait::async_trait;

use crate::error::GatewayError;

pub mod channel;
pub mod command;

pub use channel::{ChannelPermit, TransmissionChannel};
pub use command::CommandGateway;

/// Delivers one file to one destination.
///
/// `Err(GatewayError::Rejected)` means the attempt ran and failed;
/// `Fault` and `Timeout` mean it could not complete at all. Callers hold a
/// [`TransmissionChannel`] permit for the duration of every call.
#[async_trait]
pub trait TransmissionGateway: Send + Sync {
    async fn send(&self, file: &Path, destination: &str) -> Result<(), GatewayError>;

    fn name(&self) -> &str {
        "gateway"
    }
}
