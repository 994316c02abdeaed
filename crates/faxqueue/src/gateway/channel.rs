use std::sync::{Arc, OnceLock};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::GatewayError;

/// The single physical transmission line.
///
/// Clones share one permit, so however many engines hold a clone, at most
/// one of them can be inside materialize+send at a time. Engines use
/// [`TransmissionChannel::global`] unless given another channel.
#[derive(Clone, Debug)]
pub struct TransmissionChannel {
    permit: Arc<Semaphore>,
}

/// Held while using the channel; released on drop, including on panic unwind.
#[derive(Debug)]
pub struct ChannelPermit {
    _permit: OwnedSemaphorePermit,
}

impl TransmissionChannel {
    pub fn new() -> Self {
        Self {
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// The line shared by every engine in this process.
    pub fn global() -> Self {
        static LINE: OnceLock<TransmissionChannel> = OnceLock::new();
        LINE.get_or_init(TransmissionChannel::new).clone()
    }

    pub async fn acquire(&self) -> Result<ChannelPermit, GatewayError> {
        let permit = self
            .permit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GatewayError::Fault("transmission channel closed".to_string()))?;
        Ok(ChannelPermit { _permit: permit })
    }

    pub fn is_busy(&self) -> bool {
        self.permit.available_permits() == 0
    }
}

impl Default for TransmissionChannel {
    fn default() -> Self {
        Self::new()
    }
}
