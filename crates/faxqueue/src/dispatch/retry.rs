use std::path::Path;
use std::time::Duration;

use crate::error::GatewayError;
use crate::gateway::TransmissionGateway;

/// Calls the gateway up to `max_attempts` times with a fixed pause between
/// attempts. Every failure kind counts as a failed attempt; the returned
/// `Exhausted` carries the last one.
pub async fn send_with_retry(
    gateway: &dyn TransmissionGateway,
    file: &Path,
    destination: &str,
    max_attempts: u32,
    backoff: Duration,
) -> Result<u32, GatewayError> {
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        log::info!(
            "Sending to {} via {} (attempt {}/{})",
            destination,
            gateway.name(),
            attempt,
            max_attempts
        );

        match gateway.send(file, destination).await {
            Ok(()) => return Ok(attempt),
            Err(e) => {
                log::warn!("Attempt {}/{} failed: {}", attempt, max_attempts, e);
                last_error = Some(e);
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(backoff).await;
        }
    }

    let last = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempt was made".to_string());
    Err(GatewayError::Exhausted {
        attempts: max_attempts,
        last,
    })
}
