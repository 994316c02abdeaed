use std::path::Path;
use std::time::Duration;

use crate::error::CleanupWarning;

/// Removes a transient file, retrying while something still holds it.
/// A file that is already gone counts as removed.
pub async fn remove_with_retry(
    path: &Path,
    attempts: u32,
    delay: Duration,
) -> Result<(), CleanupWarning> {
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                log::debug!("Removed {}", path.display());
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                log::debug!(
                    "Removing {} failed (attempt {}/{}): {}",
                    path.display(),
                    attempt,
                    attempts,
                    e
                );
                last_error = e.to_string();
            }
        }

        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(CleanupWarning {
        path: path.to_path_buf(),
        attempts,
        error: last_error,
    })
}

/// Removes every path, logging the ones that could not be removed.
pub async fn cleanup_all(paths: &[impl AsRef<Path>], attempts: u32, delay: Duration) -> usize {
    let mut failed = 0;
    for path in paths {
        if let Err(warning) = remove_with_retry(path.as_ref(), attempts, delay).await {
            log::warn!("Cleanup: {}", warning);
            failed += 1;
        }
    }
    failed
}
