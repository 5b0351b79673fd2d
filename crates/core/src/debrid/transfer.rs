//! Waiting for freshly added transfers.

use std::time::Duration;

use tracing::debug;

use super::{DebridError, DebridFile, StorageBackend, Transfer};

/// Poll `transfer` until the backend reports it ready or `attempts` polls
/// have been made, then return its files.
///
/// Files of a transfer that never became ready are still returned (marked
/// not ready); only a transfer without any file is an error.
pub async fn wait_for_files(
    backend: &dyn StorageBackend,
    transfer: Transfer,
    attempts: u32,
    interval: Duration,
) -> Result<Vec<DebridFile>, DebridError> {
    let mut current = transfer;
    let mut polls = 0;
    while !current.status.is_ready() && polls < attempts {
        current = backend.get_transfer(&current.id).await?;
        polls += 1;
        debug!(
            id = %current.id,
            status = current.status.as_str(),
            poll = polls,
            "Polled debrid transfer"
        );
        if !current.status.is_ready() && polls < attempts {
            tokio::time::sleep(interval).await;
        }
    }

    if current.files.is_empty() {
        return Err(DebridError::InvalidResponse(format!(
            "no files for transfer {} after {} polls",
            current.id, polls
        )));
    }
    Ok(current.files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debrid::TransferStatus;
    use crate::testing::MockStorageBackend;

    fn transfer(status: TransferStatus) -> Transfer {
        Transfer {
            id: "t1".to_string(),
            status,
            files: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_ready() {
        let backend = MockStorageBackend::new();
        backend
            .set_transfer_sequence(
                "t1",
                vec![
                    TransferStatus::Queued,
                    TransferStatus::Downloading,
                    TransferStatus::Downloaded,
                ],
                vec![("a.mkv", 10)],
            )
            .await;

        let files = wait_for_files(
            &backend,
            transfer(TransferStatus::Queued),
            10,
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ready);
        assert_eq!(backend.transfer_polls("t1").await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_attempts() {
        let backend = MockStorageBackend::new();
        backend
            .set_transfer_sequence("t1", vec![TransferStatus::Queued], vec![("a.mkv", 10)])
            .await;

        let files = wait_for_files(
            &backend,
            transfer(TransferStatus::Queued),
            4,
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert!(!files[0].ready);
        assert_eq!(backend.transfer_polls("t1").await, 4);
    }

    #[tokio::test]
    async fn test_ready_transfer_is_not_polled() {
        let backend = MockStorageBackend::new();
        let mut ready = transfer(TransferStatus::Cached);
        ready.files.push(DebridFile {
            id: "t1:0".to_string(),
            name: "a.mkv".to_string(),
            size: 1,
            ready: true,
        });
        let files = wait_for_files(&backend, ready, 10, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(backend.transfer_polls("t1").await, 0);
    }

    #[tokio::test]
    async fn test_no_files_is_an_error() {
        let backend = MockStorageBackend::new();
        let result = wait_for_files(
            &backend,
            transfer(TransferStatus::Cached),
            10,
            Duration::from_secs(2),
        )
        .await;
        assert!(matches!(result, Err(DebridError::InvalidResponse(_))));
    }
}
