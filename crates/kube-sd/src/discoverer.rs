//! The interface a discovery manager drives.

use crate::error::DiscoveryError;
use crate::target_group::TargetGroup;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A source of target groups.
///
/// A discoverer sends a group whenever its view of a source changes. It does
/// not know whether the change is material to the consumer; every group
/// sent is the complete current state of its source.
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Runs until `cancel` fires, sending groups on `tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the discoverer could not start. Failures while
    /// running are logged and do not end the run.
    async fn run(
        &self,
        cancel: CancellationToken,
        tx: mpsc::Sender<Vec<TargetGroup>>,
    ) -> Result<(), DiscoveryError>;
}

/// Sends `group` on `tx`, giving up if `cancel` fires first.
///
/// Returns true if the group was delivered.
pub async fn send(
    cancel: &CancellationToken,
    tx: &mpsc::Sender<Vec<TargetGroup>>,
    group: TargetGroup,
) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        result = tx.send(vec![group]) => result.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_delivers() {
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(1);
        assert!(send(&cancel, &tx, TargetGroup::new("node/n1")).await);
        assert_eq!(rx.recv().await.unwrap()[0].source, "node/n1");
    }

    #[tokio::test]
    async fn test_blocked_send_aborts_on_cancel() {
        let cancel = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(1);
        assert!(send(&cancel, &tx, TargetGroup::new("node/a")).await);

        // Channel is full; only cancellation can unblock this send
        let blocked = {
            let cancel = cancel.clone();
            let tx = tx.clone();
            tokio::spawn(async move { send(&cancel, &tx, TargetGroup::new("node/b")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let delivered = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("send did not abort")
            .unwrap();
        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_send_to_closed_channel() {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!send(&cancel, &tx, TargetGroup::new("node/n1")).await);
    }
}
