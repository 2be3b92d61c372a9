use crate::{AddressUpserted, scanner::ScanNotifier};
use chaingraph_types::AddressRecord;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Feeds the addresses upserted by the indexer that pass `accept` into a scanner.
///
/// Updates lost to a lagging receiver may sort below the scanner's watermark, so a lag makes
/// the scanner replay the whole address table.
pub(crate) async fn forward_addresses(
    scanner: &'static str,
    mut updates: broadcast::Receiver<AddressUpserted>,
    notifier: ScanNotifier<AddressRecord>,
    accept: fn(&AddressRecord) -> bool,
    cancel: CancellationToken,
) {
    loop {
        let update = tokio::select! {
            _ = cancel.cancelled() => return,
            update = updates.recv() => update,
        };
        let delivered = match update {
            Ok(AddressUpserted { address }) if accept(&address) => {
                notifier.notify_update(address.id.to_string(), address)
            }
            Ok(_) => true,
            Err(RecvError::Lagged(skipped)) => {
                warn!(target: "enrich", scanner, skipped, "Missed address updates, replaying");
                notifier.request_replay()
            }
            Err(RecvError::Closed) => return,
        };
        if !delivered {
            debug!(target: "enrich", scanner, "Scanner is gone, stopping forwarder");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventBus, scanner::Scanner};
    use alloy_primitives::{Address, U256};
    use chaingraph_storage::{AddressStorage, GraphDb, models::Addresses};
    use chaingraph_types::{AddressKind, NodeId};
    use std::{sync::Arc, time::Duration};
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn record(byte: u8) -> AddressRecord {
        let id = NodeId::address(Address::repeat_byte(byte));
        AddressRecord::new(id, AddressKind::Contract, U256::ZERO, 1_000)
    }

    #[tokio::test]
    async fn test_lagged_updates_replay_the_table() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = Arc::new(GraphDb::open(&tmp_dir.path().join("graph")).expect("open db"));
        let cancel = CancellationToken::new();
        let mut scanner =
            Scanner::<Addresses>::new("lag", Arc::clone(&db), cancel.clone()).unwrap();
        assert!(timeout(Duration::from_millis(10), scanner.next()).await.is_err());

        // Overflow a single slot channel before the forwarder reads anything.
        let events = EventBus::new(1);
        let updates = events.subscribe_addresses();
        for byte in 1..=3 {
            db.upsert_address(&record(byte)).unwrap();
            events.publish_address(AddressUpserted { address: record(byte) });
        }
        tokio::spawn(forward_addresses("lag", updates, scanner.notifier(), |_| true, cancel));

        let mut seen = Vec::new();
        while let Ok(next) = timeout(Duration::from_millis(200), scanner.next()).await {
            seen.push(next.unwrap().unwrap().1.id);
        }
        for byte in 1..=3 {
            assert!(seen.contains(&record(byte).id), "address {byte} never scanned");
        }
    }
}
