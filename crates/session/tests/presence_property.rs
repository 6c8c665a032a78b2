use std::collections::BTreeMap;

use livecode_common::types::{Permission, UserEntry};
use livecode_session::identity::MemoryIdentityProvider;
use livecode_session::resolver::MemoryLocation;
use livecode_session::store::{MemoryConnection, MemoryStore, StorePath};
use livecode_session::WorkspaceSession;
use proptest::prelude::*;

const DEVICES: usize = 3;
const WORKSPACE_PATH: &str = "/Room";

#[derive(Debug, Clone)]
enum Op {
    /// A device opens a new tab on the workspace.
    Join(usize),
    /// The n-th live tab (modulo live count) drops.
    Drop(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..DEVICES).prop_map(Op::Join),
        2 => any::<usize>().prop_map(Op::Drop),
    ]
}

struct LiveTab {
    device: usize,
    connection: MemoryConnection,
}

async fn users(store: &MemoryStore) -> BTreeMap<String, UserEntry> {
    let path = StorePath::parse("/-Room/users").unwrap();
    let Some(raw) = store.read(&path).await else {
        return BTreeMap::new();
    };
    raw.as_object()
        .unwrap()
        .iter()
        .map(|(id, value)| (id.clone(), UserEntry::from_json(value).unwrap()))
        .collect()
}

async fn run_ops(ops: Vec<Op>) {
    let store = MemoryStore::new();
    let devices = (0..DEVICES)
        .map(|idx| MemoryIdentityProvider::with_uid(format!("device-{idx}")))
        .collect::<Vec<_>>();
    let mut live: Vec<LiveTab> = Vec::new();
    let mut joined_devices: Vec<usize> = Vec::new();

    for op in ops {
        let before = users(&store).await;
        let touched = match op {
            Op::Join(device) => {
                let connection = store.connect();
                let session = WorkspaceSession::new(
                    connection.clone(),
                    devices[device].clone(),
                    MemoryLocation::new(WORKSPACE_PATH),
                );
                session.join().await.unwrap();
                live.push(LiveTab { device, connection });
                if !joined_devices.contains(&device) {
                    joined_devices.push(device);
                }
                device
            }
            Op::Drop(n) => {
                if live.is_empty() {
                    continue;
                }
                let tab = live.remove(n % live.len());
                assert_eq!(tab.connection.disconnect().await, 1);
                tab.device
            }
        };

        let after = users(&store).await;

        // One record per device that ever joined.
        assert_eq!(after.len(), joined_devices.len());

        for device in 0..DEVICES {
            let uid = format!("device-{device}");
            let tabs = live.iter().filter(|tab| tab.device == device).count();
            match after.get(&uid) {
                Some(entry) => {
                    assert_eq!(entry.connection_count(), tabs, "markers of {uid}");
                    assert_eq!(entry.is_online(), tabs > 0);
                    assert!(entry.name.is_some());
                }
                None => assert_eq!(tabs, 0),
            }

            // Only the touched user's markers change.
            if device != touched {
                let before_count = before.get(&uid).map_or(0, UserEntry::connection_count);
                let after_count = after.get(&uid).map_or(0, UserEntry::connection_count);
                assert_eq!(before_count, after_count, "untouched {uid} changed");
            }
        }

        let owners = after.values().filter(|e| e.permission == Some(Permission::Owner)).count();
        assert_eq!(owners, 1);
        let first = format!("device-{}", joined_devices[0]);
        assert_eq!(after[&first].permission, Some(Permission::Owner));
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        max_shrink_iters: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn presence_tracks_live_tabs(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_ops(ops));
    }
}
