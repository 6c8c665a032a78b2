// Process-wide store registry.
//
// The first call creates the shared in-memory store; later calls return the
// same handle. Consumers receive the handle explicitly instead of reaching
// for a global.

use std::sync::OnceLock;

use tracing::debug;

use crate::store::MemoryStore;

static SHARED_STORE: OnceLock<MemoryStore> = OnceLock::new();

pub fn init_shared_store() -> MemoryStore {
    SHARED_STORE
        .get_or_init(|| {
            debug!("initializing shared store");
            MemoryStore::new()
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RealtimeStore, StorePath};
    use serde_json::json;

    #[tokio::test]
    async fn repeated_init_returns_same_store() {
        let path = StorePath::parse("/runtime-test/value").unwrap();
        init_shared_store().connect().set(&path, json!(7)).await.unwrap();
        assert_eq!(init_shared_store().read(&path).await, Some(json!(7)));
    }
}
