// Reference buffer service backed by yrs.
//
// Channel layout under `editor-<lang>`:
//   history/<push id>  {update: base64 yrs update, author: user id}
//   users/<user id>    {cursor: {anchor, head}, color}
//
// Local edits append their update to `history`; `sync` applies every entry
// not seen yet, so replicas converge regardless of arrival order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::buffer::ydoc::YDoc;
use crate::buffer::{BufferBinding, BufferHandle, BufferService};
use crate::error::{BufferError, StoreError};
use crate::lifecycle::ConnectionLifecycleManager;
use crate::store::{RealtimeStore, StorePath};

const TEXT_NAME: &str = "content";
const HISTORY_KEY: &str = "history";
const CARETS_KEY: &str = "users";

#[derive(Debug, Serialize, Deserialize)]
struct HistoryEntry {
    update: String,
    #[serde(default)]
    author: String,
}

/// A collaborator's caret as published in the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCaret {
    #[serde(skip)]
    pub user_id: String,
    pub cursor: CaretRange,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaretRange {
    pub anchor: u32,
    pub head: u32,
}

#[derive(Debug, Clone)]
pub struct YrsBufferService<S> {
    store: S,
}

impl<S: RealtimeStore + Clone> YrsBufferService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: RealtimeStore + Clone> BufferService for YrsBufferService<S> {
    type Handle = YrsBuffer<S>;

    async fn mount(&self, binding: BufferBinding) -> Result<YrsBuffer<S>, BufferError> {
        let buffer = YrsBuffer {
            store: self.store.clone(),
            binding,
            doc: YDoc::new(),
            seen: Mutex::new(HashSet::new()),
            caret_armed: AtomicBool::new(false),
        };
        let applied = buffer.sync().await?;
        if applied == 0 && buffer.binding.editable {
            buffer.insert(0, buffer.binding.default_code).await?;
            debug!(language = %buffer.binding.language, "seeded empty buffer");
        }
        debug!(
            language = %buffer.binding.language,
            editable = buffer.binding.editable,
            applied,
            "buffer mounted"
        );
        Ok(buffer)
    }
}

pub struct YrsBuffer<S> {
    store: S,
    binding: BufferBinding,
    doc: YDoc,
    seen: Mutex<HashSet<String>>,
    caret_armed: AtomicBool,
}

impl<S: RealtimeStore> YrsBuffer<S> {
    fn history_path(&self) -> StorePath {
        self.binding.reference.child(HISTORY_KEY)
    }

    fn caret_path(&self) -> StorePath {
        self.binding.reference.child(CARETS_KEY).child(&self.binding.caret.user_id)
    }

    fn seen(&self) -> MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_editable(&self) -> Result<(), BufferError> {
        if self.binding.editable {
            Ok(())
        } else {
            Err(BufferError::ReadOnly(self.binding.language))
        }
    }

    fn apply_history(&self, entries: &Map<String, Value>) -> Result<usize, BufferError> {
        let path = self.history_path();
        let mut seen = self.seen();
        let mut applied = 0;
        for (key, raw) in entries {
            if seen.contains(key) {
                continue;
            }
            let entry: HistoryEntry =
                serde_json::from_value(raw.clone()).map_err(|err| StoreError::Decode {
                    path: path.child(key).to_string(),
                    message: err.to_string(),
                })?;
            let update =
                BASE64.decode(entry.update).map_err(|err| BufferError::Codec(err.to_string()))?;
            self.doc.apply_update(&update)?;
            seen.insert(key.clone());
            applied += 1;
        }
        Ok(applied)
    }

    async fn publish(&self, update: Vec<u8>) -> Result<(), BufferError> {
        let key = self.store.generate_key();
        self.seen().insert(key.clone());
        let entry = HistoryEntry {
            update: BASE64.encode(update),
            author: self.binding.caret.user_id.clone(),
        };
        let value = serde_json::to_value(entry).map_err(|err| BufferError::Codec(err.to_string()))?;
        self.store.set(&self.history_path().child(&key), value).await?;
        Ok(())
    }

    /// Carets other collaborators have published in this channel.
    pub async fn remote_carets(&self) -> Result<Vec<RemoteCaret>, BufferError> {
        let path = self.binding.reference.child(CARETS_KEY);
        let Some(Value::Object(users)) = self.store.get(&path).await? else {
            return Ok(Vec::new());
        };
        Ok(users
            .into_iter()
            .filter(|(user_id, _)| *user_id != self.binding.caret.user_id)
            .filter_map(|(user_id, raw)| {
                let caret: RemoteCaret = serde_json::from_value(raw).ok()?;
                Some(RemoteCaret { user_id, ..caret })
            })
            .collect())
    }
}

impl<S: RealtimeStore> BufferHandle for YrsBuffer<S> {
    fn binding(&self) -> &BufferBinding {
        &self.binding
    }

    fn text(&self) -> String {
        self.doc.text(TEXT_NAME)
    }

    async fn insert(&self, index: u32, content: &str) -> Result<(), BufferError> {
        self.ensure_editable()?;
        if content.is_empty() {
            return Ok(());
        }
        let update = self.doc.insert(TEXT_NAME, index, content)?;
        self.publish(update).await
    }

    async fn delete(&self, index: u32, len: u32) -> Result<(), BufferError> {
        self.ensure_editable()?;
        if len == 0 {
            return Ok(());
        }
        let update = self.doc.remove(TEXT_NAME, index, len)?;
        self.publish(update).await
    }

    async fn sync(&self) -> Result<usize, BufferError> {
        let path = self.history_path();
        match self.store.get(&path).await? {
            None => Ok(0),
            Some(Value::Object(entries)) => self.apply_history(&entries),
            Some(other) => Err(StoreError::Decode {
                path: path.to_string(),
                message: format!("expected history object, found {other}"),
            }
            .into()),
        }
    }

    async fn set_caret(&self, anchor: u32, head: u32) -> Result<(), BufferError> {
        self.ensure_editable()?;
        let len = self.doc.len(TEXT_NAME);
        if let Some(index) = [anchor, head].into_iter().find(|&index| index > len) {
            return Err(BufferError::OutOfRange { index, len });
        }
        let path = self.caret_path();
        if !self.caret_armed.swap(true, Ordering::SeqCst) {
            ConnectionLifecycleManager::new(&self.store).arm(&path).await;
        }
        let value = json!({
            "cursor": { "anchor": anchor, "head": head },
            "color": self.binding.caret.color,
        });
        self.store.set(&path, value).await?;
        Ok(())
    }
}
