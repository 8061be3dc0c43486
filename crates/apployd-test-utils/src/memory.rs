use apployd_memory::{
    InMemoryStoreProvider, MemoryError, MemoryLabel, MemoryMetadata, MemoryRecord, MemoryStore,
    MemoryType, StoreProvider, StoreSnapshot,
};
use parking_lot::Mutex;

/// Provider that accepts a fixed number of saves, then rejects every save with
/// an IO error.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: InMemoryStoreProvider,
    remaining: Mutex<usize>,
}

impl FailingStore {
    pub fn after_saves(saves: usize) -> Self {
        Self {
            inner: InMemoryStoreProvider::new(),
            remaining: Mutex::new(saves),
        }
    }
}

impl StoreProvider for FailingStore {
    fn load(&self) -> Result<Option<StoreSnapshot>, MemoryError> {
        self.inner.load()
    }

    fn save(&self, snapshot: &StoreSnapshot, expected_revision: u64) -> Result<(), MemoryError> {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return Err(MemoryError::Io(std::io::Error::other("disk unavailable")));
        }
        *remaining -= 1;
        self.inner.save(snapshot, expected_revision)
    }

    fn clear(&self) -> Result<(), MemoryError> {
        self.inner.clear()
    }
}

/// Memory record with an optional label and value, not attached to a conversation.
pub fn memory_fixture(
    text: &str,
    memory_type: MemoryType,
    label: Option<MemoryLabel>,
    value: Option<&str>,
) -> MemoryRecord {
    let metadata = MemoryMetadata {
        label,
        value: value.map(str::to_string),
        ..MemoryMetadata::default()
    };
    MemoryRecord::new(text, memory_type, metadata, None)
}

/// In-memory store holding the given `(text, type, label)` memories, added in order.
pub fn seeded_store(
    memories: &[(&str, MemoryType, Option<MemoryLabel>)],
) -> Result<MemoryStore, MemoryError> {
    let mut store = MemoryStore::in_memory()?;
    for (text, memory_type, label) in memories {
        let metadata = MemoryMetadata {
            label: *label,
            ..MemoryMetadata::default()
        };
        store.add_memory(None, *text, *memory_type, metadata)?;
    }
    Ok(store)
}
