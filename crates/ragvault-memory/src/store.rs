use async_trait::async_trait;
use ragvault_core::{Chunk, RagConfig, RagError, RagResult};
use std::collections::HashSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

/// Trait for chunk storage backends.
///
/// Every operation initializes the backend first if nobody has yet, so
/// callers racing to touch a fresh store never see a "not initialized"
/// error. Each call is atomic on its own; a scan running concurrently with
/// an `add` may or may not include the new chunk.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Open or create the underlying storage. Idempotent.
    async fn initialize(&self) -> RagResult<()>;

    /// Insert a new chunk. Fails with [`RagError::DuplicateKey`] if the id
    /// is already stored; the store is unchanged in that case.
    async fn add(&self, chunk: Chunk) -> RagResult<()>;

    /// Number of stored chunks.
    async fn count(&self) -> RagResult<usize>;

    /// Remove every chunk. Clearing an empty store is a no-op.
    async fn clear(&self) -> RagResult<()>;

    /// Every stored chunk, in no guaranteed order.
    async fn scan_all(&self) -> RagResult<Vec<Arc<Chunk>>>;
}

/// Builds the backend selected by `config.store_path`.
pub fn open_store(config: &RagConfig) -> Arc<dyn ChunkStore> {
    match &config.store_path {
        Some(path) => Arc::new(FileChunkStore::new(path.clone())),
        None => Arc::new(InMemoryChunkStore::new()),
    }
}

/// Chunks plus the primary-key set used for duplicate detection.
#[derive(Debug, Default)]
struct ChunkTable {
    chunks: Vec<Arc<Chunk>>,
    ids: HashSet<String>,
}

impl ChunkTable {
    fn check_insert(&self, chunk: &Chunk) -> RagResult<()> {
        chunk.validate()?;
        if self.ids.contains(&chunk.id) {
            return Err(RagError::DuplicateKey(chunk.id.clone()));
        }
        Ok(())
    }

    fn push(&mut self, chunk: Chunk) {
        self.ids.insert(chunk.id.clone());
        self.chunks.push(Arc::new(chunk));
    }

    fn clear(&mut self) {
        self.chunks.clear();
        self.ids.clear();
    }
}

/// In-memory chunk store. Contents live for the lifetime of the value.
pub struct InMemoryChunkStore {
    table: RwLock<ChunkTable>,
}

impl InMemoryChunkStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            table: RwLock::new(ChunkTable::default()),
        }
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn initialize(&self) -> RagResult<()> {
        Ok(())
    }

    async fn add(&self, chunk: Chunk) -> RagResult<()> {
        let mut table = self.table.write().await;
        table.check_insert(&chunk)?;
        debug!(chunk_id = %chunk.id, "Added chunk to store");
        table.push(chunk);
        Ok(())
    }

    async fn count(&self) -> RagResult<usize> {
        Ok(self.table.read().await.chunks.len())
    }

    async fn clear(&self) -> RagResult<()> {
        let mut table = self.table.write().await;
        let removed = table.chunks.len();
        table.clear();
        info!(removed, "Chunk store cleared");
        Ok(())
    }

    async fn scan_all(&self) -> RagResult<Vec<Arc<Chunk>>> {
        Ok(self.table.read().await.chunks.clone())
    }
}

/// Open JSONL file plus the chunks it holds.
struct FileState {
    file: File,
    /// Bytes of complete records; anything past this is a failed append.
    committed_len: u64,
    table: ChunkTable,
}

impl FileState {
    /// Appends one record, leaving the file at its previous length on failure.
    async fn append(&mut self, path: &Path, line: &[u8]) -> RagResult<()> {
        let actual_len = self
            .file
            .metadata()
            .await
            .map_err(|e| unavailable(path, "stat", e))?
            .len();
        if actual_len != self.committed_len {
            warn!(
                path = %path.display(),
                bytes = actual_len.saturating_sub(self.committed_len),
                "Discarding partial record left by an earlier write"
            );
            self.file
                .set_len(self.committed_len)
                .await
                .map_err(|e| unavailable(path, "truncate", e))?;
        }

        let written: std::io::Result<()> = async {
            self.file.write_all(line).await?;
            self.file.flush().await
        }
        .await;

        if let Err(e) = written {
            if let Err(rollback) = self.file.set_len(self.committed_len).await {
                warn!(
                    path = %path.display(),
                    error = %rollback,
                    "Failed to roll back partial record"
                );
            }
            return Err(unavailable(path, "write", e));
        }

        self.committed_len += line.len() as u64;
        Ok(())
    }
}

/// File-backed chunk store that persists chunks as JSONL on disk.
///
/// The file is opened lazily on first use and loaded into memory. Inserts
/// append one line; `clear` truncates the file.
pub struct FileChunkStore {
    path: PathBuf,
    state: OnceCell<RwLock<FileState>>,
}

impl FileChunkStore {
    /// Create a store backed by `path`. No I/O happens until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: OnceCell::new(),
        }
    }

    /// Path of the backing JSONL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn state(&self) -> RagResult<&RwLock<FileState>> {
        self.state
            .get_or_try_init(|| async { open_file(&self.path).await.map(RwLock::new) })
            .await
    }
}

fn unavailable(path: &Path, action: &str, e: impl Display) -> RagError {
    RagError::StorageUnavailable(format!("Failed to {action} {}: {e}", path.display()))
}

async fn open_file(path: &Path) -> RagResult<FileState> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| unavailable(parent, "create directory", e))?;
    }

    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| unavailable(path, "open", e))?;

    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| unavailable(path, "read", e))?;

    // An unterminated last line is the remains of an interrupted append.
    let complete_len = data.rfind('\n').map_or(0, |pos| pos + 1);
    if complete_len < data.len() {
        warn!(
            path = %path.display(),
            bytes = data.len() - complete_len,
            "Discarding incomplete trailing record"
        );
        file.set_len(complete_len as u64)
            .await
            .map_err(|e| unavailable(path, "truncate", e))?;
    }

    let mut table = ChunkTable::default();
    for (line_no, line) in data[..complete_len].lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(line).map_err(|e| {
            unavailable(path, "parse", format!("invalid record on line {}: {e}", line_no + 1))
        })?;
        if table.ids.contains(&chunk.id) {
            warn!(chunk_id = %chunk.id, line = line_no + 1, "Skipping duplicate record");
            continue;
        }
        table.push(chunk);
    }

    info!(path = %path.display(), chunks = table.chunks.len(), "Chunk store opened");
    Ok(FileState {
        file,
        committed_len: complete_len as u64,
        table,
    })
}

#[async_trait]
impl ChunkStore for FileChunkStore {
    async fn initialize(&self) -> RagResult<()> {
        self.state().await.map(|_| ())
    }

    async fn add(&self, chunk: Chunk) -> RagResult<()> {
        let mut state = self.state().await?.write().await;
        state.table.check_insert(&chunk)?;

        let mut line = serde_json::to_string(&chunk)
            .map_err(|e| unavailable(&self.path, "serialize chunk for", e))?;
        line.push('\n');
        state.append(&self.path, line.as_bytes()).await?;

        debug!(chunk_id = %chunk.id, "Added chunk to store");
        state.table.push(chunk);
        Ok(())
    }

    async fn count(&self) -> RagResult<usize> {
        Ok(self.state().await?.read().await.table.chunks.len())
    }

    async fn clear(&self) -> RagResult<()> {
        let mut state = self.state().await?.write().await;
        state
            .file
            .set_len(0)
            .await
            .map_err(|e| unavailable(&self.path, "truncate", e))?;
        state.committed_len = 0;
        let removed = state.table.chunks.len();
        state.table.clear();
        info!(path = %self.path.display(), removed, "Chunk store cleared");
        Ok(())
    }

    async fn scan_all(&self) -> RagResult<Vec<Arc<Chunk>>> {
        Ok(self.state().await?.read().await.table.chunks.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn make_chunk(id: &str, text: &str, embedding: Vec<f32>) -> Chunk {
        Chunk::new(id, text, embedding)
    }

    #[tokio::test]
    async fn test_add_and_count() {
        let store = InMemoryChunkStore::new();
        assert_eq!(store.count().await.unwrap(), 0);

        store
            .add(make_chunk("a-0", "hello", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = InMemoryChunkStore::new();
        store.add(make_chunk("doc-0", "first", vec![1.0])).await.unwrap();

        let err = store
            .add(make_chunk("doc-0", "second", vec![0.5]))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DuplicateKey(ref id) if id == "doc-0"));
        assert_eq!(store.count().await.unwrap(), 1);

        let all = store.scan_all().await.unwrap();
        assert_eq!(all[0].text, "first");
    }

    #[tokio::test]
    async fn test_invalid_chunk_rejected() {
        let store = InMemoryChunkStore::new();
        let err = store.add(make_chunk("x", "text", vec![])).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_finite_embedding_rejected_by_both_backends() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunks.jsonl");
        let stores: Vec<Box<dyn ChunkStore>> = vec![
            Box::new(InMemoryChunkStore::new()),
            Box::new(FileChunkStore::new(&path)),
        ];

        for store in &stores {
            store.add(make_chunk("ok", "fine", vec![1.0, 0.0])).await.unwrap();
            for bad in [f32::NAN, f32::INFINITY] {
                let err = store
                    .add(make_chunk("bad", "broken", vec![bad, 1.0]))
                    .await
                    .unwrap_err();
                assert!(matches!(err, RagError::InvalidArgument(_)));
            }
            assert_eq!(store.count().await.unwrap(), 1);
        }

        // Nothing unreadable reached the file
        let reopened = FileChunkStore::new(&path);
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_then_reuse_ids() {
        let store = InMemoryChunkStore::new();
        store.add(make_chunk("a", "one", vec![1.0])).await.unwrap();
        store.add(make_chunk("b", "two", vec![1.0])).await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.scan_all().await.unwrap().is_empty());

        // Cleared ids are free again
        store.add(make_chunk("a", "again", vec![1.0])).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_empty_is_noop() {
        let store = InMemoryChunkStore::new();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    // --- FileChunkStore tests ---

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunks.jsonl");

        {
            let store = FileChunkStore::new(&path);
            store
                .add(make_chunk("a-0", "hello", vec![1.0, 0.0]))
                .await
                .unwrap();
            store
                .add(make_chunk("a-1", "world", vec![0.0, 1.0]))
                .await
                .unwrap();
            assert_eq!(store.count().await.unwrap(), 2);
        }

        let reopened = FileChunkStore::new(&path);
        assert_eq!(reopened.count().await.unwrap(), 2);
        let texts: Vec<String> = reopened
            .scan_all()
            .await
            .unwrap()
            .iter()
            .map(|c| c.text.clone())
            .collect();
        assert!(texts.contains(&"hello".to_string()));
        assert!(texts.contains(&"world".to_string()));
    }

    #[tokio::test]
    async fn test_file_store_lazy_init_creates_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("dir").join("chunks.jsonl");

        let store = FileChunkStore::new(&path);
        assert!(!path.exists());

        // clear() on an uninitialized store initializes it
        store.clear().await.unwrap();
        assert!(path.exists());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_initialize_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileChunkStore::new(tmp.path().join("chunks.jsonl"));
        store.initialize().await.unwrap();
        store.add(make_chunk("a", "x", vec![1.0])).await.unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_store_clear_truncates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunks.jsonl");

        let store = FileChunkStore::new(&path);
        store.add(make_chunk("a", "x", vec![1.0])).await.unwrap();
        store.clear().await.unwrap();
        store.add(make_chunk("b", "y", vec![1.0])).await.unwrap();

        let reopened = FileChunkStore::new(&path);
        let all = reopened.scan_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "b");
    }

    #[tokio::test]
    async fn test_file_store_discards_partial_record_before_append() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunks.jsonl");

        let store = FileChunkStore::new(&path);
        store.add(make_chunk("x", "first", vec![1.0])).await.unwrap();

        // A write that died halfway through a record
        let mut raw = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap();
        raw.write_all(br#"{"id":"lost","te"#).await.unwrap();
        raw.flush().await.unwrap();
        drop(raw);

        store.add(make_chunk("y", "second", vec![0.5])).await.unwrap();

        let data = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(!data.contains("lost"));
        assert_eq!(data.lines().count(), 2);

        let reopened = FileChunkStore::new(&path);
        let ids: Vec<String> = reopened
            .scan_all()
            .await
            .unwrap()
            .iter()
            .map(|c| c.id.clone())
            .collect();
        assert_eq!(ids, vec!["x".to_string(), "y".to_string()]);
    }

    #[tokio::test]
    async fn test_file_store_duplicate_not_written() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunks.jsonl");

        let store = FileChunkStore::new(&path);
        store.add(make_chunk("doc-0", "x", vec![1.0])).await.unwrap();
        assert!(store.add(make_chunk("doc-0", "y", vec![1.0])).await.is_err());

        let data = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(data.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_file_store_unopenable_path() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory cannot be opened as the store file
        let store = FileChunkStore::new(tmp.path());
        let err = store.count().await.unwrap_err();
        assert!(matches!(err, RagError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_file_store_corrupt_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunks.jsonl");
        tokio::fs::write(&path, "not json\n").await.unwrap();

        let store = FileChunkStore::new(&path);
        let err = store.initialize().await.unwrap_err();
        assert!(matches!(err, RagError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_file_store_discards_torn_tail() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunks.jsonl");
        let good = serde_json::to_string(&make_chunk("a", "x", vec![1.0])).unwrap();
        tokio::fs::write(&path, format!("{good}\n{{\"id\":\"b\",\"te"))
            .await
            .unwrap();

        let store = FileChunkStore::new(&path);
        assert_eq!(store.count().await.unwrap(), 1);
        store.add(make_chunk("c", "z", vec![1.0])).await.unwrap();

        let reopened = FileChunkStore::new(&path);
        assert_eq!(reopened.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_open_store_selects_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("chunks.jsonl");

        let config = RagConfig {
            store_path: Some(path.clone()),
            ..RagConfig::default()
        };
        let store = open_store(&config);
        store.add(make_chunk("a", "x", vec![1.0])).await.unwrap();
        assert!(path.exists());

        let memory = open_store(&RagConfig::default());
        assert_eq!(memory.count().await.unwrap(), 0);
    }
}
