use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::config::ImportConfig;
use crate::errors::{ClarityError, ClarityResult};
use crate::limits::{GIB, MIB};
use crate::models::{ChunkStats, KnownModel, ModelRecord, VerificationStatus};
use crate::quota::{FixedQuota, QuotaProbe, UnavailableQuota};
use crate::registry::VerificationRegistry;
use crate::store::{ChunkStore, MemoryStore, ModelStore};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Memory store with call counters and injectable faults.
#[derive(Default)]
struct FaultyStore {
    inner: MemoryStore,
    puts: AtomicUsize,
    clears: AtomicUsize,
    fail_put_at: Option<u64>,
    skip_put_at: Option<u64>,
    fail_get: AtomicBool,
    fail_all: AtomicBool,
}

impl FaultyStore {
    fn new() -> Self {
        Self::default()
    }

    fn mutations(&self) -> usize {
        self.puts.load(Ordering::SeqCst) + self.clears.load(Ordering::SeqCst)
    }

    fn injected() -> ClarityError {
        ClarityError::Storage("injected failure".into())
    }
}

impl ChunkStore for FaultyStore {
    fn clear(&self) -> ClarityResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.clear()
    }

    fn put(&self, offset: u64, bytes: &[u8]) -> ClarityResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) || self.fail_put_at == Some(offset) {
            return Err(Self::injected());
        }
        if self.skip_put_at == Some(offset) {
            return Ok(());
        }
        self.inner.put(offset, bytes)
    }

    fn get_all(&self) -> ClarityResult<Vec<Vec<u8>>> {
        self.inner.get_all()
    }

    fn offsets(&self) -> ClarityResult<Vec<u64>> {
        self.inner.offsets()
    }

    fn get(&self, offset: u64) -> ClarityResult<Option<Vec<u8>>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.get(offset)
    }

    fn stats(&self) -> ClarityResult<ChunkStats> {
        self.inner.stats()
    }
}

impl ModelStore for FaultyStore {
    fn load_model(&self) -> ClarityResult<Option<ModelRecord>> {
        self.inner.load_model()
    }

    fn save_model(&self, record: &ModelRecord) -> ClarityResult<()> {
        self.inner.save_model(record)
    }

    fn delete_model(&self) -> ClarityResult<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.delete_model()
    }
}

/// Declares a size but has no content; any read is a test failure.
struct SizedSource {
    name: String,
    len: u64,
}

impl SizedSource {
    fn new(name: &str, len: u64) -> Self {
        Self {
            name: name.to_string(),
            len,
        }
    }
}

impl ByteSource for SizedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(&mut self, _start: u64, _end: u64) -> io::Result<Vec<u8>> {
        Err(io::Error::other("SizedSource has no content"))
    }
}

fn small_config() -> ImportConfig {
    ImportConfig {
        chunk_size: 16,
        min_file_size: 1,
        max_file_size: 4096,
        ..Default::default()
    }
}

fn importer_with(
    store: Arc<FaultyStore>,
    probe: impl QuotaProbe + 'static,
    registry: VerificationRegistry,
    config: ImportConfig,
) -> ModelImporter {
    ModelImporter::new(
        store.clone(),
        store,
        Arc::new(probe),
        Arc::new(registry),
        config,
    )
    .unwrap()
}

fn small_importer(store: Arc<FaultyStore>) -> ModelImporter {
    importer_with(
        store,
        FixedQuota::free(50 * GIB),
        VerificationRegistry::new(),
        small_config(),
    )
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

fn run_collect<S: ByteSource>(
    importer: &ModelImporter,
    source: S,
    options: ImportOptions,
) -> (Vec<ImportProgress>, ImportOutcome) {
    let mut progress = Vec::new();
    let outcome = importer
        .run(source, options, |event| {
            if let ImportEvent::Progress(p) = event {
                progress.push(*p);
            }
        })
        .unwrap();
    (progress, outcome)
}

fn assert_monotonic(progress: &[ImportProgress]) {
    for pair in progress.windows(2) {
        assert!(
            pair[1].percent >= pair[0].percent,
            "progress went backwards: {:?} -> {:?}",
            pair[0],
            pair[1]
        );
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[test]
fn test_import_completes_with_digest_and_chunks() {
    let store = Arc::new(FaultyStore::new());
    let importer = small_importer(store.clone());
    let data = patterned(100);

    let (progress, outcome) = run_collect(
        &importer,
        MemorySource::new("model.gguf", data.clone()),
        ImportOptions::default(),
    );

    let record = match outcome {
        ImportOutcome::Completed(record) => record,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(record.digest, sha256_hex(&data));
    assert_eq!(record.verification_status, VerificationStatus::Unverified);
    assert_eq!(record.file_name, "model.gguf");
    assert_eq!(record.file_size, 100);
    assert_eq!(importer.status().unwrap(), Some(record));

    assert_eq!(store.get_all().unwrap().concat(), data);
    assert_eq!(store.offsets().unwrap(), vec![0, 16, 32, 48, 64, 80, 96]);
    assert_eq!(store.get(96).unwrap().unwrap().len(), 4);

    assert_monotonic(&progress);
    assert_eq!(progress.last().unwrap().percent, 100.0);
    assert_eq!(progress.last().unwrap().phase, ImportPhase::Classifying);

    let writes: Vec<f64> = progress
        .iter()
        .filter(|p| p.phase == ImportPhase::Writing && p.bytes_written > 0)
        .map(|p| p.percent)
        .collect();
    assert_eq!(writes.len(), 7);
    assert_eq!(*writes.last().unwrap(), 80.0);

    let hashed_to = progress
        .iter()
        .filter(|p| p.phase == ImportPhase::Hashing)
        .map(|p| p.percent)
        .fold(0.0, f64::max);
    assert_eq!(hashed_to, 90.0);
}

#[test]
fn test_finished_is_last_event() {
    let store = Arc::new(FaultyStore::new());
    let importer = small_importer(store);
    let mut session = importer
        .begin(MemorySource::new("m.gguf", patterned(40)), ImportOptions::default())
        .unwrap();

    let events: Vec<ImportEvent> = session.by_ref().collect();
    assert!(matches!(events.last(), Some(ImportEvent::Finished(ImportOutcome::Completed(_)))));
    let finished = events
        .iter()
        .filter(|e| matches!(e, ImportEvent::Finished(_)))
        .count();
    assert_eq!(finished, 1);
    assert!(session.is_finished());
    assert!(session.next().is_none());
}

#[test]
fn test_hundred_mib_of_zeros_with_default_config() {
    let store = Arc::new(FaultyStore::new());
    let importer = importer_with(
        store.clone(),
        FixedQuota::free(50 * GIB),
        VerificationRegistry::new(),
        ImportConfig::default(),
    );
    let data = vec![0u8; (100 * MIB) as usize];
    let expected = sha256_hex(&data);

    let (progress, outcome) = run_collect(
        &importer,
        MemorySource::new("zeros.gguf", data),
        ImportOptions::default(),
    );

    let record = outcome.record().cloned().unwrap();
    assert!(matches!(outcome, ImportOutcome::Completed(_)));
    assert_eq!(record.digest, expected);
    assert_eq!(record.verification_status, VerificationStatus::Unverified);
    assert_eq!(store.stats().unwrap().chunk_count, 7);
    assert_eq!(store.stats().unwrap().total_bytes, 100 * MIB);
    assert_monotonic(&progress);
    assert_eq!(progress.last().unwrap().percent, 100.0);
}

#[test]
fn test_digest_is_independent_of_file_name() {
    let store = Arc::new(FaultyStore::new());
    let importer = small_importer(store);
    let data = patterned(70);

    let (_, first) = run_collect(
        &importer,
        MemorySource::new("first.gguf", data.clone()),
        ImportOptions::default(),
    );
    let (_, second) = run_collect(
        &importer,
        MemorySource::new("second.gguf", data),
        ImportOptions::default(),
    );
    assert_eq!(first.record().unwrap().digest, second.record().unwrap().digest);
    assert_eq!(importer.status().unwrap().unwrap().file_name, "second.gguf");
}

#[test]
fn test_known_digest_is_verified() {
    let data = b"known test vector bytes".to_vec();
    let registry = VerificationRegistry::from_entries([(
        sha256_hex(&data),
        KnownModel {
            name: "test-model.gguf".into(),
            size: "~23B".into(),
            source: "unit test".into(),
        },
    )])
    .unwrap();
    let store = Arc::new(FaultyStore::new());
    let importer = importer_with(store, FixedQuota::free(50 * GIB), registry, small_config());

    let (_, outcome) = run_collect(
        &importer,
        MemorySource::new("upload.gguf", data),
        ImportOptions::default(),
    );
    let record = outcome.record().unwrap();
    assert_eq!(record.verification_status, VerificationStatus::Verified);
    assert_eq!(record.known_name.as_deref(), Some("test-model.gguf"));
    assert_eq!(record.known_source.as_deref(), Some("unit test"));
}

// ---------------------------------------------------------------------------
// Admission failures
// ---------------------------------------------------------------------------

#[test]
fn test_wrong_extension_touches_nothing() {
    let store = Arc::new(FaultyStore::new());
    let importer = importer_with(
        store.clone(),
        FixedQuota::free(50 * GIB),
        VerificationRegistry::new(),
        ImportConfig::default(),
    );

    let (progress, outcome) = run_collect(
        &importer,
        SizedSource::new("model.txt", GIB),
        ImportOptions::default(),
    );
    assert!(matches!(
        outcome,
        ImportOutcome::Failed(ImportFailure::InvalidInput(InvalidInput::WrongExtension { .. }))
    ));
    assert!(progress.is_empty());
    assert_eq!(store.mutations(), 0);
}

#[test]
fn test_oversized_file_rejected_before_reading() {
    let store = Arc::new(FaultyStore::new());
    let importer = importer_with(
        store.clone(),
        FixedQuota::free(50 * GIB),
        VerificationRegistry::new(),
        ImportConfig::default(),
    );

    let (_, outcome) = run_collect(
        &importer,
        SizedSource::new("huge.gguf", 15 * GIB + 1),
        ImportOptions::default(),
    );
    assert!(matches!(
        outcome,
        ImportOutcome::Failed(ImportFailure::InvalidInput(InvalidInput::TooLarge { .. }))
    ));
    assert_eq!(store.mutations(), 0);
}

#[test]
fn test_insufficient_quota_reports_available_space() {
    let store = Arc::new(FaultyStore::new());
    let quota = 500 * GIB;
    let importer = importer_with(
        store.clone(),
        FixedQuota::new(quota - GIB, quota),
        VerificationRegistry::new(),
        ImportConfig::default(),
    );

    let (progress, outcome) = run_collect(
        &importer,
        SizedSource::new("model.gguf", GIB),
        ImportOptions::default(),
    );
    let failure = outcome.failure().cloned().unwrap();
    assert!(matches!(failure, ImportFailure::InsufficientQuota { .. }));
    assert_eq!(failure.available_gib(), Some(1));
    assert!(failure.to_string().contains("1 GB available"));
    assert_eq!(store.mutations(), 0);
    assert!(progress.iter().all(|p| p.percent == 0.0));
}

#[test]
fn test_unavailable_quota_fails_closed() {
    let store = Arc::new(FaultyStore::new());
    let importer = importer_with(
        store.clone(),
        UnavailableQuota,
        VerificationRegistry::new(),
        small_config(),
    );
    let (_, outcome) = run_collect(
        &importer,
        MemorySource::new("m.gguf", patterned(32)),
        ImportOptions::default(),
    );
    assert_eq!(outcome.failure().and_then(|f| f.available_gib()), Some(0));
    assert_eq!(store.mutations(), 0);
}

// ---------------------------------------------------------------------------
// Mid-session failures
// ---------------------------------------------------------------------------

#[test]
fn test_storage_failure_on_second_chunk() {
    let store = Arc::new(FaultyStore {
        fail_put_at: Some(16 * MIB),
        ..Default::default()
    });
    let config = ImportConfig {
        min_file_size: MIB,
        ..Default::default()
    };
    let importer = importer_with(
        store.clone(),
        FixedQuota::free(50 * GIB),
        VerificationRegistry::new(),
        config,
    );

    let (progress, outcome) = run_collect(
        &importer,
        MemorySource::new("two-chunks.gguf", patterned((32 * MIB) as usize)),
        ImportOptions::default(),
    );

    assert!(matches!(outcome, ImportOutcome::Failed(ImportFailure::Storage(_))));
    assert_eq!(progress.last().unwrap().percent, 40.0);
    assert_eq!(progress.last().unwrap().bytes_written, 16 * MIB);
    assert!(importer.status().unwrap().is_none());
    assert_eq!(store.offsets().unwrap(), vec![0]);

    importer.reset();
    assert!(store.offsets().unwrap().is_empty());
}

#[test]
fn test_hash_failure_keeps_previous_record() {
    let store = Arc::new(FaultyStore::new());
    let importer = small_importer(store.clone());

    let (_, first) = run_collect(
        &importer,
        MemorySource::new("good.gguf", patterned(48)),
        ImportOptions::default(),
    );
    let previous = first.record().cloned().unwrap();

    store.fail_get.store(true, Ordering::SeqCst);
    let (_, second) = run_collect(
        &importer,
        MemorySource::new("other.gguf", patterned(64)),
        ImportOptions::default(),
    );
    assert!(matches!(second, ImportOutcome::Failed(ImportFailure::Hash(_))));
    assert_eq!(importer.status().unwrap(), Some(previous));
}

#[test]
fn test_clear_failure_keeps_previous_record() {
    let store = Arc::new(FaultyStore::new());
    let importer = small_importer(store.clone());

    let (_, first) = run_collect(
        &importer,
        MemorySource::new("good.gguf", patterned(48)),
        ImportOptions::default(),
    );
    let previous = first.record().cloned().unwrap();
    let puts_before = store.puts.load(Ordering::SeqCst);

    store.fail_all.store(true, Ordering::SeqCst);
    let (progress, second) = run_collect(
        &importer,
        MemorySource::new("other.gguf", patterned(64)),
        ImportOptions::default(),
    );
    match second {
        ImportOutcome::Failed(ImportFailure::Storage(msg)) => assert!(msg.contains("clearing")),
        other => panic!("expected storage failure, got {other:?}"),
    }
    assert!(progress.iter().all(|p| p.bytes_written == 0));
    assert_eq!(store.puts.load(Ordering::SeqCst), puts_before);
    assert_eq!(importer.status().unwrap(), Some(previous));
    assert_eq!(store.offsets().unwrap(), vec![0, 16, 32]);
}

#[test]
fn test_missing_chunk_is_a_hash_failure() {
    let store = Arc::new(FaultyStore {
        skip_put_at: Some(16),
        ..Default::default()
    });
    let importer = small_importer(store);
    let (_, outcome) = run_collect(
        &importer,
        MemorySource::new("m.gguf", patterned(48)),
        ImportOptions::default(),
    );
    match outcome {
        ImportOutcome::Failed(ImportFailure::Hash(msg)) => assert!(msg.contains("offset 32")),
        other => panic!("expected hash failure, got {other:?}"),
    }
}

#[test]
fn test_failed_source_read_is_storage_failure() {
    let store = Arc::new(FaultyStore::new());
    let importer = small_importer(store);
    let (_, outcome) = run_collect(
        &importer,
        SizedSource::new("m.gguf", 64),
        ImportOptions::default(),
    );
    assert!(matches!(outcome, ImportOutcome::Failed(ImportFailure::Storage(_))));
}

// ---------------------------------------------------------------------------
// Session control
// ---------------------------------------------------------------------------

#[test]
fn test_reimport_of_same_file_is_a_no_op() {
    let store = Arc::new(FaultyStore::new());
    let importer = small_importer(store.clone());
    let data = patterned(64);

    run_collect(
        &importer,
        MemorySource::new("m.gguf", data.clone()),
        ImportOptions::default(),
    );
    let writes_before = store.mutations();

    let (_, again) = run_collect(
        &importer,
        MemorySource::new("m.gguf", data.clone()),
        ImportOptions::default(),
    );
    assert!(matches!(again, ImportOutcome::AlreadyImported(_)));
    assert_eq!(store.mutations(), writes_before);

    let (_, forced) = run_collect(&importer, MemorySource::new("m.gguf", data), ImportOptions::forced());
    assert!(matches!(forced, ImportOutcome::Completed(_)));
    assert!(store.mutations() > writes_before);
}

#[test]
fn test_second_session_is_rejected_while_first_is_live() {
    let importer = small_importer(Arc::new(FaultyStore::new()));
    let mut first = importer
        .begin(MemorySource::new("a.gguf", patterned(64)), ImportOptions::default())
        .unwrap();
    first.next();
    assert!(importer.is_importing());

    let second = importer.begin(MemorySource::new("b.gguf", patterned(64)), ImportOptions::default());
    assert!(matches!(second, Err(ClarityError::Busy)));

    drop(first);
    assert!(!importer.is_importing());
    assert!(importer
        .begin(MemorySource::new("b.gguf", patterned(64)), ImportOptions::default())
        .is_ok());
}

#[test]
fn test_guard_released_once_session_finishes() {
    let importer = small_importer(Arc::new(FaultyStore::new()));
    let mut session = importer
        .begin(MemorySource::new("a.gguf", patterned(20)), ImportOptions::default())
        .unwrap();
    for _ in session.by_ref() {}
    assert!(!importer.is_importing());
    drop(session);
}

#[test]
fn test_cancellation_between_chunks() {
    let store = Arc::new(FaultyStore::new());
    let importer = small_importer(store.clone());
    let mut session = importer
        .begin(MemorySource::new("m.gguf", patterned(64)), ImportOptions::default())
        .unwrap();
    let token = session.cancel_token();

    let mut last = None;
    for event in session.by_ref() {
        match event {
            ImportEvent::Progress(p) if p.phase == ImportPhase::Writing && p.bytes_written == 16 => {
                token.cancel();
            }
            ImportEvent::Finished(outcome) => last = Some(outcome),
            _ => {}
        }
    }
    assert_eq!(last, Some(ImportOutcome::Failed(ImportFailure::Cancelled)));
    assert_eq!(store.offsets().unwrap(), vec![0]);
    assert!(importer.status().unwrap().is_none());
}

#[test]
fn test_reset_is_idempotent_and_swallows_errors() {
    let store = Arc::new(FaultyStore::new());
    let importer = small_importer(store.clone());
    run_collect(
        &importer,
        MemorySource::new("m.gguf", patterned(32)),
        ImportOptions::default(),
    );
    importer.reset();
    importer.reset();
    assert!(importer.status().unwrap().is_none());
    assert_eq!(importer.chunk_stats().unwrap(), ChunkStats::default());

    let broken = small_importer(Arc::new(FaultyStore {
        fail_all: AtomicBool::new(true),
        ..Default::default()
    }));
    broken.reset();
}

#[test]
fn test_invalid_config_is_rejected() {
    let store = Arc::new(FaultyStore::new());
    let result = ModelImporter::new(
        store.clone(),
        store,
        Arc::new(FixedQuota::free(GIB)),
        Arc::new(VerificationRegistry::new()),
        ImportConfig {
            chunk_size: 0,
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(ClarityError::Config(_))));
}
