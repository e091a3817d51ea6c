//! Content-keyed trailer normalization cache.
//!
//! The trailer is re-encoded once per (source content, canvas, encode mode)
//! combination and shared read-only by every job that targets the same
//! parameters. Creation is single-flight: concurrent requests for one key
//! serialize on a per-key lock and re-check after acquiring it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use dramacut_models::{CanvasSpec, EncodeMode};

use crate::error::{EngineError, EngineResult};

/// Target parameters a trailer must be conformed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrailerSpec {
    pub canvas: CanvasSpec,
    pub encode_mode: EncodeMode,
}

/// Delegate that performs the expensive normalization encode.
///
/// The FFmpeg-backed implementation lives in the worker crate; tests inject
/// fakes to exercise the cache protocol without video files.
#[async_trait]
pub trait TrailerNormalizer: Send + Sync {
    async fn normalize(&self, source: &Path, spec: &TrailerSpec, dest: &Path) -> EngineResult<()>;
}

/// Filesystem cache of normalized trailer clips.
#[derive(Clone)]
pub struct TrailerCache {
    cache_dir: PathBuf,
    // Per-key creation locks; the outer mutex only guards the map itself.
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl TrailerCache {
    /// Open the cache, creating its directory.
    ///
    /// Fails when the directory cannot be created (fatal configuration: no
    /// job can attach a trailer without it).
    pub fn open(cache_dir: impl Into<PathBuf>) -> EngineResult<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)
            .map_err(|_| EngineError::CacheDirUnavailable(cache_dir.clone()))?;
        Ok(Self {
            cache_dir,
            locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Return the normalized trailer for `(source, spec)`, producing it on
    /// first use.
    ///
    /// Exactly one caller performs the normalization for a given key; racers
    /// wait on the key lock and pick up the finished entry. `force_refresh`
    /// drops an existing entry before recomputing.
    pub async fn get_or_create(
        &self,
        source: &Path,
        spec: &TrailerSpec,
        normalizer: &dyn TrailerNormalizer,
        force_refresh: bool,
    ) -> EngineResult<PathBuf> {
        if !source.is_file() {
            return Err(EngineError::TrailerNotFound(source.to_path_buf()));
        }

        let key = self.cache_key(source, spec).await?;
        let entry_path = self.entry_path(&key);

        // Fast path: entry already on disk and no rebuild requested.
        if !force_refresh && is_usable(&entry_path).await {
            debug!(entry = %entry_path.display(), "trailer cache hit");
            return Ok(entry_path);
        }

        let key_lock = self.key_lock(&key).await;
        let _guard = key_lock.lock().await;

        // Re-check: another caller may have finished while we waited.
        if !force_refresh && is_usable(&entry_path).await {
            debug!(entry = %entry_path.display(), "trailer cache hit after wait");
            return Ok(entry_path);
        }

        if force_refresh && entry_path.exists() {
            info!(entry = %entry_path.display(), "refreshing trailer cache entry");
            fs::remove_file(&entry_path).await?;
        }

        info!(
            source = %source.display(),
            canvas = %spec.canvas,
            "normalizing trailer (cache miss)"
        );

        // Build into a temp file and rename, so a crashed normalization
        // never registers a partial entry.
        let tmp_path = entry_path.with_extension("tmp.mp4");
        match normalizer.normalize(source, spec, &tmp_path).await {
            Ok(()) => {
                fs::rename(&tmp_path, &entry_path).await?;
                info!(entry = %entry_path.display(), "trailer cache entry ready");
                Ok(entry_path)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&tmp_path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(error = %cleanup, "failed to clean up partial trailer entry");
                    }
                }
                Err(e)
            }
        }
    }

    /// Cache key: source identity (content fingerprint) plus every target
    /// parameter. Changing any one of them yields a distinct entry.
    async fn cache_key(&self, source: &Path, spec: &TrailerSpec) -> EngineResult<String> {
        let content = fs::read(source).await?;
        let content_sig = format!("{:x}", Sha256::digest(&content));

        let abs = source
            .canonicalize()
            .unwrap_or_else(|_| source.to_path_buf());

        Ok(format!(
            "{}|{}|{}|{}",
            abs.display(),
            &content_sig[..8],
            spec.canvas,
            spec.encode_mode.tag()
        ))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
        self.cache_dir.join(format!("trailer_{}.mp4", &digest[..16]))
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key.to_string()).or_default().clone()
    }
}

async fn is_usable(path: &Path) -> bool {
    match fs::metadata(path).await {
        Ok(meta) => meta.len() > 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingNormalizer {
        calls: AtomicUsize,
    }

    impl CountingNormalizer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TrailerNormalizer for CountingNormalizer {
        async fn normalize(
            &self,
            _source: &Path,
            _spec: &TrailerSpec,
            dest: &Path,
        ) -> EngineResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent callers pile up on the key lock.
            tokio::task::yield_now().await;
            fs::write(dest, b"normalized").await?;
            Ok(())
        }
    }

    fn spec(width: u32, height: u32, fps: u32, mode: EncodeMode) -> TrailerSpec {
        TrailerSpec {
            canvas: CanvasSpec::new(width, height, fps),
            encode_mode: mode,
        }
    }

    async fn fixture() -> (TempDir, PathBuf, TrailerCache) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("tail.mp4");
        fs::write(&source, b"trailer source bytes").await.unwrap();
        let cache = TrailerCache::open(dir.path().join("cache")).unwrap();
        (dir, source, cache)
    }

    #[tokio::test]
    async fn test_create_then_reuse() {
        let (_dir, source, cache) = fixture().await;
        let normalizer = CountingNormalizer::new();
        let spec = spec(1920, 1080, 30, EncodeMode::Software);

        let first = cache
            .get_or_create(&source, &spec, &normalizer, false)
            .await
            .unwrap();
        let second = cache
            .get_or_create(&source, &spec, &normalizer, false)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(normalizer.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_normalize_once() {
        let (_dir, source, cache) = fixture().await;
        let normalizer = Arc::new(CountingNormalizer::new());
        let spec = spec(1920, 1080, 30, EncodeMode::Software);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let source = source.clone();
            let normalizer = Arc::clone(&normalizer);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_create(&source, &spec, normalizer.as_ref(), false)
                    .await
                    .unwrap()
            }));
        }

        let mut paths = Vec::new();
        for handle in handles {
            paths.push(handle.await.unwrap());
        }

        assert_eq!(normalizer.calls(), 1);
        assert!(paths.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_distinct_entries_per_parameter() {
        let (_dir, source, cache) = fixture().await;
        let normalizer = CountingNormalizer::new();

        let base = spec(1920, 1080, 30, EncodeMode::Software);
        let other_res = spec(1080, 1920, 30, EncodeMode::Software);
        let other_fps = spec(1920, 1080, 45, EncodeMode::Software);
        let other_mode = spec(1920, 1080, 30, EncodeMode::Hardware);

        let mut paths = Vec::new();
        for s in [base, other_res, other_fps, other_mode] {
            paths.push(cache.get_or_create(&source, &s, &normalizer, false).await.unwrap());
        }

        assert_eq!(normalizer.calls(), 4);
        for i in 0..paths.len() {
            for j in (i + 1)..paths.len() {
                assert_ne!(paths[i], paths[j]);
            }
        }
    }

    #[tokio::test]
    async fn test_force_refresh_recomputes() {
        let (_dir, source, cache) = fixture().await;
        let normalizer = CountingNormalizer::new();
        let spec = spec(1920, 1080, 30, EncodeMode::Software);

        cache
            .get_or_create(&source, &spec, &normalizer, false)
            .await
            .unwrap();
        cache
            .get_or_create(&source, &spec, &normalizer, true)
            .await
            .unwrap();

        assert_eq!(normalizer.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_source_is_an_error() {
        let (dir, _source, cache) = fixture().await;
        let normalizer = CountingNormalizer::new();
        let spec = spec(1920, 1080, 30, EncodeMode::Software);

        let missing = dir.path().join("absent.mp4");
        let err = cache
            .get_or_create(&missing, &spec, &normalizer, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TrailerNotFound(_)));
        assert_eq!(normalizer.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_normalization_leaves_no_entry() {
        struct FailingNormalizer;

        #[async_trait]
        impl TrailerNormalizer for FailingNormalizer {
            async fn normalize(
                &self,
                _source: &Path,
                _spec: &TrailerSpec,
                _dest: &Path,
            ) -> EngineResult<()> {
                Err(EngineError::normalization("encoder exploded"))
            }
        }

        let (_dir, source, cache) = fixture().await;
        let spec = spec(1920, 1080, 30, EncodeMode::Software);

        let err = cache
            .get_or_create(&source, &spec, &FailingNormalizer, false)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Normalization(_)));

        // A later call with a working normalizer succeeds cleanly.
        let normalizer = CountingNormalizer::new();
        cache
            .get_or_create(&source, &spec, &normalizer, false)
            .await
            .unwrap();
        assert_eq!(normalizer.calls(), 1);
    }
}
