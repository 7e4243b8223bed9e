//! Streaming Renderer (spec §4.9, C9): produces an ordered lazy sequence of
//! typed [`Chunk`]s with suspense boundaries, a timeout, and consumer
//! cancellation, grounded on the workspace's existing `futures`/
//! `async-channel`/`tokio` stack (the same combination `package-manager`
//! used for its own progress reporting).

pub mod chunk;
pub mod error;

pub use chunk::{wrap_suspense, Chunk, ChunkKind};
pub use error::{StreamingError, StreamingResult};

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone)]
pub struct StreamingConfig {
    pub chunk_buffer_size: usize,
    pub flush_interval_ms: u64,
    pub progressive_hydration: bool,
    pub timeout_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_buffer_size: 1024,
            flush_interval_ms: 50,
            progressive_hydration: true,
            timeout_ms: 10_000,
        }
    }
}

type ChunkCallback = Arc<dyn Fn(&Chunk) + Send + Sync>;
type CompleteCallback = Arc<dyn Fn(&StreamStats) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-call overrides plus the `on_chunk`/`on_complete`/`on_error` hooks
/// (spec §4.9 "Stats at completion").
#[derive(Clone, Default)]
pub struct StreamOptions {
    pub progressive_hydration: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub on_chunk: Option<ChunkCallback>,
    pub on_complete: Option<CompleteCallback>,
    pub on_error: Option<ErrorCallback>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamStats {
    pub total_chunks: u64,
    pub total_bytes: u64,
    pub render_time_ms: u64,
    pub first_chunk_time_ms: Option<u64>,
    pub suspense_count: u64,
}

/// A cold stream of [`Chunk`]s. Wraps an [`async_channel::Receiver`] so it
/// can be consumed either by polling [`futures::Stream`] or by calling
/// [`ChunkStream::recv`] directly.
pub struct ChunkStream {
    receiver: async_channel::Receiver<Chunk>,
}

impl ChunkStream {
    pub async fn recv(&mut self) -> Option<Chunk> {
        self.receiver.recv().await.ok()
    }
}

impl futures::Stream for ChunkStream {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

/// A future yielding a suspense boundary's resolved HTML, or an error
/// message on rejection (spec §4.9 `async_content: mapping id → future`).
pub type SuspenseFuture = BoxFuture<'static, Result<String, String>>;

/// Owns the global active-stream count and cancellation registry (spec §5
/// "Cancellation": the global status returns to idle when no active
/// streams remain).
#[derive(Clone, Default)]
pub struct StreamingRenderer {
    config: StreamingConfig,
    active: Arc<AtomicUsize>,
    registry: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl StreamingRenderer {
    pub fn new(config: StreamingConfig) -> Self {
        Self {
            config,
            active: Arc::new(AtomicUsize::new(0)),
            registry: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn active_stream_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Marks every currently active stream cancelled; each stream's
    /// producer loop observes this on its next chunk and closes.
    pub fn cancel_all_streams(&self) {
        let registry = self.registry.lock().unwrap();
        for flag in registry.iter() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    fn register(&self) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.registry.lock().unwrap().push(flag.clone());
        self.active.fetch_add(1, Ordering::SeqCst);
        flag
    }

    fn unregister(&self, flag: &Arc<AtomicBool>) {
        let mut registry = self.registry.lock().unwrap();
        registry.retain(|f| !Arc::ptr_eq(f, flag));
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// `render_to_stream(html, options)` (spec §4.9).
    pub fn render_to_stream(&self, html: String, options: StreamOptions) -> ChunkStream {
        let hydration = options
            .progressive_hydration
            .unwrap_or(self.config.progressive_hydration);
        let timeout_ms = options.timeout_ms.unwrap_or(self.config.timeout_ms);
        let (sender, receiver) = async_channel::bounded(self.config.chunk_buffer_size.max(1));
        let cancel = self.register();
        let this = self.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let timeout = Duration::from_millis(timeout_ms);
            let mut stats = StreamStats::default();

            let parsed = chunk::parse_html_chunks(&html, hydration);
            let mut timed_out = false;
            for (kind, content, id) in parsed {
                if started.elapsed() > timeout {
                    timed_out = true;
                    break;
                }
                if cancel.load(Ordering::SeqCst) {
                    this.unregister(&cancel);
                    return;
                }
                let c = Chunk::new(kind, content, id, now_ms());
                stats.total_chunks += 1;
                stats.total_bytes += c.content.len() as u64;
                if stats.first_chunk_time_ms.is_none() {
                    stats.first_chunk_time_ms = Some(started.elapsed().as_millis() as u64);
                }
                if matches!(c.kind, ChunkKind::Suspense) {
                    stats.suspense_count += 1;
                }
                if let Some(cb) = &options.on_chunk {
                    cb(&c);
                }
                if sender.send(c).await.is_err() {
                    this.unregister(&cancel);
                    return;
                }
            }

            if timed_out {
                let err = Chunk::new(ChunkKind::Error, "stream timed out", None, now_ms());
                if let Some(cb) = &options.on_chunk {
                    cb(&err);
                }
                if let Some(cb) = &options.on_error {
                    cb("stream timed out");
                }
                let _ = sender.send(err).await;
                this.unregister(&cancel);
                return;
            }

            let end = Chunk::new(ChunkKind::End, "", None, now_ms());
            stats.total_chunks += 1;
            stats.render_time_ms = started.elapsed().as_millis() as u64;
            if let Some(cb) = &options.on_chunk {
                cb(&end);
            }
            let _ = sender.send(end).await;
            if let Some(cb) = &options.on_complete {
                cb(&stats);
            }
            this.unregister(&cancel);
        });

        ChunkStream { receiver }
    }

    /// `render_to_stream_with_suspense(shell_html, async_content, options)`
    /// (spec §4.9): emits the shell, then resolves every future in
    /// `async_content` in parallel, enqueuing a `suspense`/`error` chunk as
    /// each settles, in settlement order, followed by `end`.
    pub fn render_to_stream_with_suspense(
        &self,
        shell_html: String,
        async_content: Vec<(String, SuspenseFuture)>,
        options: StreamOptions,
    ) -> ChunkStream {
        let hydration = options
            .progressive_hydration
            .unwrap_or(self.config.progressive_hydration);
        let (sender, receiver) = async_channel::bounded(self.config.chunk_buffer_size.max(1));
        let cancel = self.register();
        let this = self.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let mut stats = StreamStats::default();

            let parsed = chunk::parse_html_chunks(&shell_html, hydration);
            for (kind, content, id) in parsed {
                if cancel.load(Ordering::SeqCst) {
                    this.unregister(&cancel);
                    return;
                }
                let c = Chunk::new(kind, content, id, now_ms());
                stats.total_chunks += 1;
                stats.total_bytes += c.content.len() as u64;
                if stats.first_chunk_time_ms.is_none() {
                    stats.first_chunk_time_ms = Some(started.elapsed().as_millis() as u64);
                }
                if let Some(cb) = &options.on_chunk {
                    cb(&c);
                }
                if sender.send(c).await.is_err() {
                    this.unregister(&cancel);
                    return;
                }
            }

            let mut pending: FuturesUnordered<_> = async_content
                .into_iter()
                .map(|(id, fut)| async move { (id, fut.await) })
                .collect();

            while let Some((id, result)) = pending.next().await {
                if cancel.load(Ordering::SeqCst) {
                    this.unregister(&cancel);
                    return;
                }
                let chunk = match result {
                    Ok(content) => {
                        stats.suspense_count += 1;
                        let wrapped = if hydration {
                            chunk::wrap_suspense(&id, &content)
                        } else {
                            content
                        };
                        Chunk::new(ChunkKind::Suspense, wrapped, Some(id), now_ms())
                    }
                    Err(_) => {
                        if let Some(cb) = &options.on_error {
                            cb(&format!("suspense boundary '{id}' failed"));
                        }
                        Chunk::new(
                            ChunkKind::Error,
                            "failed to render suspense boundary",
                            Some(id),
                            now_ms(),
                        )
                    }
                };
                stats.total_chunks += 1;
                stats.total_bytes += chunk.content.len() as u64;
                if let Some(cb) = &options.on_chunk {
                    cb(&chunk);
                }
                if sender.send(chunk).await.is_err() {
                    this.unregister(&cancel);
                    return;
                }
            }

            let end = Chunk::new(ChunkKind::End, "", None, now_ms());
            stats.total_chunks += 1;
            stats.render_time_ms = started.elapsed().as_millis() as u64;
            if let Some(cb) = &options.on_chunk {
                cb(&end);
            }
            let _ = sender.send(end).await;
            if let Some(cb) = &options.on_complete {
                cb(&stats);
            }
            this.unregister(&cancel);
        });

        ChunkStream { receiver }
    }

    /// Drains `stream` to completion and concatenates every chunk's content.
    pub async fn stream_to_string(&self, mut stream: ChunkStream) -> String {
        let mut out = String::new();
        while let Some(chunk) = stream.recv().await {
            out.push_str(&chunk.content);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streams_head_shell_suspense_content_end_in_order() {
        let renderer = StreamingRenderer::new(StreamingConfig::default());
        let html = "<html><head><title>T</title></head><body>\nA<!-- SUSPENSE:x -->B<!-- /SUSPENSE:x -->C\n</body></html>".to_string();
        let mut stream = renderer.render_to_stream(html, StreamOptions::default());
        let mut kinds = Vec::new();
        while let Some(c) = stream.recv().await {
            kinds.push(c.kind);
        }
        assert_eq!(
            kinds,
            vec![
                ChunkKind::Head,
                ChunkKind::Shell,
                ChunkKind::Suspense,
                ChunkKind::Content,
                ChunkKind::End
            ]
        );
    }

    #[tokio::test]
    async fn end_is_always_last_and_exactly_once() {
        let renderer = StreamingRenderer::new(StreamingConfig::default());
        let mut stream = renderer.render_to_stream("no tags here".to_string(), StreamOptions::default());
        let mut kinds = Vec::new();
        while let Some(c) = stream.recv().await {
            kinds.push(c.kind);
        }
        assert_eq!(kinds.iter().filter(|k| **k == ChunkKind::End).count(), 1);
        assert_eq!(*kinds.last().unwrap(), ChunkKind::End);
    }

    #[tokio::test]
    async fn suspense_futures_resolve_and_settle_before_end() {
        let renderer = StreamingRenderer::new(StreamingConfig::default());
        let futures_map = vec![
            ("a".to_string(), Box::pin(async { Ok("A-content".to_string()) }) as SuspenseFuture),
            ("b".to_string(), Box::pin(async { Err("boom".to_string()) }) as SuspenseFuture),
        ];
        let mut stream = renderer.render_to_stream_with_suspense(
            "<body>shell</body>".to_string(),
            futures_map,
            StreamOptions::default(),
        );
        let mut kinds = Vec::new();
        while let Some(c) = stream.recv().await {
            kinds.push(c.kind);
        }
        assert_eq!(*kinds.last().unwrap(), ChunkKind::End);
        assert_eq!(kinds.iter().filter(|k| **k == ChunkKind::Suspense).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == ChunkKind::Error).count(), 1);
    }

    #[tokio::test]
    async fn active_stream_count_tracks_lifecycle() {
        let renderer = StreamingRenderer::new(StreamingConfig::default());
        assert_eq!(renderer.active_stream_count(), 0);
        let mut stream = renderer.render_to_stream("no tags".to_string(), StreamOptions::default());
        assert_eq!(renderer.active_stream_count(), 1);
        while stream.recv().await.is_some() {}
        // Give the spawned task a tick to run its post-send unregister.
        tokio::task::yield_now().await;
        assert_eq!(renderer.active_stream_count(), 0);
    }

    #[tokio::test]
    async fn stream_to_string_concatenates_chunks() {
        let renderer = StreamingRenderer::new(StreamingConfig::default());
        let stream = renderer.render_to_stream("hello world".to_string(), StreamOptions::default());
        let s = renderer.stream_to_string(stream).await;
        assert!(s.contains("hello world"));
    }
}
