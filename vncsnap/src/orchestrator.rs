//! The scan orchestrator: fan capture tasks out over discovered hosts,
//! isolate per-host failures, persist successful frames.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info};
use vncsnap_capture::{capture, HostAddress, StepBudget};

/// Process-scoped scan parameters, passed in explicitly at construction
/// rather than read from ambient globals.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub outdir: PathBuf,
    pub budget: StepBudget,
}

/// Monotonic timestamp source for output filenames.
///
/// Returns nanosecond stamps that are strictly increasing within the
/// process even if the clock stalls or ties, so
/// `<stamp>_<ip>.png` never collides: concurrent completions for
/// different hosts differ in the ip part, repeated sightings of one host
/// differ in the stamp.
pub struct FrameNamer {
    last: AtomicU64,
}

impl FrameNamer {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    fn stamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self
                .last
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(observed) => last = observed,
            }
        }
    }

    pub fn filename(&self, host: &HostAddress) -> String {
        format!("{}_{}.png", self.stamp(), host.ip)
    }
}

impl Default for FrameNamer {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives many capture engine invocations concurrently.
///
/// Hosts never share state: each capture task owns its connection and
/// session exclusively, so the only shared pieces are the output
/// directory and the filename stamp source.
pub struct Orchestrator {
    ctx: ScanContext,
    namer: Arc<FrameNamer>,
}

impl Orchestrator {
    pub fn new(ctx: ScanContext) -> Self {
        Self {
            ctx,
            namer: Arc::new(FrameNamer::new()),
        }
    }

    /// Batch mode: one concurrent task per result page, hosts within a
    /// page sequential. Returns once every launched task has finished;
    /// per-host failures are logged and never abort the batch.
    pub async fn run_batch(&self, pages: Vec<Vec<HostAddress>>) {
        let mut tasks = JoinSet::new();
        for hosts in pages {
            let ctx = self.ctx.clone();
            let namer = Arc::clone(&self.namer);
            tasks.spawn(async move {
                for host in hosts {
                    capture_one(&ctx, &namer, host).await;
                }
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    /// Streaming mode: dispatch each host the moment it arrives; the
    /// loop ends only when the feed closes, then drains in-flight tasks.
    pub async fn run_stream(&self, mut feed: mpsc::Receiver<HostAddress>) {
        let mut tasks = JoinSet::new();
        while let Some(host) = feed.recv().await {
            let ctx = self.ctx.clone();
            let namer = Arc::clone(&self.namer);
            tasks.spawn(async move {
                capture_one(&ctx, &namer, host).await;
            });
            // Reap what has already finished so the set stays small on
            // a long-lived feed.
            while tasks.try_join_next().is_some() {}
        }
        while tasks.join_next().await.is_some() {}
    }
}

/// One attempt against one host: exactly one log line per outcome, a
/// file only on success, never a retry.
async fn capture_one(ctx: &ScanContext, namer: &FrameNamer, host: HostAddress) {
    match capture(&host, ctx.budget).await {
        Ok(frame) => {
            let path = ctx.outdir.join(namer.filename(&host));
            match frame.to_image().save(&path) {
                Ok(()) => {
                    info!(host = %host, path = %path.display(), "dumped screenshot");
                }
                Err(e) => {
                    error!(host = %host, error = %e, "failed to write screenshot");
                }
            }
        }
        Err(e) => {
            error!(host = %host, kind = e.kind(), error = %e, "capture failed");
        }
    }
}
