//! Watch mode
//!
//! A single worker thread runs build passes one at a time. Change
//! notifications that arrive while a pass is running are merged, so any
//! number of them schedule exactly one more pass. Cancelling stops further
//! passes but lets a running one finish.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::bundler::{BuildEngine, BuildResult};
use crate::config::BuildConfig;
use crate::error::{AssemblerError, Result};

/// Quiet period before a burst of file events becomes one notification
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Paths under the project root that never trigger a rebuild
const IGNORED: &[&str] = &["**/node_modules", "**/node_modules/**", "**/.*", "**/.*/**"];

/// Called with the outcome of every rebuild
pub type RebuildCallback = Box<dyn FnMut(Result<BuildResult>) + Send>;

enum Trigger {
    Changed(Vec<PathBuf>),
    Stop,
}

/// Handle to a running watch subscription
pub struct WatchHandle {
    cancelled: Arc<AtomicBool>,
    tx: Sender<Trigger>,
    worker: Mutex<Option<JoinHandle<()>>>,
    _debouncer: Option<Debouncer<RecommendedWatcher>>,
}

impl WatchHandle {
    /// Stop scheduling passes. A pass already running completes.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            debug!("Watch cancelled");
            let _ = self.tx.send(Trigger::Stop);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Schedule a pass as if `paths` had changed
    pub fn notify_change(&self, paths: Vec<PathBuf>) {
        if !self.is_cancelled() {
            let _ = self.tx.send(Trigger::Changed(paths));
        }
    }

    /// Wait for the worker to exit; returns immediately if already joined
    pub fn join(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("Watch worker panicked");
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Start the rebuild worker without a file system subscription; passes run
/// only on [`WatchHandle::notify_change`]
pub fn spawn(
    engine: Arc<dyn BuildEngine>,
    config: Arc<BuildConfig>,
    on_rebuild: RebuildCallback,
) -> WatchHandle {
    let (tx, rx) = channel();
    start(engine, config, on_rebuild, tx, rx, None)
}

/// Watch the project root recursively and rebuild on relevant changes
pub fn watch(
    engine: Arc<dyn BuildEngine>,
    config: Arc<BuildConfig>,
    on_rebuild: RebuildCallback,
) -> Result<WatchHandle> {
    let (tx, rx) = channel();
    let filter = ChangeFilter::new(&config);

    let events = tx.clone();
    let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| match result {
        Ok(events_batch) => {
            let paths: Vec<PathBuf> = events_batch
                .into_iter()
                .map(|event| event.path)
                .filter(|path| filter.is_relevant(path))
                .collect();
            if !paths.is_empty() {
                let _ = events.send(Trigger::Changed(paths));
            }
        }
        Err(e) => error!("Watch error: {:?}", e),
    })?;
    debouncer
        .watcher()
        .watch(&config.root, RecursiveMode::Recursive)?;
    info!("Watching {} for changes", config.root.display());

    Ok(start(engine, config, on_rebuild, tx, rx, Some(debouncer)))
}

fn start(
    engine: Arc<dyn BuildEngine>,
    config: Arc<BuildConfig>,
    on_rebuild: RebuildCallback,
    tx: Sender<Trigger>,
    rx: Receiver<Trigger>,
    debouncer: Option<Debouncer<RecommendedWatcher>>,
) -> WatchHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    let worker = std::thread::spawn(move || run_loop(engine, config, rx, flag, on_rebuild));

    WatchHandle {
        cancelled,
        tx,
        worker: Mutex::new(Some(worker)),
        _debouncer: debouncer,
    }
}

fn run_loop(
    engine: Arc<dyn BuildEngine>,
    config: Arc<BuildConfig>,
    rx: Receiver<Trigger>,
    cancelled: Arc<AtomicBool>,
    mut on_rebuild: RebuildCallback,
) {
    while let Ok(trigger) = rx.recv() {
        let Trigger::Changed(mut changed) = trigger else {
            break;
        };

        // Merge everything that queued up during the previous pass
        let mut stop = false;
        while let Ok(next) = rx.try_recv() {
            match next {
                Trigger::Changed(paths) => changed.extend(paths),
                Trigger::Stop => stop = true,
            }
        }
        if stop || cancelled.load(Ordering::SeqCst) {
            break;
        }

        changed.sort();
        changed.dedup();
        for path in &changed {
            info!("Changed: {}", path.display());
        }

        let result = match config.check() {
            Ok(()) => engine.run(&config).map_err(AssemblerError::from),
            Err(e) => Err(e.into()),
        };
        on_rebuild(result);
    }
    debug!("Watch worker stopped");
}

/// Decides which file events are worth a rebuild
struct ChangeFilter {
    root: PathBuf,
    output_dir: PathBuf,
    ignored: GlobSet,
}

impl ChangeFilter {
    fn new(config: &BuildConfig) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in IGNORED {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        Self {
            root: config.root.clone(),
            output_dir: config.output_dir.clone(),
            ignored: builder.build().unwrap_or_else(|_| GlobSet::empty()),
        }
    }

    fn is_relevant(&self, path: &Path) -> bool {
        if path.starts_with(&self.output_dir) {
            return false;
        }
        match path.strip_prefix(&self.root) {
            Ok(relative) => !self.ignored.is_match(relative),
            Err(_) => false,
        }
    }
}
