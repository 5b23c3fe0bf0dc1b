//! Watch mode: rebuild a document whenever one of its content fragments
//! changes.
//!
//! [`WatchCoordinator`] is the synchronous IDLE/REBUILDING state machine.
//! A rebuild holds the coordinator mutably until it returns, so the
//! REBUILDING state is the span of one [`WatchCoordinator::on_change`] call.
//! [`watch`] subscribes to filesystem notifications with `notify`, feeds
//! them to the coordinator, and ends the session when the shutdown future
//! completes. A rebuild always runs to completion; an interrupt that arrives
//! meanwhile is handled once it has finished.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use seagull_shared::{Result, SeagullError};

use crate::convert;
use crate::document::BuildUnit;

/// A batch of changed paths from one filesystem notification.
pub type ChangeBatch = Vec<PathBuf>;

/// What the coordinator did with a change notification.
#[derive(Debug)]
pub enum Trigger {
    /// No tracked path was involved.
    Ignored,
    Rebuilt,
    Failed(SeagullError),
}

/// The action run on a qualifying change.
pub trait Rebuild {
    fn rebuild(&mut self) -> Result<()>;
}

impl<F> Rebuild for F
where
    F: FnMut() -> Result<()>,
{
    fn rebuild(&mut self) -> Result<()> {
        self()
    }
}

/// Counters for one watch session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub rebuilds: usize,
    pub failures: usize,
    pub ignored: usize,
    /// Notifications that arrived while a rebuild was running.
    pub dropped: usize,
}

/// Filters change notifications down to the tracked fragment sources and
/// runs the rebuild action, one rebuild at a time.
///
/// Notifications that arrive while a rebuild runs cannot reach the
/// coordinator; [`run_loop`] drops them once the rebuild returns.
pub struct WatchCoordinator<R> {
    tracked: HashSet<PathBuf>,
    rebuilder: R,
}

impl<R: Rebuild> WatchCoordinator<R> {
    pub fn new(tracked: impl IntoIterator<Item = PathBuf>, rebuilder: R) -> Self {
        Self {
            tracked: tracked.into_iter().collect(),
            rebuilder,
        }
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.tracked.contains(path)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Handle one changed path.
    pub fn on_change(&mut self, path: &Path) -> Trigger {
        if !self.is_tracked(path) {
            return Trigger::Ignored;
        }

        info!(path = %path.display(), "change detected, rebuilding");
        match self.rebuilder.rebuild() {
            Ok(()) => Trigger::Rebuilt,
            Err(e) => Trigger::Failed(e),
        }
    }

    /// Handle a coalesced batch: at most one rebuild, triggered by the first
    /// tracked path in it.
    pub fn on_batch(&mut self, paths: &[PathBuf]) -> Trigger {
        match paths.iter().find(|p| self.is_tracked(p)) {
            Some(path) => self.on_change(path),
            None => Trigger::Ignored,
        }
    }
}

/// Watch root and tracked content sources for `unit`, with the root made
/// canonical so the paths match what the OS reports.
pub fn watch_targets(unit: &BuildUnit) -> Result<(PathBuf, Vec<PathBuf>)> {
    let content = &unit.project().content_path;
    let root = content
        .canonicalize()
        .map_err(|e| SeagullError::io(content, e))?;

    let tracked = unit
        .config()
        .inputs
        .iter()
        .map(|id| convert::source_file(&root, id))
        .collect();
    Ok((root, tracked))
}

/// Paths of a notification worth reacting to (creations and modifications).
pub fn relevant_paths(event: Event) -> Option<ChangeBatch> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => Some(event.paths),
        _ => None,
    }
}

/// Subscribe to changes under `root`. Dropping the returned watcher ends the
/// subscription.
pub fn subscribe(root: &Path) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<ChangeBatch>)> {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if let Some(paths) = relevant_paths(event) {
                let _ = tx.send(paths);
            }
        }
        Err(e) => warn!(error = %e, "filesystem watcher error"),
    })
    .map_err(|e| SeagullError::Watch(format!("failed to create watcher: {e}")))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| SeagullError::Watch(format!("failed to watch {}: {e}", root.display())))?;

    Ok((watcher, rx))
}

/// Run a watch session on `root` until `shutdown` completes.
pub async fn watch<R, S>(
    root: &Path,
    coordinator: &mut WatchCoordinator<R>,
    debounce: Duration,
    shutdown: S,
) -> Result<SessionSummary>
where
    R: Rebuild,
    S: Future<Output = ()>,
{
    let (watcher, mut events) = subscribe(root)?;
    info!(
        root = %root.display(),
        tracked = coordinator.tracked_count(),
        "watching for changes (build.yml edits need a restart)"
    );

    let summary = run_loop(coordinator, &mut events, debounce, shutdown).await;
    drop(watcher);
    summary
}

/// Event loop behind [`watch`], fed from any channel of change batches.
///
/// After the first relevant batch, further batches arriving within
/// `debounce` join the same rebuild. Batches that pile up while the rebuild
/// runs are dropped. A failed rebuild is logged and the loop keeps waiting.
pub async fn run_loop<R, S>(
    coordinator: &mut WatchCoordinator<R>,
    events: &mut mpsc::UnboundedReceiver<ChangeBatch>,
    debounce: Duration,
    shutdown: S,
) -> Result<SessionSummary>
where
    R: Rebuild,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut summary = SessionSummary::default();

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                info!(rebuilds = summary.rebuilds, failures = summary.failures, "watch session ended");
                return Ok(summary);
            }

            batch = events.recv() => {
                let Some(mut batch) = batch else {
                    return Err(SeagullError::Watch("filesystem subscription closed".into()));
                };

                if !batch.iter().any(|p| coordinator.is_tracked(p)) {
                    trace!(paths = ?batch, "ignoring untracked change");
                    summary.ignored += 1;
                    continue;
                }

                tokio::time::sleep(debounce).await;
                while let Ok(more) = events.try_recv() {
                    batch.extend(more);
                }

                match coordinator.on_batch(&batch) {
                    Trigger::Rebuilt => summary.rebuilds += 1,
                    Trigger::Failed(e) => {
                        summary.failures += 1;
                        error!(error = %e, "rebuild failed; waiting for the next change");
                    }
                    Trigger::Ignored => {}
                }

                let mut dropped = 0;
                while events.try_recv().is_ok() {
                    dropped += 1;
                }
                if dropped > 0 {
                    debug!(dropped, "dropped changes received during rebuild");
                    summary.dropped += dropped;
                }
            }
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("received interrupt"),
        () = terminate => info!("received SIGTERM"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;

    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use tokio::sync::Notify;

    use super::*;

    fn tracked() -> Vec<PathBuf> {
        vec![PathBuf::from("/src/intro.md"), PathBuf::from("/src/body.md")]
    }

    #[test]
    fn untracked_paths_never_rebuild() {
        let count = Cell::new(0);
        let mut coordinator = WatchCoordinator::new(tracked(), || -> Result<()> {
            count.set(count.get() + 1);
            Ok(())
        });

        assert!(matches!(
            coordinator.on_change(Path::new("/src/appendix.md")),
            Trigger::Ignored
        ));
        assert!(matches!(
            coordinator.on_change(Path::new("/src/intro.md.swp")),
            Trigger::Ignored
        ));
        assert!(matches!(
            coordinator.on_batch(&[PathBuf::from("/out/intro.tex")]),
            Trigger::Ignored
        ));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn tracked_path_while_idle_rebuilds_once() {
        let count = Cell::new(0);
        let mut coordinator = WatchCoordinator::new(tracked(), || -> Result<()> {
            count.set(count.get() + 1);
            Ok(())
        });

        assert!(matches!(
            coordinator.on_change(Path::new("/src/body.md")),
            Trigger::Rebuilt
        ));
        assert_eq!(count.get(), 1);

        let batch = vec![PathBuf::from("/src/intro.md"), PathBuf::from("/src/body.md")];
        assert!(matches!(coordinator.on_batch(&batch), Trigger::Rebuilt));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn failed_rebuild_leaves_coordinator_ready() {
        let calls = Cell::new(0);
        let mut coordinator = WatchCoordinator::new(tracked(), || -> Result<()> {
            calls.set(calls.get() + 1);
            Err(SeagullError::build_failed("convert intro", Some(1)))
        });

        match coordinator.on_change(Path::new("/src/intro.md")) {
            Trigger::Failed(SeagullError::BuildFailed { stage, .. }) => {
                assert_eq!(stage, "convert intro")
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(matches!(
            coordinator.on_change(Path::new("/src/intro.md")),
            Trigger::Failed(_)
        ));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn only_create_and_modify_events_are_relevant() {
        let path = PathBuf::from("/src/intro.md");
        let event = |kind| Event::new(kind).add_path(path.clone());

        assert_eq!(
            relevant_paths(event(EventKind::Modify(ModifyKind::Any))),
            Some(vec![path.clone()])
        );
        assert!(relevant_paths(event(EventKind::Create(CreateKind::File))).is_some());
        assert!(relevant_paths(event(EventKind::Access(AccessKind::Any))).is_none());
        assert!(relevant_paths(event(EventKind::Remove(RemoveKind::File))).is_none());
    }

    #[tokio::test]
    async fn loop_rebuilds_for_tracked_changes_until_shutdown() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let done = Arc::new(Notify::new());
        let count = Rc::new(Cell::new(0));

        let rebuild_done = done.clone();
        let rebuild_count = count.clone();
        let mut coordinator = WatchCoordinator::new(tracked(), move || -> Result<()> {
            rebuild_count.set(rebuild_count.get() + 1);
            rebuild_done.notify_one();
            Ok(())
        });

        tx.send(vec![PathBuf::from("/src/notes.txt")]).unwrap();
        tx.send(vec![PathBuf::from("/src/intro.md")]).unwrap();
        tx.send(vec![PathBuf::from("/src/intro.md")]).unwrap();

        let shutdown = async move { done.notified().await };
        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            run_loop(&mut coordinator, &mut rx, Duration::from_millis(10), shutdown),
        )
        .await
        .expect("loop should end after the rebuild")
        .unwrap();

        assert_eq!(count.get(), 1);
        assert_eq!(summary.rebuilds, 1);
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.failures, 0);
    }

    #[tokio::test]
    async fn changes_during_a_rebuild_are_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let done = Arc::new(Notify::new());
        let count = Rc::new(Cell::new(0));

        let (rebuild_tx, rebuild_done, rebuild_count) = (tx.clone(), done.clone(), count.clone());
        let mut coordinator = WatchCoordinator::new(tracked(), move || -> Result<()> {
            rebuild_count.set(rebuild_count.get() + 1);
            rebuild_tx.send(vec![PathBuf::from("/src/intro.md")]).unwrap();
            rebuild_tx.send(vec![PathBuf::from("/src/body.md")]).unwrap();
            rebuild_done.notify_one();
            Ok(())
        });

        tx.send(vec![PathBuf::from("/src/intro.md")]).unwrap();

        let shutdown = async move { done.notified().await };
        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            run_loop(&mut coordinator, &mut rx, Duration::from_millis(1), shutdown),
        )
        .await
        .expect("loop should end after the rebuild")
        .unwrap();

        assert_eq!(count.get(), 1);
        assert_eq!(summary.rebuilds, 1);
        assert_eq!(summary.dropped, 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_rebuild_does_not_end_the_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let failed = Arc::new(Notify::new());
        let done = Arc::new(Notify::new());
        let calls = Rc::new(Cell::new(0));

        let (rebuild_failed, rebuild_done, rebuild_calls) =
            (failed.clone(), done.clone(), calls.clone());
        let mut coordinator = WatchCoordinator::new(tracked(), move || -> Result<()> {
            rebuild_calls.set(rebuild_calls.get() + 1);
            if rebuild_calls.get() == 1 {
                rebuild_failed.notify_one();
                Err(SeagullError::build_failed("pdflatex", Some(1)))
            } else {
                rebuild_done.notify_one();
                Ok(())
            }
        });

        tx.send(vec![PathBuf::from("/src/body.md")]).unwrap();
        let resend = tx.clone();
        tokio::spawn(async move {
            failed.notified().await;
            resend.send(vec![PathBuf::from("/src/body.md")]).unwrap();
        });

        let shutdown = async move { done.notified().await };
        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            run_loop(&mut coordinator, &mut rx, Duration::from_millis(1), shutdown),
        )
        .await
        .expect("loop should survive the failure")
        .unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.rebuilds, 1);
    }

    #[tokio::test]
    async fn closed_subscription_is_an_error() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ChangeBatch>();
        drop(tx);
        let mut coordinator = WatchCoordinator::new(tracked(), || -> Result<()> { Ok(()) });

        let err = run_loop(
            &mut coordinator,
            &mut rx,
            Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SeagullError::Watch(_)));
    }
}
