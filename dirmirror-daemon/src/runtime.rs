use std::sync::Arc;

use tokio::sync::broadcast;

use dirmirror_core::{DaemonConfig, SyncReport};
use dirmirror_sync::{reconcile, ReconcileOptions};

use crate::error::{io_err, DaemonError};
use crate::log_rotation::RotatingLog;
use crate::logging::init_tracing;
use crate::paths::ROTATION_CHECK_INTERVAL;

/// Validate `config`, set up logging, and mirror forever on the current
/// thread.
///
/// Returns only on ctrl-c or a startup failure. Configuration problems are
/// reported as [`DaemonError::Config`] before any cycle runs.
pub fn run_forever(config: DaemonConfig) -> Result<(), DaemonError> {
    config.validate()?;
    let log_file = init_tracing(&config.log)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    runtime.block_on(run(config, log_file, shutdown_tx))
}

/// Run the daemon until `shutdown_tx` fires or ctrl-c is received.
///
/// Tasks: the sync loop, the log rotation timer (when a log file is given),
/// and the ctrl-c handler. When any of them exits, the others are told to
/// stop.
pub async fn run(
    config: DaemonConfig,
    log_file: Option<Arc<RotatingLog>>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    config.validate()?;
    tracing::info!(
        source = %config.source.display(),
        target = %config.target.display(),
        interval_secs = config.interval_secs,
        "dirmirror daemon started",
    );

    let sync_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let result = sync_loop_task(config, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = log_file.map(|log| {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let result = log_rotation_task(log, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    });

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, stopping after the current cycle");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => {
                            let _ = shutdown.send(());
                            Err(io_err("ctrl-c handler", err))
                        }
                    }
                }
            }
        })
    };

    let (sync_result, signal_result) = tokio::join!(sync_handle, signal_handle);
    handle_join("sync_loop", sync_result)?;
    handle_join("signal_handler", signal_result)?;
    if let Some(handle) = rotation_handle {
        handle_join("log_rotation", handle.await)?;
    }
    Ok(())
}

/// Run one reconciliation cycle on the blocking pool.
pub async fn run_cycle(config: &DaemonConfig) -> Result<SyncReport, DaemonError> {
    let source = config.source.clone();
    let target = config.target.clone();
    let report = tokio::task::spawn_blocking(move || {
        reconcile(&source, &target, &ReconcileOptions::default())
    })
    .await
    .map_err(|err| DaemonError::Join(format!("sync cycle: {err}")))??;
    Ok(report)
}

/// cycle → sleep(interval) → cycle, until shutdown.
///
/// Shutdown is observed between cycles; a running cycle always finishes.
async fn sync_loop_task(
    config: DaemonConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let interval = config.interval();
    let mut cycle: u64 = 0;

    loop {
        cycle += 1;
        match run_cycle(&config).await {
            Ok(report) => log_report(cycle, &report),
            Err(err) => tracing::error!(cycle, error = %err, "sync cycle failed; retrying next interval"),
        }

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!(cycles = cycle, "dirmirror daemon stopped");
    Ok(())
}

fn log_report(cycle: u64, report: &SyncReport) {
    let summary = report.summary();
    tracing::info!(
        cycle,
        copied = summary.copied,
        updated = summary.updated,
        deleted = summary.deleted,
        errors = summary.errors,
        duration_ms = summary.duration_ms,
        "sync cycle completed",
    );
}

async fn log_rotation_task(
    log: Arc<RotatingLog>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(ROTATION_CHECK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // consume the first immediate tick

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let handle = log.clone();
                match tokio::task::spawn_blocking(move || handle.rotate()).await {
                    Ok(Ok(true)) => tracing::info!(path = %log.path().display(), "log file rotated"),
                    Ok(Ok(false)) => {}
                    Ok(Err(err)) => tracing::warn!(error = %err, "log rotation failed"),
                    Err(err) => tracing::warn!(error = %err, "log rotation task failed"),
                }
            }
        }
    }
    Ok(())
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join(format!("{task}: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use tempfile::TempDir;

    async fn wait_for(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if done() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        done()
    }

    fn config_for(src: &Path, dst: &Path) -> DaemonConfig {
        DaemonConfig::new(src, dst).with_interval_secs(1)
    }

    #[tokio::test]
    async fn run_cycle_mirrors_tree() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("a")).unwrap();
        fs::write(src.path().join("a/b.txt"), "X").unwrap();
        fs::write(dst.path().join("old.txt"), "stale").unwrap();

        let report = run_cycle(&config_for(src.path(), dst.path())).await.unwrap();

        assert_eq!(report.summary().copied, 1);
        assert_eq!(report.summary().deleted, 1);
        assert_eq!(fs::read_to_string(dst.path().join("a/b.txt")).unwrap(), "X");
        assert!(!dst.path().join("old.txt").exists());
    }

    #[tokio::test]
    async fn run_cycle_surfaces_missing_root_as_sync_error() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let config = config_for(&src.path().join("vanished"), dst.path());

        let err = run_cycle(&config).await.unwrap_err();
        assert!(matches!(err, DaemonError::Sync(_)), "got: {err}");
    }

    #[tokio::test]
    async fn run_rejects_missing_root_before_starting() {
        let src = TempDir::new().unwrap();
        let (shutdown_tx, _) = broadcast::channel(4);
        let config = config_for(src.path(), &src.path().join("no-target"));

        let err = run(config, None, shutdown_tx).await.unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)), "got: {err}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn daemon_loop_mirrors_each_interval_and_stops_on_shutdown() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::write(src.path().join("first.txt"), "1").unwrap();

        let (shutdown_tx, _) = broadcast::channel(4);
        let daemon = tokio::spawn(run(
            config_for(src.path(), dst.path()),
            None,
            shutdown_tx.clone(),
        ));

        let first = dst.path().join("first.txt");
        assert!(wait_for(Duration::from_secs(5), || first.exists()).await);

        fs::write(src.path().join("second.txt"), "2").unwrap();
        let second = dst.path().join("second.txt");
        assert!(
            wait_for(Duration::from_secs(5), || second.exists()).await,
            "next cycle should pick up new source files"
        );

        shutdown_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), daemon)
            .await
            .expect("daemon should stop after shutdown")
            .expect("join");
        assert!(result.is_ok(), "daemon returned: {result:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn daemon_loop_survives_a_failing_cycle() {
        let workspace = TempDir::new().unwrap();
        let src = workspace.path().join("src");
        let dst = workspace.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();

        let (shutdown_tx, _) = broadcast::channel(4);
        let daemon = tokio::spawn(run(config_for(&src, &dst), None, shutdown_tx.clone()));

        let copied = dst.join("a.txt");
        assert!(wait_for(Duration::from_secs(5), || copied.exists()).await);

        // Let at least one cycle fail on the missing source root.
        fs::remove_dir_all(&src).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!daemon.is_finished(), "a failed cycle must not stop the loop");

        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("b.txt"), "b").unwrap();
        let recovered = dst.join("b.txt");
        assert!(
            wait_for(Duration::from_secs(5), || recovered.exists() && !copied.exists()).await,
            "loop should resume mirroring once the source is back"
        );

        shutdown_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), daemon)
            .await
            .expect("daemon should stop after shutdown")
            .expect("join");
        assert!(result.is_ok(), "daemon returned: {result:?}");
    }
}
