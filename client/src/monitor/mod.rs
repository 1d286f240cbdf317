//! Polls the backend's download progress at a fixed cadence until the
//! download reaches a terminal state.
//!
//! A [`ProgressMonitor`] owns at most one [`PollSession`]. Every session
//! gets a fresh id and a tick only takes effect while its id is the one
//! recorded in the shared state, checked under the same lock that
//! `start()`, `stop()` and teardown use. Once `stop()` returns or the
//! monitor is dropped no tick can change the published state, even if its
//! request was already in flight.

mod session;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use api::{DownloadProgress, DownloadStatus};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::backend::{self, MediaBackend};
use crate::util::ONE_SECOND;

pub use self::session::PollSession;

pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 30;
pub const DOWNLOAD_FAILED: &str = "Download failed";
pub const BACKEND_UNREACHABLE: &str = "Lost contact with the backend while downloading";

const MIN_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Progress endpoint unreachable: {0}")]
    Transport(String),
    #[error("Unreadable progress payload: {0}")]
    Malformed(String),
}

impl From<backend::Error> for Error {
    fn from(value: backend::Error) -> Self {
        match value {
            backend::Error::Malformed(e) => Error::Malformed(e.to_string()),
            e => Error::Transport(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Anything the monitor can read the current download progress from.
#[async_trait]
pub trait ProgressSource {
    /// `Ok(None)` when there is nothing to report this tick.
    async fn fetch_progress(&self) -> Result<Option<DownloadProgress>>;
}

#[async_trait]
impl ProgressSource for MediaBackend {
    async fn fetch_progress(&self) -> Result<Option<DownloadProgress>> {
        Ok(self.download_progress().await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Wait between two progress reads, the first read happens one
    /// interval after `start()`.
    pub interval: Duration,
    /// Transport failures in a row after which the session gives up.
    /// `None` keeps polling for as long as the session lives.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: ONE_SECOND,
            max_consecutive_failures: Some(DEFAULT_MAX_CONSECUTIVE_FAILURES),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Errored,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Polling,
    Terminated(Outcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorUpdate {
    pub session: u64,
    pub kind: UpdateKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Started,
    Progress(DownloadProgress),
    Finished,
    /// User facing failure notification.
    Failed(String),
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct Shared {
    state: MonitorState,
    snapshot: Option<DownloadProgress>,
    loading: bool,
    /// Session allowed to mutate this state, 0 when there is none.
    current: u64,
    updates: mpsc::UnboundedSender<MonitorUpdate>,
}

impl Shared {
    fn emit(&self, session: u64, kind: UpdateKind) {
        // nobody listening is not a reason to stop polling
        let _ = self.updates.send(MonitorUpdate { session, kind });
    }

    fn publish(&mut self, session: u64, progress: DownloadProgress) {
        self.snapshot = Some(progress.clone());
        self.emit(session, UpdateKind::Progress(progress));
    }

    fn observe(&mut self, session: u64, progress: DownloadProgress) -> Flow {
        match progress.status {
            DownloadStatus::Downloading => {
                self.loading = true;
                self.publish(session, progress);
                Flow::Continue
            }
            DownloadStatus::Idle | DownloadStatus::Starting => {
                self.publish(session, progress);
                Flow::Continue
            }
            DownloadStatus::Finished => {
                log::info!("Download finished, ending poll session {}", session);
                self.terminate(session, Outcome::Finished);
                Flow::Stop
            }
            DownloadStatus::Error => {
                log::error!("Backend reported a failed download, ending poll session {}", session);
                self.terminate(session, Outcome::Errored);
                Flow::Stop
            }
            DownloadStatus::Unknown => {
                log::warn!("Ignoring progress with an unknown status: {:?}", progress);
                Flow::Continue
            }
        }
    }

    fn terminate(&mut self, session: u64, outcome: Outcome) {
        self.state = MonitorState::Terminated(outcome);
        self.snapshot = None;
        self.loading = false;
        let kind = match outcome {
            Outcome::Finished => UpdateKind::Finished,
            Outcome::Errored => UpdateKind::Failed(DOWNLOAD_FAILED.to_owned()),
            Outcome::Unreachable => UpdateKind::Failed(BACKEND_UNREACHABLE.to_owned()),
        };
        self.emit(session, kind);
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Watches one download at a time through a [`ProgressSource`].
///
/// Polling runs on a spawned tokio task, so `start()` must be called from
/// within a runtime. State changes are mirrored on the update channel
/// returned by [`ProgressMonitor::new`].
pub struct ProgressMonitor<S> {
    source: Arc<S>,
    config: MonitorConfig,
    shared: Arc<Mutex<Shared>>,
    session: Option<PollSession>,
    last_id: u64,
}

impl<S> ProgressMonitor<S>
where
    S: ProgressSource + Send + Sync + 'static,
{
    pub fn new(
        source: Arc<S>,
        config: MonitorConfig,
    ) -> (Self, mpsc::UnboundedReceiver<MonitorUpdate>) {
        let (updates, update_recv) = mpsc::unbounded_channel();
        let shared = Shared {
            state: MonitorState::Idle,
            snapshot: None,
            loading: false,
            current: 0,
            updates,
        };
        let monitor = Self {
            source,
            config,
            shared: Arc::new(Mutex::new(shared)),
            session: None,
            last_id: 0,
        };
        (monitor, update_recv)
    }

    /// Begins polling, cancelling the running session first if there is
    /// one. Clears the published snapshot and returns the new session id.
    pub fn start(&mut self) -> u64 {
        self.last_id += 1;
        let id = self.last_id;
        let previous = self.session.take();
        {
            let mut shared = lock(&self.shared);
            if let Some(previous) = &previous {
                log::info!("Restarting progress polling, cancelling session {}", previous.id);
            }
            shared.current = id;
            shared.state = MonitorState::Polling;
            shared.snapshot = None;
            shared.loading = true;
            shared.emit(id, UpdateKind::Started);
        }
        drop(previous);
        let handle = tokio::spawn(poll(
            self.source.clone(),
            self.shared.clone(),
            id,
            self.config,
        ));
        self.session = Some(PollSession::new(id, handle));
        log::info!(
            "Polling download progress every {:?}, session {}",
            self.config.interval,
            id
        );
        id
    }
}

impl<S> ProgressMonitor<S> {
    /// Cancels the active session, if any, and returns to `Idle`.
    pub fn stop(&mut self) {
        let session = self.session.take();
        let mut shared = lock(&self.shared);
        shared.current = 0;
        let was_polling = shared.state == MonitorState::Polling;
        shared.state = MonitorState::Idle;
        shared.snapshot = None;
        shared.loading = false;
        if let (true, Some(session)) = (was_polling, &session) {
            log::info!("Stopping poll session {}", session.id);
            shared.emit(session.id, UpdateKind::Stopped);
        }
        drop(shared);
        drop(session);
    }

    pub fn state(&self) -> MonitorState {
        lock(&self.shared).state
    }

    /// Last published progress, cleared on restart and on termination.
    pub fn snapshot(&self) -> Option<DownloadProgress> {
        lock(&self.shared).snapshot.clone()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.shared).loading
    }

    /// Id of the session that is currently polling.
    pub fn session_id(&self) -> Option<u64> {
        let shared = lock(&self.shared);
        match shared.state {
            MonitorState::Polling => Some(shared.current),
            _ => None,
        }
    }
}

impl<S> Drop for ProgressMonitor<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll<S>(source: Arc<S>, shared: Arc<Mutex<Shared>>, session: u64, config: MonitorConfig)
where
    S: ProgressSource + Send + Sync + ?Sized,
{
    let period = config.interval.max(MIN_INTERVAL);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    // a slow read pushes the schedule back instead of bursting afterwards
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;
    loop {
        ticker.tick().await;
        let result = source.fetch_progress().await;
        let flow = apply_tick(
            &shared,
            session,
            result,
            &mut failures,
            config.max_consecutive_failures,
        );
        if flow == Flow::Stop {
            break;
        }
    }
    log::debug!("Poll session {} ended", session);
}

fn apply_tick(
    shared: &Mutex<Shared>,
    session: u64,
    result: Result<Option<DownloadProgress>>,
    failures: &mut u32,
    limit: Option<u32>,
) -> Flow {
    let mut shared = lock(shared);
    if shared.current != session || shared.state != MonitorState::Polling {
        log::debug!("Discarding tick of inactive poll session {}", session);
        return Flow::Stop;
    }
    match result {
        Ok(None) => {
            *failures = 0;
            log::debug!("No download reported, waiting for the next tick");
            Flow::Continue
        }
        Ok(Some(progress)) => {
            *failures = 0;
            log::debug!("Progress: {:?}", progress);
            shared.observe(session, progress)
        }
        Err(Error::Malformed(e)) => {
            *failures = 0;
            log::warn!("Skipping unreadable progress payload: {}", e);
            Flow::Continue
        }
        Err(Error::Transport(e)) => {
            *failures += 1;
            log::warn!(
                "Polling download progress failed ({} in a row): {}",
                failures,
                e
            );
            match limit {
                Some(limit) if *failures >= limit => {
                    log::error!(
                        "Giving up on download progress after {} failed polls",
                        failures
                    );
                    shared.terminate(session, Outcome::Unreachable);
                    Flow::Stop
                }
                _ => Flow::Continue,
            }
        }
    }
}
