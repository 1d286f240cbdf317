use tokio::task::JoinHandle;

/// The poll task of one `start()` call. Dropping the session aborts the
/// task, a bare `JoinHandle` would only detach it.
#[derive(Debug)]
pub struct PollSession {
    pub id: u64,
    handle: JoinHandle<()>,
}

impl PollSession {
    pub(super) fn new(id: u64, handle: JoinHandle<()>) -> Self {
        Self { id, handle }
    }
}

impl Drop for PollSession {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
