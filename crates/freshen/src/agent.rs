//! The supervising object: RPC registry, OTA state and session.

use std::thread;
use std::time::Duration;

use freshen_rpc::{RpcContext, SharedOta};
use tracing::{info, warn};

use crate::session::{PollOutcome, Session, SessionEvent};
use crate::transport::TransportError;

/// Pause between polls while no connection is possible.
const IDLE_PAUSE: Duration = Duration::from_millis(200);

pub struct Agent {
    rpc: RpcContext,
    ota: SharedOta,
    session: Session,
}

impl Agent {
    /// `rpc` should already carry the built-in methods bound to `ota`.
    pub fn new(rpc: RpcContext, ota: SharedOta, session: Session) -> Self {
        Self { rpc, ota, session }
    }

    pub fn rpc_mut(&mut self) -> &mut RpcContext {
        &mut self.rpc
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// One session step. Commits a freshly installed image once the first
    /// frame of a connection has been handled.
    pub fn poll(&mut self) -> PollOutcome {
        let ota = &self.ota;
        self.session.poll(&mut self.rpc, &mut |event| match event {
            SessionEvent::FirstExchange => {
                if let Err(e) = ota.borrow_mut().commit() {
                    warn!(error = %e, "commit failed");
                }
            }
            SessionEvent::Connected => info!("connected"),
            SessionEvent::Disconnected => info!("disconnected"),
        })
    }

    /// Pushes an unsolicited frame to the dashboard. See [`Session::notify`].
    pub fn notify(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        self.session.notify(frame)
    }

    /// Polls until `keep_running` returns false, then closes the session.
    pub fn run_while(&mut self, mut keep_running: impl FnMut() -> bool) {
        while keep_running() {
            match self.poll() {
                PollOutcome::Backoff | PollOutcome::Disconnected => thread::sleep(IDLE_PAUSE),
                PollOutcome::Pending | PollOutcome::Idle | PollOutcome::Exchanged(_) => {}
            }
        }
        self.session.close();
    }
}
