//! Over-the-air update state machine.
//!
//! ```text
//! idle --begin--> writing --write*--> writing --end(true)--> boot target set, restart
//!                                            \--end(false)-> idle (target discarded)
//! ```
//!
//! Before restarting into a new image, the running image's id is persisted
//! under [`ROLLBACK_KEY`]. The new image finds the marker in [`Ota::init`],
//! clears it and points the next boot back at the old image; only
//! [`Ota::commit`] makes the new image permanent.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use thiserror::Error;
use tracing::{info, warn};

use crate::platform::{ImageId, KvError, KvStore, OtaPlatform};

/// Key-value key holding the image to fall back to.
pub const ROLLBACK_KEY: &str = "__rollback";

#[derive(Debug, Error)]
pub enum OtaError {
    #[error("an update is already in progress")]
    Busy,
    #[error("no update in progress")]
    NotStarted,
    #[error("new image did not confirm itself")]
    NotConfirmed,
    #[error("OTA platform error: {0}")]
    Platform(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Kv(#[from] KvError),
}

/// OTA state shared between the OTA methods and the agent's commit hook.
pub type SharedOta = Rc<RefCell<Ota>>;

pub struct Ota {
    platform: Box<dyn OtaPlatform>,
    kv: Box<dyn KvStore>,
    can_rollback: bool,
    target: Option<ImageId>,
}

impl Ota {
    pub fn new(platform: Box<dyn OtaPlatform>, kv: Box<dyn KvStore>) -> Self {
        Self {
            platform,
            kv,
            can_rollback: false,
            target: None,
        }
    }

    pub fn into_shared(self) -> SharedOta {
        Rc::new(RefCell::new(self))
    }

    /// Arms rollback when this boot follows a successful update.
    pub fn init(&mut self) -> Result<(), OtaError> {
        let Some(previous) = self.kv.get(ROLLBACK_KEY) else {
            return Ok(());
        };
        info!(%previous, "booted a fresh image, rollback armed");
        self.platform.set_boot_image(&previous)?;
        self.kv.set(ROLLBACK_KEY, None)?;
        self.can_rollback = true;
        Ok(())
    }

    pub fn can_rollback(&self) -> bool {
        self.can_rollback
    }

    pub fn in_progress(&self) -> bool {
        self.target.is_some()
    }

    pub fn begin(&mut self) -> Result<(), OtaError> {
        if self.target.is_some() {
            return Err(OtaError::Busy);
        }
        let target = self.platform.begin()?;
        info!(%target, "update started");
        self.target = Some(target);
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), OtaError> {
        if self.target.is_none() {
            return Err(OtaError::NotStarted);
        }
        self.platform.write(data)
    }

    /// Finalizes or discards the update.
    ///
    /// On success this restarts into the new image. If the platform comes
    /// back from a failed restart, the marker is cleared, the running image
    /// is selected again and the error is returned.
    pub fn end(&mut self, success: bool) -> Result<(), OtaError> {
        let target = self.target.take().ok_or(OtaError::NotStarted)?;
        self.platform.finish(&target, success)?;
        if !success {
            info!(%target, "update discarded");
            return Ok(());
        }

        let running = self.platform.running_image();
        self.kv.set(ROLLBACK_KEY, Some(&running))?;
        self.platform.set_boot_image(&target)?;
        info!(%target, %running, "update finalized, restarting");

        if let Err(e) = self.platform.restart() {
            warn!(error = %e, %running, "new image failed, keeping the running image");
            self.kv.set(ROLLBACK_KEY, None)?;
            self.platform.set_boot_image(&running)?;
            return Err(e);
        }
        Ok(())
    }

    /// Cancels a pending rollback once the running image proved itself.
    pub fn commit(&mut self) -> Result<(), OtaError> {
        if !self.can_rollback {
            return Ok(());
        }
        self.platform.mark_valid()?;
        self.can_rollback = false;
        info!(image = %self.platform.running_image(), "image committed");
        Ok(())
    }
}
