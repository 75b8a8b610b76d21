//! Executable-swapping update platform.
//!
//! The running executable is the current image. An update is staged in
//! `<state_dir>/update.bin`; the boot pointer lives in `<state_dir>/boot`.
//! `restart` launches the staged binary with the same arguments and waits
//! for it to confirm itself: the new process commits after its first
//! exchange with the dashboard, which points the boot file at its own path.
//! A confirmed image replaces the old executable and this process stays
//! behind only to forward the child's exit status.

use std::env;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{self, Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use freshen_rpc::{ImageId, OtaError, OtaPlatform};
use tracing::{info, warn};

pub const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(10);
const SUPERVISE_INTERVAL: Duration = Duration::from_millis(100);

pub struct HostOta {
    exe: PathBuf,
    args: Vec<OsString>,
    staging: PathBuf,
    boot_file: PathBuf,
    commit_timeout: Duration,
    writer: Option<BufWriter<File>>,
}

fn image_id(path: &Path) -> ImageId {
    path.to_string_lossy().into_owned()
}

impl HostOta {
    /// Uses the current executable and arguments. Creates `state_dir`.
    pub fn new(state_dir: impl AsRef<Path>) -> io::Result<Self> {
        let exe = env::current_exe()?;
        let args = env::args_os().skip(1).collect();
        Self::with_executable(state_dir, exe, args)
    }

    pub fn with_executable(
        state_dir: impl AsRef<Path>,
        exe: PathBuf,
        args: Vec<OsString>,
    ) -> io::Result<Self> {
        let state_dir = state_dir.as_ref();
        fs::create_dir_all(state_dir)?;
        Ok(Self {
            exe,
            args,
            staging: state_dir.join("update.bin"),
            boot_file: state_dir.join("boot"),
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
            writer: None,
        })
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = timeout;
        self
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    /// Current content of the boot pointer.
    pub fn boot_image(&self) -> Option<ImageId> {
        fs::read_to_string(&self.boot_file).ok()
    }

    /// Runs the staged image until it confirms itself, then installs it
    /// over the current executable and waits for it to exit.
    ///
    /// Fails, after removing the staged image and restoring the boot
    /// pointer, when the child exits first or the commit timeout passes.
    pub fn supervise(&mut self) -> Result<ExitStatus, OtaError> {
        let running = self.running_image();
        let staged = image_id(&self.staging);
        make_executable(&self.staging)?;
        self.set_boot_image(&running)?;

        info!(image = %staged, "starting new image");
        let mut child = Command::new(&self.staging).args(&self.args).spawn()?;
        let started = Instant::now();
        loop {
            if self.boot_image().as_deref() == Some(staged.as_str()) {
                break;
            }
            if let Some(status) = child.try_wait()? {
                self.discard(&running)?;
                return Err(OtaError::Platform(format!("new image exited early: {status}")));
            }
            if started.elapsed() >= self.commit_timeout {
                kill(&mut child);
                self.discard(&running)?;
                return Err(OtaError::NotConfirmed);
            }
            thread::sleep(SUPERVISE_INTERVAL);
        }

        info!(image = %staged, exe = %running, "new image confirmed, installing");
        fs::rename(&self.staging, &self.exe)?;
        self.set_boot_image(&running)?;
        Ok(child.wait()?)
    }

    fn discard(&mut self, running: &ImageId) -> Result<(), OtaError> {
        warn!(image = %image_id(&self.staging), "new image did not confirm, discarding");
        remove_if_exists(&self.staging)?;
        self.set_boot_image(running)
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(error = %e, "failed to stop new image");
    }
    let _ = child.wait();
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

impl OtaPlatform for HostOta {
    fn running_image(&self) -> ImageId {
        image_id(&self.exe)
    }

    fn begin(&mut self) -> Result<ImageId, OtaError> {
        self.writer = Some(BufWriter::new(File::create(&self.staging)?));
        Ok(image_id(&self.staging))
    }

    fn write(&mut self, data: &[u8]) -> Result<(), OtaError> {
        let writer = self.writer.as_mut().ok_or(OtaError::NotStarted)?;
        writer.write_all(data)?;
        Ok(())
    }

    fn finish(&mut self, _target: &ImageId, success: bool) -> Result<(), OtaError> {
        let mut writer = self.writer.take().ok_or(OtaError::NotStarted)?;
        writer.flush()?;
        drop(writer);
        if !success {
            remove_if_exists(&self.staging)?;
        }
        Ok(())
    }

    fn set_boot_image(&mut self, image: &ImageId) -> Result<(), OtaError> {
        fs::write(&self.boot_file, image)?;
        Ok(())
    }

    fn restart(&mut self) -> Result<(), OtaError> {
        let status = self.supervise()?;
        info!(%status, "new image exited");
        process::exit(status.code().unwrap_or(1));
    }
}
