//! In-memory capability implementations, for tests and simulators.

use std::collections::{BTreeMap, HashMap};
use std::io;

use crate::ota::OtaError;
use crate::platform::{FileSystem, ImageId, KvError, KvStore, OtaPlatform};

#[derive(Debug, Default, Clone)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Option<&str>) -> Result<(), KvError> {
        match value {
            Some(v) => self.entries.insert(key.to_string(), v.to_string()),
            None => self.entries.remove(key),
        };
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryFs {
    pub files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{name}: no such file"))
}

impl FileSystem for MemoryFs {
    fn list(&mut self) -> io::Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        self.files.remove(name).map(|_| ()).ok_or_else(|| not_found(name))
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        let data = self.files.remove(from).ok_or_else(|| not_found(from))?;
        self.files.insert(to.to_string(), data);
        Ok(())
    }

    fn read_chunk(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> io::Result<(usize, u64)> {
        let data = self.files.get(name).ok_or_else(|| not_found(name))?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok((n, data.len() as u64))
    }

    fn write_chunk(&mut self, name: &str, data: &[u8], append: bool) -> io::Result<usize> {
        let file = self.files.entry(name.to_string()).or_default();
        if !append {
            file.clear();
        }
        file.extend_from_slice(data);
        Ok(data.len())
    }
}

/// Two-slot update platform in the style of an `ota_0`/`ota_1` flash layout.
#[derive(Debug, Clone)]
pub struct MemoryOta {
    pub running: ImageId,
    pub boot: ImageId,
    pub images: BTreeMap<ImageId, Vec<u8>>,
    pub staging: Option<Vec<u8>>,
    pub restarts: usize,
    /// Makes `restart` report that the new image never confirmed.
    pub fail_restart: bool,
}

impl Default for MemoryOta {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOta {
    pub fn new() -> Self {
        Self {
            running: "ota_0".to_string(),
            boot: "ota_0".to_string(),
            images: BTreeMap::new(),
            staging: None,
            restarts: 0,
            fail_restart: false,
        }
    }

    fn spare_slot(&self) -> ImageId {
        if self.running == "ota_0" { "ota_1" } else { "ota_0" }.to_string()
    }
}

impl OtaPlatform for MemoryOta {
    fn running_image(&self) -> ImageId {
        self.running.clone()
    }

    fn begin(&mut self) -> Result<ImageId, OtaError> {
        self.staging = Some(Vec::new());
        Ok(self.spare_slot())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), OtaError> {
        self.staging
            .as_mut()
            .ok_or(OtaError::NotStarted)?
            .extend_from_slice(data);
        Ok(())
    }

    fn finish(&mut self, target: &ImageId, success: bool) -> Result<(), OtaError> {
        let image = self.staging.take().ok_or(OtaError::NotStarted)?;
        if success {
            self.images.insert(target.clone(), image);
        }
        Ok(())
    }

    fn set_boot_image(&mut self, image: &ImageId) -> Result<(), OtaError> {
        self.boot = image.clone();
        Ok(())
    }

    fn restart(&mut self) -> Result<(), OtaError> {
        if self.fail_restart {
            return Err(OtaError::NotConfirmed);
        }
        self.restarts += 1;
        Ok(())
    }
}
