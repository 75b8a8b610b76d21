use std::fs;
use std::io;
use std::path::PathBuf;

use freshen_rpc::{KvError, KvStore};
use serde_json::{Map, Value};

/// Key-value store persisted as one JSON object.
///
/// Every `set` rewrites the file through a temporary sibling and a rename.
#[derive(Debug)]
pub struct JsonFileKv {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl JsonFileKv {
    /// Loads `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, KvError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err(KvError::Corrupt(format!("{} is not an object", path.display()))),
                Err(e) => return Err(KvError::Corrupt(format!("{}: {e}", path.display()))),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    fn persist(&self) -> Result<(), KvError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let bytes = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| KvError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvStore for JsonFileKv {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key)?.as_str().map(str::to_string)
    }

    fn set(&mut self, key: &str, value: Option<&str>) -> Result<(), KvError> {
        match value {
            Some(v) => self.entries.insert(key.to_string(), Value::String(v.to_string())),
            None => self.entries.remove(key),
        };
        self.persist()
    }
}
