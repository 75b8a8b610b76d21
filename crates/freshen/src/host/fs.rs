use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use freshen_rpc::FileSystem;

/// File system rooted at one directory. Names are single path components
/// and only regular files are visible; directories and symlinks under the
/// root are left alone.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    /// Creates `root` if needed.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> io::Result<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file name {name:?}"),
            ));
        }
        Ok(self.root.join(name))
    }

    /// Path of an existing regular file.
    fn existing(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.path(name)?;
        if fs::symlink_metadata(&path)?.is_file() {
            Ok(path)
        } else {
            Err(not_regular(name))
        }
    }

    /// Path that is either free or a regular file.
    fn writable(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.path(name)?;
        match fs::symlink_metadata(&path) {
            Ok(meta) if !meta.is_file() => Err(not_regular(name)),
            Ok(_) => Ok(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(path),
            Err(e) => Err(e),
        }
    }
}

fn not_regular(name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("{name:?} is not a regular file"),
    )
}

impl FileSystem for DirFs {
    fn list(&mut self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        fs::remove_file(self.existing(name)?)
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.existing(from)?, self.writable(to)?)
    }

    fn read_chunk(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> io::Result<(usize, u64)> {
        let mut file = File::open(self.existing(name)?)?;
        let size = file.metadata()?.len();
        file.seek(SeekFrom::Start(offset))?;
        let mut n = 0;
        while n < buf.len() {
            match file.read(&mut buf[n..])? {
                0 => break,
                read => n += read,
            }
        }
        Ok((n, size))
    }

    fn write_chunk(&mut self, name: &str, data: &[u8], append: bool) -> io::Result<usize> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(self.writable(name)?)?;
        file.write_all(data)?;
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = DirFs::new(dir.path()).unwrap();
        assert_eq!(fs.write_chunk("a.txt", b"hello ", false).unwrap(), 6);
        fs.write_chunk("a.txt", b"world", true).unwrap();
        fs.write_chunk("b.txt", b"x", false).unwrap();
        assert_eq!(fs.list().unwrap(), ["a.txt", "b.txt"]);

        let mut buf = [0u8; 3];
        assert_eq!(fs.read_chunk("a.txt", 6, &mut buf).unwrap(), (3, 11));
        assert_eq!(&buf, b"wor");
        assert_eq!(fs.read_chunk("a.txt", 20, &mut buf).unwrap(), (0, 11));

        fs.write_chunk("a.txt", b"new", false).unwrap();
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"new");
    }

    #[test]
    fn test_remove_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = DirFs::new(dir.path()).unwrap();
        fs.write_chunk("one", b"1", false).unwrap();
        fs.rename("one", "two").unwrap();
        assert_eq!(fs.list().unwrap(), ["two"]);
        fs.remove("two").unwrap();
        assert!(fs.list().unwrap().is_empty());
        assert!(fs.remove("two").is_err());
    }

    #[test]
    fn test_rejects_path_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = DirFs::new(dir.path().join("root")).unwrap();
        fs::write(dir.path().join("secret"), b"s").unwrap();

        let mut buf = [0u8; 8];
        for name in ["../secret", "..", ".", "", "sub/file", "..\\secret"] {
            let err = fs.read_chunk(name, 0, &mut buf).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{name:?}");
        }
        assert!(fs.write_chunk("../escape", b"x", false).is_err());
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn test_directories_are_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = DirFs::new(dir.path()).unwrap();
        let state = dir.path().join(".freshen");
        fs::create_dir(&state).unwrap();
        fs::write(state.join("kv.json"), b"{}").unwrap();
        fs.write_chunk("a.txt", b"a", false).unwrap();

        assert_eq!(fs.list().unwrap(), ["a.txt"]);
        let mut buf = [0u8; 4];
        for err in [
            fs.rename(".freshen", "moved").unwrap_err(),
            fs.rename("a.txt", ".freshen").unwrap_err(),
            fs.remove(".freshen").unwrap_err(),
            fs.read_chunk(".freshen", 0, &mut buf).unwrap_err(),
            fs.write_chunk(".freshen", b"x", true).unwrap_err(),
        ] {
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        }
        assert!(state.join("kv.json").is_file());
        assert!(!dir.path().join("moved").exists());
        assert_eq!(fs.list().unwrap(), ["a.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = DirFs::new(dir.path().join("root")).unwrap();
        let secret = dir.path().join("secret");
        fs::write(&secret, b"s").unwrap();
        std::os::unix::fs::symlink(&secret, dir.path().join("root/link")).unwrap();

        assert!(fs.list().unwrap().is_empty());
        let mut buf = [0u8; 4];
        assert!(fs.read_chunk("link", 0, &mut buf).is_err());
        assert!(fs.write_chunk("link", b"x", false).is_err());
        assert_eq!(fs::read(&secret).unwrap(), b"s");
    }
}
