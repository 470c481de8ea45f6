//! Storage provider abstraction.
//!
//! Paths are `/`-separated strings relative to the provider's root, the way
//! an SD card filesystem addresses files.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

/// File operations needed by the section cache.
pub trait Storage {
    /// Seekable byte stream
    type File: Read + Write + Seek;

    /// Open an existing file for reading
    fn open_read(&self, path: &str) -> io::Result<Self::File>;

    /// Create or truncate a file for writing; the handle must also read and seek
    fn open_write(&self, path: &str) -> io::Result<Self::File>;

    /// Whether a file or directory exists
    fn exists(&self, path: &str) -> bool;

    /// Delete a file
    fn remove(&self, path: &str) -> io::Result<()>;

    /// Create a directory and any missing parents
    fn mkdir(&self, path: &str) -> io::Result<()>;
}

/// Storage backed by a directory on the host filesystem.
#[derive(Clone, Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Provider rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        for part in path.split('/').filter(|p| !p.is_empty() && *p != ".") {
            full.push(part);
        }
        full
    }
}

impl Storage for FsStorage {
    type File = File;

    fn open_read(&self, path: &str) -> io::Result<File> {
        File::open(self.resolve(path))
    }

    fn open_write(&self, path: &str) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.resolve(path))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.resolve(path))
    }

    fn mkdir(&self, path: &str) -> io::Result<()> {
        fs::create_dir_all(self.resolve(path))
    }
}

impl<S: Storage + ?Sized> Storage for &S {
    type File = S::File;

    fn open_read(&self, path: &str) -> io::Result<Self::File> {
        (**self).open_read(path)
    }

    fn open_write(&self, path: &str) -> io::Result<Self::File> {
        (**self).open_write(path)
    }

    fn exists(&self, path: &str) -> bool {
        (**self).exists(path)
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        (**self).remove(path)
    }

    fn mkdir(&self, path: &str) -> io::Result<()> {
        (**self).mkdir(path)
    }
}

/// Join path segments with `/`
pub fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        return name.to_string();
    }
    let mut out = String::with_capacity(base.len() + name.len() + 1);
    out.push_str(base.trim_end_matches('/'));
    out.push('/');
    out.push_str(name.trim_start_matches('/'));
    out
}
