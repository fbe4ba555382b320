//! Local-filesystem implementation of [`Endpoint`].

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::{Endpoint, EndpointError};

/// An [`Endpoint`] rooted at a local directory.
///
/// Relative endpoint paths are resolved under the root, which keeps rule
/// configuration portable between a local tree and a remote home directory.
/// Used for file-to-file rules and as the endpoint in tests.
#[derive(Debug)]
pub struct LocalEndpoint {
    root: PathBuf,
}

impl LocalEndpoint {
    /// Creates an endpoint rooted at `root`. The root is not required to
    /// exist yet; directories are created on demand by `mkdirs`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let relative = Path::new(path);
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }
}

impl Endpoint for LocalEndpoint {
    fn list(&self, dir: &str) -> Result<Vec<String>, EndpointError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.resolve(dir))? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_owned());
                }
            }
        }
        Ok(names)
    }

    fn rename(&self, src: &str, dst: &str) -> Result<(), EndpointError> {
        fs::rename(self.resolve(src), self.resolve(dst))?;
        Ok(())
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, EndpointError> {
        let file = fs::File::open(self.resolve(path))?;
        Ok(Box::new(file))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn Write + Send>, EndpointError> {
        let file = fs::File::create(self.resolve(path))?;
        Ok(Box::new(file))
    }

    fn exists(&self, path: &str) -> Result<bool, EndpointError> {
        Ok(self.resolve(path).exists())
    }

    fn mkdirs(&self, dir: &str) -> Result<(), EndpointError> {
        fs::create_dir_all(self.resolve(dir))?;
        Ok(())
    }

    fn probe(&self) -> Result<(), EndpointError> {
        fs::metadata(&self.root)?;
        Ok(())
    }
}
