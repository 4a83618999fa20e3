//! LocalStation - ディレクトリを使った TransactionStation
//!
//! Each push lands in its own directory, `<root>/<ulid>/<name>`, so two
//! exports with the same file name never collide and the relative path
//! doubles as the station key.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::domain::errors::StationError;
use crate::domain::resource::StationResource;
use crate::ports::TransactionStation;

const FALLBACK_NAME: &str = "resource";

pub struct LocalStation {
    root: PathBuf,
    base_url: Option<String>,
}

impl LocalStation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    /// Hand out `<base_url>/<relative path>` instead of the bare path.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Delete every pushed resource older than `max_age`.
    /// Returns the number of resources removed.
    pub fn purge_older_than(&self, max_age: Duration) -> Result<usize, StationError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut purged = 0;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let modified = entry.metadata()?.modified()?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age < max_age {
                continue;
            }

            match fs::remove_dir_all(&path) {
                Ok(()) => purged += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "failed to purge station entry"),
            }
        }

        if purged > 0 {
            info!(purged, root = %self.root.display(), "purged station entries");
        }
        Ok(purged)
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StationError> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StationError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl TransactionStation for LocalStation {
    fn pull(&self, key: &str) -> Result<Box<dyn Read + Send>, StationError> {
        let path = self.resolve(key)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StationError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn push(&self, mut resource: StationResource) -> Result<String, StationError> {
        let name = Path::new(&resource.name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_NAME.to_string());
        let dir = Ulid::new().to_string();

        let target_dir = self.root.join(&dir);
        fs::create_dir_all(&target_dir)?;
        let mut file = File::create(target_dir.join(&name))?;
        let bytes = io::copy(&mut resource.data, &mut file)?;

        let key = format!("{dir}/{name}");
        debug!(station_path = %key, bytes, language = %resource.language, "pushed resource");
        Ok(key)
    }

    fn delete(&self, key: &str) -> Result<(), StationError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StationError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        // the per-push directory is empty now
        if let Some(parent) = path.parent()
            && parent != self.root
        {
            let _ = fs::remove_dir(parent);
        }
        Ok(())
    }

    fn wrap_access_url(&self, relative_path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/{relative_path}"),
            None => relative_path.to_string(),
        }
    }
}
