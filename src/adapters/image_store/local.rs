use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use tokio::fs;
use tracing::{debug, warn};

use crate::ports::image_store::{Error, ImageStorePort};

/// Image store keeping blobs as files below a single root directory
///
/// References are the relative file names. Names that would resolve outside the root are
/// rejected.
#[derive(Clone, Debug)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, Error> {
        let relative = Path::new(name);
        let mut components = relative.components().peekable();
        if components.peek().is_none()
            || !components.all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(Error::InvalidName(name.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl ImageStorePort for LocalImageStore {
    async fn exists(&self, reference: &str) -> Result<bool, Error> {
        let path = self.resolve(reference)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn save(&self, name: &str, content: &[u8]) -> Result<String, Error> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, content).await?;
        debug!(path = %path.display(), bytes = content.len(), "stored image");

        Ok(name.to_string())
    }

    async fn delete(&self, reference: &str) -> Result<(), Error> {
        let path = self.resolve(reference)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed image");
                Ok(())
            }
            // Nothing left to clean up
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "image was already removed");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Adapter(Box::new(err))
    }
}
