//! input materialization & temp file hygiene
use crate::error::Error;
use std::{
    fmt,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::io::{AsyncRead, AsyncWriteExt};

/// A conversion input source.
///
/// The spawned executable needs a filesystem path, so buffers and readers
/// are fully drained into a uniquely named temporary file before spawn and
/// removed again on every terminal transition.
pub enum Input {
    Path(PathBuf),
    Buffer(Vec<u8>),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl Input {
    /// Token used in a rendered argument vector when the source has not
    /// been materialized to a path.
    pub(crate) fn token(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Buffer(_) | Self::Reader(_) => "pipe:0".to_owned(),
        }
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::Path(PathBuf::new())
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Buffer(buf) => f.debug_tuple("Buffer").field(&buf.len()).finish(),
            Self::Reader(_) => f.debug_tuple("Reader").finish(),
        }
    }
}

impl From<PathBuf> for Input {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for Input {
    fn from(path: &Path) -> Self {
        Self::Path(path.into())
    }
}

impl From<&str> for Input {
    fn from(path: &str) -> Self {
        Self::Path(path.into())
    }
}

impl From<Vec<u8>> for Input {
    fn from(buf: Vec<u8>) -> Self {
        Self::Buffer(buf)
    }
}

/// An input source resolved to a path the executable can open.
#[derive(Debug)]
pub(crate) struct PreparedInput {
    pub path: PathBuf,
    /// The path is a materialized temp file owned by this conversion.
    pub temp: bool,
}

impl PreparedInput {
    pub fn temp_path(&self) -> Option<PathBuf> {
        self.temp.then(|| self.path.clone())
    }
}

/// Resolve an [`Input`] to a filesystem path, draining buffer/reader
/// sources into a temp file.
pub(crate) async fn prepare(input: Input) -> Result<PreparedInput, Error> {
    match input {
        Input::Path(path) => Ok(PreparedInput { path, temp: false }),
        Input::Buffer(buf) => {
            let path = temp_path();
            tokio::fs::write(&path, &buf).await.map_err(|err| {
                Error::InvalidInput {
                    reason: format!("writing buffer to {}: {err}", path.display()),
                }
            })?;
            Ok(PreparedInput { path, temp: true })
        }
        Input::Reader(mut reader) => {
            let path = temp_path();
            let drain = async {
                let mut file = tokio::fs::File::create(&path).await?;
                tokio::io::copy(&mut reader, &mut file).await?;
                file.flush().await
            };
            if let Err(err) = drain.await {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(Error::InvalidInput {
                    reason: format!("draining reader to {}: {err}", path.display()),
                });
            }
            Ok(PreparedInput { path, temp: true })
        }
    }
}

/// Remove a materialized temp input. Idempotent.
pub(crate) async fn cleanup(temp: &Option<PathBuf>) {
    if let Some(path) = temp {
        let _ = tokio::fs::remove_file(path).await;
    }
}

/// Unique per invocation so concurrent batch items never collide.
fn temp_path() -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("ffpilot-{stamp}-{:08x}.tmp", fastrand::u32(..)))
}
