//! Dial surface - the host-side handle a rendered frame is pushed to
//!
//! Hosts disagree on the shape of the image call: some take the data URL
//! directly, others want it wrapped as `{"image": "..."}`. Pushing walks an
//! ordered list of strategies and stops at the first one the host accepts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::dial::image::Frame;

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Host rejected payload: {0}")]
    Rejected(String),

    #[error("Host disconnected")]
    Disconnected,

    #[error("Invalid image data URL")]
    InvalidDataUrl,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Image payload in one of the two calling conventions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Bare data URL
    Raw(String),
    /// `{"image": "<data URL>"}`
    Wrapped { image: String },
}

impl ImagePayload {
    pub fn data_url(&self) -> &str {
        match self {
            ImagePayload::Raw(url) => url,
            ImagePayload::Wrapped { image } => image,
        }
    }
}

/// How to shape an image push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStrategy {
    Raw,
    Wrapped,
}

impl PushStrategy {
    pub fn payload(self, data_url: &str) -> ImagePayload {
        match self {
            PushStrategy::Raw => ImagePayload::Raw(data_url.to_string()),
            PushStrategy::Wrapped => ImagePayload::Wrapped {
                image: data_url.to_string(),
            },
        }
    }
}

/// Strategies tried in order for every image push
pub const IMAGE_PUSH_STRATEGIES: [PushStrategy; 2] = [PushStrategy::Raw, PushStrategy::Wrapped];

/// Host handle for one visible dial action
#[async_trait]
pub trait DialSurface: Send + Sync {
    /// Opaque identifier of the action instance (for logs)
    fn id(&self) -> &str;

    async fn set_image(&self, payload: ImagePayload) -> Result<(), SurfaceError>;

    async fn set_title(&self, title: &str) -> Result<(), SurfaceError>;
}

/// Outcome of pushing one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    /// Strategy the host accepted, if any
    pub image: Option<PushStrategy>,
    pub title: bool,
}

/// Push image and title independently; neither failure blocks the other.
pub async fn push_frame(surface: &dyn DialSurface, frame: &Frame) -> PushOutcome {
    let data_url = frame.data_url();

    let mut image = None;
    let mut last_error = None;
    for strategy in IMAGE_PUSH_STRATEGIES {
        match surface.set_image(strategy.payload(&data_url)).await {
            Ok(()) => {
                image = Some(strategy);
                break;
            }
            Err(e) => {
                tracing::debug!("{}: {:?} image push failed: {}", surface.id(), strategy, e);
                last_error = Some(e);
            }
        }
    }
    if image.is_none() {
        if let Some(e) = last_error {
            tracing::warn!("{}: failed to push image: {}", surface.id(), e);
        }
    }

    let title = match surface.set_title(&frame.title).await {
        Ok(()) => true,
        Err(e) => {
            tracing::trace!("{}: title push failed: {}", surface.id(), e);
            false
        }
    };

    PushOutcome { image, title }
}

/// Decode a `data:image/png;base64,...` URL into raw bytes
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, SurfaceError> {
    let (header, body) = url.split_once(',').ok_or(SurfaceError::InvalidDataUrl)?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(SurfaceError::InvalidDataUrl);
    }
    STANDARD.decode(body).map_err(|_| SurfaceError::InvalidDataUrl)
}

/// Surface that writes each frame to `<dir>/<id>.png` and `<dir>/<id>.title`
#[derive(Debug, Clone)]
pub struct DirectorySurface {
    id: String,
    dir: PathBuf,
}

impl DirectorySurface {
    pub fn new(id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            dir: dir.into(),
        }
    }

    pub fn image_path(&self) -> PathBuf {
        self.dir.join(format!("{}.png", self.id))
    }

    pub fn title_path(&self) -> PathBuf {
        self.dir.join(format!("{}.title", self.id))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), SurfaceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl DialSurface for DirectorySurface {
    fn id(&self) -> &str {
        &self.id
    }

    async fn set_image(&self, payload: ImagePayload) -> Result<(), SurfaceError> {
        let png = decode_data_url(payload.data_url())?;
        self.write(&self.image_path(), &png).await
    }

    async fn set_title(&self, title: &str) -> Result<(), SurfaceError> {
        self.write(&self.title_path(), title.as_bytes()).await
    }
}
