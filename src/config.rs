use std::path::{Path, PathBuf};

use crate::content::ContentRegistry;
use crate::error::Result;
use crate::renderer::FileSprites;
use crate::service::PreviewService;

pub fn default_socket_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mindustry-preview")
        .join("daemon.sock")
}

/// Where game assets and the daemon socket live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewConfig {
    /// Holds `content.json` and `images/`
    pub assets_dir: PathBuf,
    pub content_path: PathBuf,
    pub socket_path: PathBuf,
}

impl PreviewConfig {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        let assets_dir = assets_dir.into();
        Self {
            content_path: assets_dir.join("content.json"),
            socket_path: default_socket_path(),
            assets_dir,
        }
    }

    pub fn with_content(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.content_path = path;
        }
        self
    }

    pub fn with_socket(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.socket_path = path;
        }
        self
    }

    pub fn sprites_dir(&self) -> PathBuf {
        self.assets_dir.join("images")
    }

    pub fn build_service(&self) -> Result<PreviewService> {
        let content = ContentRegistry::load(&self.content_path)?;
        let sprites = FileSprites::new(self.sprites_dir());
        tracing::info!(
            content = %self.content_path.display(),
            blocks = content.blocks().len(),
            sprites = %sprites.root().display(),
            "preview service ready"
        );
        Ok(PreviewService::new(Box::new(content), Box::new(sprites)))
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self::new(Path::new("assets"))
    }
}
