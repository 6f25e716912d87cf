use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;

pub type Region = Arc<RgbaImage>;

/// Named sprite regions used by the schematic visual passes
pub trait SpriteProvider: Send {
    fn region(&mut self, name: &str) -> Option<Region>;

    /// Drop anything cached for the request that just finished
    fn reset(&mut self);
}

/// Sprites stored one PNG per region under `<root>/<name>.png`, spaces in
/// names replaced by underscores.
pub struct FileSprites {
    root: PathBuf,
    cache: HashMap<String, Option<Region>>,
}

impl FileSprites {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), cache: HashMap::new() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.png", name.replace(' ', "_")))
    }

    fn load(&self, name: &str) -> Option<Region> {
        let path = self.path_for(name);
        match image::open(&path) {
            Ok(img) => Some(Arc::new(img.to_rgba8())),
            Err(image::ImageError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(region = name, path = %path.display(), error = %e, "failed to load sprite");
                None
            }
        }
    }
}

impl SpriteProvider for FileSprites {
    fn region(&mut self, name: &str) -> Option<Region> {
        if let Some(hit) = self.cache.get(name) {
            return hit.clone();
        }
        let loaded = self.load(name);
        self.cache.insert(name.to_string(), loaded.clone());
        loaded
    }

    fn reset(&mut self) {
        self.cache.clear();
    }
}

/// Fixed in-memory region set
#[derive(Default)]
pub struct MemorySprites {
    regions: HashMap<String, Region>,
}

impl MemorySprites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, image: RgbaImage) {
        self.regions.insert(name.into(), Arc::new(image));
    }
}

impl SpriteProvider for MemorySprites {
    fn region(&mut self, name: &str) -> Option<Region> {
        self.regions.get(name).cloned()
    }

    fn reset(&mut self) {}
}

/// Resets the wrapped provider when dropped, including on error paths
pub struct ResetOnDrop<'a> {
    sprites: &'a mut dyn SpriteProvider,
}

impl<'a> ResetOnDrop<'a> {
    pub fn new(sprites: &'a mut dyn SpriteProvider) -> Self {
        Self { sprites }
    }
}

impl<'a> Deref for ResetOnDrop<'a> {
    type Target = dyn SpriteProvider + 'a;

    fn deref(&self) -> &Self::Target {
        self.sprites
    }
}

impl<'a> DerefMut for ResetOnDrop<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.sprites
    }
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.sprites.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_file_sprites_cache_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]))
            .save(dir.path().join("metal-floor.png"))
            .unwrap();
        RgbaImage::from_pixel(1, 1, Rgba([9, 9, 9, 255]))
            .save(dir.path().join("item_source.png"))
            .unwrap();

        let mut sprites = FileSprites::new(dir.path());
        let floor = sprites.region("metal-floor").unwrap();
        assert_eq!(floor.get_pixel(1, 1), &Rgba([1, 2, 3, 255]));
        assert!(sprites.region("item source").is_some());
        assert!(sprites.region("missing").is_none());
        assert_eq!(sprites.cached(), 3);

        {
            let _guard = ResetOnDrop::new(&mut sprites);
        }
        assert_eq!(sprites.cached(), 0);
    }

    #[test]
    fn test_memory_sprites() {
        let mut sprites = MemorySprites::new();
        sprites.insert("center", RgbaImage::new(3, 3));
        assert_eq!(sprites.region("center").unwrap().width(), 3);
        assert!(sprites.region("error").is_none());
    }
}
