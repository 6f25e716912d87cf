//! Decode + render entry points shared by every front end.
//!
//! The content resolver carries per-decode state (the temporary content
//! mapper) and the sprite provider a per-request cache, so both live in
//! one [`RenderContext`] behind a single lock.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::codec::{read_map, read_schematic, StringMap};
use crate::content::ContentResolver;
use crate::error::{Error, Result};
use crate::renderer::{to_base64_png, MapRasterizer, SchematicRasterizer, SpriteProvider};

pub struct RenderContext {
    pub content: Box<dyn ContentResolver>,
    pub sprites: Box<dyn SpriteProvider>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapPreview {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub description: String,
    pub width: i32,
    pub height: i32,
    pub tags: StringMap,
    /// Base64 PNG
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Requirement {
    pub name: String,
    /// Lowercase `rrggbbaa`
    pub color: String,
    pub amount: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchematicPreview {
    pub name: String,
    pub description: String,
    /// Base64 PNG
    pub image: String,
    pub width: i32,
    pub height: i32,
    pub labels: Vec<String>,
    pub requirements: Vec<Requirement>,
    #[serde(rename = "mod", skip_serializing_if = "Option::is_none")]
    pub mod_name: Option<String>,
}

/// Serialises every decode and render through one [`RenderContext`]
pub struct PreviewService {
    context: Mutex<RenderContext>,
}

impl PreviewService {
    pub fn new(content: Box<dyn ContentResolver>, sprites: Box<dyn SpriteProvider>) -> Self {
        Self { context: Mutex::new(RenderContext { content, sprites }) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RenderContext>> {
        self.context.lock().map_err(|_| Error::ContextPoisoned)
    }

    pub fn preview_map(&self, data: &[u8]) -> Result<MapPreview> {
        let mut ctx = self.lock()?;
        let mut rasterizer = MapRasterizer::new();
        let header = read_map(data, ctx.content.as_mut(), &mut rasterizer)?;
        if rasterizer.skipped() > 0 {
            tracing::warn!(name = %header.name, skipped = rasterizer.skipped(), "map cells fell outside the preview");
        }
        let image = rasterizer.finish();
        // The map renderer draws no sprites, but the provider is still
        // cleared at the end of every request.
        ctx.sprites.reset();
        drop(ctx);

        tracing::info!(name = %header.name, width = image.width(), height = image.height(), "map preview rendered");
        Ok(MapPreview {
            image: to_base64_png(&image)?,
            name: header.name,
            author: header.author,
            description: header.description,
            width: header.width,
            height: header.height,
            tags: header.tags,
        })
    }

    pub fn preview_schematic(&self, data: &[u8]) -> Result<SchematicPreview> {
        let mut guard = self.lock()?;
        let ctx = &mut *guard;
        let schematic = read_schematic(data, ctx.content.as_ref())?;
        let image = SchematicRasterizer::new(ctx.sprites.as_mut()).render(&schematic);
        let requirements = schematic
            .requirements(ctx.content.as_ref())
            .into_iter()
            .map(|(item, amount)| Requirement { name: item.name, color: item.color.to_hex(), amount })
            .collect();
        drop(guard);

        Ok(SchematicPreview {
            name: schematic.name().to_string(),
            description: schematic.description().to_string(),
            image: to_base64_png(&image)?,
            width: schematic.width,
            height: schematic.height,
            mod_name: schematic.mod_name().map(str::to_string),
            labels: schematic.labels,
            requirements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use base64::Engine;
    use image::{Rgba, RgbaImage};

    use crate::codec::map::tests::{map_with_dimensions, sample_map};
    use crate::codec::schematic::tests::{build_schematic, TileSpec};
    use crate::content::registry::tests::test_registry;
    use crate::renderer::MemorySprites;

    fn service() -> PreviewService {
        let mut sprites = MemorySprites::new();
        sprites.insert("metal-floor", RgbaImage::from_pixel(32, 32, Rgba([80, 80, 80, 255])));
        sprites.insert("copper-wall", RgbaImage::from_pixel(32, 32, Rgba([200, 120, 90, 255])));
        PreviewService::new(Box::new(test_registry()), Box::new(sprites))
    }

    fn decode(image: &str) -> RgbaImage {
        let png = base64::engine::general_purpose::STANDARD.decode(image).unwrap();
        image::load_from_memory(&png).unwrap().to_rgba8()
    }

    #[test]
    fn test_map_preview() {
        let preview = service().preview_map(&sample_map(0)).unwrap();
        assert_eq!(preview.name, "Frozen Forest");
        assert_eq!(preview.author.as_deref(), Some("Anuke"));
        assert_eq!((preview.width, preview.height), (2, 2));
        assert_eq!(decode(&preview.image).dimensions(), (24, 24));
    }

    #[test]
    fn test_map_errors_are_client_errors() {
        let service = service();
        let err = service.preview_map(&sample_map(-1)).unwrap_err();
        assert_eq!(err.status(), 400);
        // A failed decode leaves the service usable.
        assert!(service.preview_map(&sample_map(0)).is_ok());
    }

    #[test]
    fn test_schematic_preview() {
        let data = build_schematic(
            1,
            2,
            1,
            &[("name", "Walls"), ("labels", r#"["defense"]"#)],
            &["copper-wall", "core-shard"],
            &[
                TileSpec { block: 0, x: 0, y: 0, rotation: 0, config: &[0] },
                TileSpec { block: 0, x: 1, y: 0, rotation: 0, config: &[0] },
            ],
        );
        let preview = service().preview_schematic(&data).unwrap();
        assert_eq!(preview.name, "Walls");
        assert_eq!(preview.labels, vec!["defense"]);
        assert_eq!(preview.requirements.len(), 1);
        assert_eq!(preview.requirements[0].name, "copper");
        assert_eq!(preview.requirements[0].color, "d99d73ff");
        assert_eq!(preview.requirements[0].amount, 12);
        assert_eq!(preview.mod_name, None);
        assert_eq!(decode(&preview.image).dimensions(), (576, 576));

        let json = serde_json::to_value(&preview).unwrap();
        assert!(json.get("mod").is_none());
        assert_eq!(json["requirements"][0]["amount"], 12);
    }

    #[test]
    fn test_oversized_map_is_a_client_error() {
        let service = service();
        let data = map_with_dimensions(&[("width", "60000"), ("height", "60000")], 60000, 60000);
        let err = service.preview_map(&data).unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(service.preview_map(&sample_map(0)).is_ok());
    }

    #[test]
    fn test_concurrent_requests_share_one_context() {
        let schematic = build_schematic(1, 1, 1, &[], &["copper-wall"], &[
            TileSpec { block: 0, x: 0, y: 0, rotation: 0, config: &[0] },
        ]);
        let map = sample_map(0);

        let alone = service();
        let map_image = decode(&alone.preview_map(&map).unwrap().image);
        let schematic_image = decode(&alone.preview_schematic(&schematic).unwrap().image);

        let service = Arc::new(service());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                let (schematic, map) = (schematic.clone(), map.clone());
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        service.preview_map(&map).map(|p| (p.name, p.image))
                    } else {
                        service.preview_schematic(&schematic).map(|p| (p.name, p.image))
                    }
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let (name, image) = handle.join().unwrap().unwrap();
            if i % 2 == 0 {
                assert_eq!(name, "Frozen Forest");
                assert_eq!(decode(&image), map_image);
            } else {
                assert_eq!(name, "unknown");
                assert_eq!(decode(&image), schematic_image);
            }
        }
    }
}
