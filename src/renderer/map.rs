use image::RgbaImage;

use crate::codec::{Color, Team, WorldVisitor};
use crate::content::{Block, ContentResolver};

/// Pixels per tile in map previews
pub const SCALE: i64 = 8;

/// Outline drawn over cells holding a structure
const MARKER: Color = Color::new(0, 0, 0, 64);

/// Marker colors that mean "nothing here"
const MARKER_SENTINEL: u32 = 255;

/// Streams map cells into a floor layer and a building layer.
///
/// Both layers are `(width + 1) * SCALE` by `(height + 1) * SCALE`. Tile
/// row 0 is the bottom of the map, pixel row 0 the top of the image.
#[derive(Default)]
pub struct MapRasterizer {
    layers: Option<(super::Canvas, super::Canvas)>,
    skipped: usize,
}

impl MapRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, width: u16, height: u16) {
        let w = (width as u32 + 1) * SCALE as u32;
        let h = (height as u32 + 1) * SCALE as u32;
        self.layers = Some((super::Canvas::new(w, h), super::Canvas::new(w, h)));
    }

    /// Cells whose pixels fell outside the image
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Composite buildings over floors
    pub fn finish(self) -> RgbaImage {
        match self.layers {
            Some((mut floors, walls)) => {
                floors.draw_image(walls.image(), 0, 0);
                floors.into_image()
            }
            None => RgbaImage::new(SCALE as u32, SCALE as u32),
        }
    }
}

impl WorldVisitor for MapRasterizer {
    fn resize(&mut self, width: u16, height: u16) {
        self.allocate(width, height);
    }

    fn floor(&mut self, content: &dyn ContentResolver, x: i32, y: i32, floor: &Block, overlay: &Block) {
        let Some((floors, _)) = self.layers.as_mut() else { return };
        let air = content.air();
        let color = if !overlay.is_air() {
            content.color_for(&air, &air, overlay, Team::DERELICT)
        } else {
            content.color_for(&air, floor, &air, Team::DERELICT)
        };

        let top = floors.height() as i64 - SCALE - y as i64 * SCALE - (SCALE - 1);
        if let Err(e) = floors.fill_rect(x as i64 * SCALE, top, SCALE, SCALE, color) {
            self.skipped += 1;
            tracing::warn!(x, y, error = %e, "floor cell outside preview");
        }
    }

    fn block(&mut self, content: &dyn ContentResolver, x: i32, y: i32, block: &Block, team: Team) {
        let Some((floors, _)) = self.layers.as_mut() else { return };
        let air = content.air();
        let color = content.color_for(&air, block, &air, team).argb8888();
        if color != MARKER_SENTINEL && color != 0 {
            let top = floors.height() as i64 - SCALE - y as i64 * SCALE - SCALE;
            floors.outline_rect(x as i64 * SCALE, top, SCALE, SCALE, MARKER);
        }
    }

    fn building(&mut self, content: &dyn ContentResolver, x: i32, y: i32, block: &Block, team: Team) {
        let Some((_, walls)) = self.layers.as_mut() else { return };
        let color = content.team_color(team);
        let size = block.size as i64 * SCALE;
        let offset = -(size - SCALE) / 2;

        // Footprint rows grow upward from the anchor; flip into image space.
        let left = x as i64 * SCALE + offset;
        let top = walls.height() as i64 - SCALE - (y as i64 * SCALE + offset + size - 1);
        if let Err(e) = walls.fill_rect(left, top, size, size, color) {
            self.skipped += 1;
            tracing::warn!(x, y, block = %block.name, error = %e, "building footprint outside preview");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::map::tests::sample_map;
    use crate::codec::read_map;
    use crate::content::registry::tests::test_registry;

    fn render_sample() -> (RgbaImage, usize) {
        let mut registry = test_registry();
        let mut rasterizer = MapRasterizer::new();
        read_map(&sample_map(0), &mut registry, &mut rasterizer).unwrap();
        let skipped = rasterizer.skipped();
        (rasterizer.finish(), skipped)
    }

    fn at(image: &RgbaImage, x: u32, y: u32) -> Color {
        let p = image.get_pixel(x, y).0;
        Color::new(p[0], p[1], p[2], p[3])
    }

    #[test]
    fn test_image_size_includes_margin() {
        let (image, skipped) = render_sample();
        assert_eq!(image.dimensions(), (24, 24));
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_origin_tile_is_bottom_left() {
        let (image, _) = render_sample();
        let ore = Color::from_hex("d99d73").unwrap();
        let stone = Color::from_hex("6b6b6b").unwrap();

        // Tile (0,0) carries the copper ore overlay: rows 9..=16 from the top.
        assert_eq!(at(&image, 3, 12), ore);
        assert_eq!(at(&image, 3, 4), stone);
        // Bottom margin row stays empty.
        assert_eq!(at(&image, 3, 23).a, 0);
    }

    #[test]
    fn test_building_footprint_in_team_color() {
        let (image, _) = render_sample();
        let sharded = Color::from_rgba8888(0xffd37fff);
        // Copper wall at tile (1,0)
        assert_eq!(at(&image, 12, 12), sharded);
    }

    #[test]
    fn test_structure_marker_outlines_cell() {
        let (image, _) = render_sample();
        let stone = Color::from_hex("6b6b6b").unwrap();
        // Stone wall at (0,0): outline starts at its top edge (row 8).
        let edge = at(&image, 3, 8);
        assert!(edge.r < stone.r, "{edge:?}");
        // Air cells get no marker.
        assert_eq!(at(&image, 4, 0), Color::CLEAR);
        assert_eq!(at(&image, 3, 4), stone);
    }

    #[test]
    fn test_large_footprint_is_centered() {
        let registry = test_registry();
        let mender = registry.block_by_name("mender").unwrap();
        let core = registry.block_by_name("core-shard").unwrap();
        let mut rasterizer = MapRasterizer::new();
        rasterizer.resize(8, 8);
        rasterizer.building(&registry, 4, 4, &core, Team::CRUX);
        rasterizer.building(&registry, 1, 1, &mender, Team::SHARDED);
        assert_eq!(rasterizer.skipped(), 0);
        let image = rasterizer.finish();
        assert_eq!(image.dimensions(), (72, 72));

        // 3x3 core on tile (4,4) covers tiles 3..=5: columns 24..=47,
        // rows 17..=40.
        let crux = Color::from_rgba8888(0xf25555ff);
        assert_eq!(at(&image, 24, 17), crux);
        assert_eq!(at(&image, 47, 40), crux);
        assert_eq!(at(&image, 48, 30), Color::CLEAR);
        assert_eq!(at(&image, 30, 16), Color::CLEAR);

        // 2x2 mender on tile (1,1) overhangs by half a tile each side.
        let sharded = Color::from_rgba8888(0xffd37fff);
        assert_eq!(at(&image, 4, 45), sharded);
        assert_eq!(at(&image, 19, 60), sharded);
        assert_eq!(at(&image, 3, 50), Color::CLEAR);
        assert_eq!(at(&image, 20, 50), Color::CLEAR);
    }

    #[test]
    fn test_footprint_off_canvas_is_skipped_not_fatal() {
        let registry = test_registry();
        let core = registry.block_by_name("core-shard").unwrap();
        let mut rasterizer = MapRasterizer::new();
        rasterizer.resize(2, 2);
        rasterizer.building(&registry, 0, 0, &core, Team::SHARDED);
        assert_eq!(rasterizer.skipped(), 1);
        let image = rasterizer.finish();
        assert_eq!(at(&image, 0, 23 - 8), Color::from_rgba8888(0xffd37fff));
    }
}
