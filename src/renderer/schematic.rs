//! Schematic previews.
//!
//! Plans are drawn onto a `width * 32` by `height * 32` canvas in three
//! passes (shadows, block visuals, config overlays), then centered on a
//! square floor background at least 18 tiles across.

use image::{Rgba, RgbaImage};

use crate::codec::{Color, ConfigValue, Direction, Point2, Schematic, SchematicTile};
use crate::content::{Block, Capability, Visual};
use super::canvas::Canvas;
use super::sprites::{Region, ResetOnDrop, SpriteProvider};

/// Pixels per tile in schematic previews
pub const TILE: i64 = 32;
/// Smallest background side, in tiles, before the 2-tile border
pub const MIN_PREVIEW_TILES: i32 = 16;

const SHADOW_REGION: &str = "square-shadow";
const SHADOW_ALPHA: f32 = 0.8;
const ERROR_REGION: &str = "error";
const CENTER_REGION: &str = "center";
const FLOOR_REGION: &str = "metal-floor";
/// Used when the floor sprite is missing
const FALLBACK_FLOOR: Color = Color::rgb(0x4a, 0x4b, 0x53);

/// One block instance positioned for drawing
#[derive(Debug, Clone, Copy)]
pub struct DrawPlan<'a> {
    pub x: i32,
    pub y: i32,
    /// Quarter turns counter-clockwise, 0..=3
    pub rotation: u8,
    pub block: &'a Block,
    pub config: &'a ConfigValue,
}

impl<'a> DrawPlan<'a> {
    pub fn from_tile(tile: &'a SchematicTile) -> Self {
        Self {
            x: tile.x,
            y: tile.y,
            rotation: tile.rotation.rem_euclid(4) as u8,
            block: &tile.block,
            config: &tile.config,
        }
    }

    /// Even-sized blocks are anchored half a tile off their center
    fn offset(&self) -> f32 {
        if self.block.size % 2 == 0 { TILE as f32 / 2.0 } else { 0.0 }
    }

    fn draw_x(&self) -> f32 {
        self.x as f32 * TILE as f32 + TILE as f32 / 2.0 + self.offset()
    }

    /// Image rows grow downward while tile rows grow upward
    fn draw_y(&self, canvas_height: u32) -> f32 {
        canvas_height as f32 - (self.y as f32 * TILE as f32 + TILE as f32 / 2.0 + self.offset())
    }

    fn pixel_size(&self) -> f32 {
        self.block.size as f32 * TILE as f32
    }

    /// Whether this plan's footprint covers tile `(x, y)`
    fn covers(&self, x: i32, y: i32) -> bool {
        let size = self.block.size as i32;
        let (lo, hi) = ((size - 1) / 2, size / 2);
        x >= self.x - lo && x <= self.x + hi && y >= self.y - lo && y <= self.y + hi
    }

    /// First tile outside the footprint in the facing direction
    fn front(&self) -> (i32, i32) {
        let size = self.block.size as i32;
        let (lo, hi) = ((size - 1) / 2, size / 2);
        match Direction::from_rotation(self.rotation) {
            Direction::Right => (self.x + hi + 1, self.y),
            Direction::Up => (self.x, self.y + hi + 1),
            Direction::Left => (self.x - lo - 1, self.y),
            Direction::Down => (self.x, self.y - lo - 1),
        }
    }
}

/// Conveyor-style blending: which variant to draw and whether it is
/// mirrored vertically. Neighbours count when they rotate and face into
/// this plan.
pub fn autotile_bits(plan: &DrawPlan<'_>, plans: &[DrawPlan<'_>]) -> (u8, bool) {
    let blends = |direction: u8| {
        let real = (plan.rotation + 4 - direction % 4) % 4;
        let (dx, dy) = Direction::from_rotation(real).to_vector();
        let (nx, ny) = (plan.x + dx, plan.y + dy);
        plans.iter().any(|other| {
            !std::ptr::eq(other, plan)
                && other.block.rotates()
                && other.covers(nx, ny)
                && other.front() == (plan.x, plan.y)
        })
    };
    let (left, back, right) = (blends(1), blends(2), blends(3));

    let case = if back && left && right {
        0
    } else if left && right {
        1
    } else if left && back {
        2
    } else if right && back {
        3
    } else if left {
        4
    } else if right {
        5
    } else {
        -1
    };
    match case {
        0 => (3, false),
        1 => (4, false),
        2 => (2, false),
        3 => (2, true),
        4 => (1, true),
        5 => (1, false),
        _ => (0, false),
    }
}

pub struct SchematicRasterizer<'a> {
    sprites: ResetOnDrop<'a>,
}

impl<'a> SchematicRasterizer<'a> {
    /// The sprite provider is reset when the rasterizer is dropped
    pub fn new(sprites: &'a mut dyn SpriteProvider) -> Self {
        Self { sprites: ResetOnDrop::new(sprites) }
    }

    pub fn render(mut self, schematic: &Schematic) -> RgbaImage {
        let width = schematic.width.max(0);
        let height = schematic.height.max(0);
        let mut canvas = Canvas::new((width as i64 * TILE) as u32, (height as i64 * TILE) as u32);
        let plans: Vec<DrawPlan<'_>> = schematic.tiles.iter().map(DrawPlan::from_tile).collect();

        tracing::info!(name = schematic.name(), plans = plans.len(), "rendering schematic");

        for plan in &plans {
            self.draw_shadow(&mut canvas, plan);
        }
        for plan in &plans {
            self.draw_visual(&mut canvas, plan, &plans);
        }
        for plan in &plans {
            self.draw_config(&mut canvas, plan, &plans);
        }

        let side = width.max(height).max(MIN_PREVIEW_TILES) + 2;
        let off_x = (side - width) / 2;
        let off_y = (side - height) / 2;
        let mut background = self.background(side);
        background.draw_image(canvas.image(), off_x as i64 * TILE, off_y as i64 * TILE);
        background.into_image()
    }

    fn region(&mut self, name: &str) -> Option<Region> {
        self.sprites.region(name)
    }

    fn draw_shadow(&mut self, canvas: &mut Canvas, plan: &DrawPlan<'_>) {
        let side = plan.block.size as f32 * 16.0;
        let region = self.region(SHADOW_REGION).unwrap_or_else(|| {
            std::sync::Arc::new(soft_square(side.max(1.0) as u32))
        });
        let tint = Color::new(0, 0, 0, (SHADOW_ALPHA * 255.0).round() as u8);
        canvas.draw_region(&region, plan.draw_x(), plan.draw_y(canvas.height()), side, side, 0, false, tint);
    }

    fn draw_visual(&mut self, canvas: &mut Canvas, plan: &DrawPlan<'_>, plans: &[DrawPlan<'_>]) {
        let block = plan.block;
        let (name, flip) = match block.visual {
            Visual::Autotile => {
                let (bits, flip) = autotile_bits(plan, plans);
                (format!("{}-{}-0", block.name, bits), flip)
            }
            Visual::Plain | Visual::Rotated => (block.name.clone(), false),
        };

        let region = match self.region(&name) {
            Some(region) => region,
            None => {
                tracing::warn!(region = %name, x = plan.x, y = plan.y, "missing block sprite");
                match self.region(ERROR_REGION) {
                    Some(region) => region,
                    None => return,
                }
            }
        };
        let turns = if block.rotates() { plan.rotation } else { 0 };
        let size = plan.pixel_size();
        canvas.draw_region(&region, plan.draw_x(), plan.draw_y(canvas.height()), size, size, turns, flip, Color::WHITE);
    }

    fn draw_config(&mut self, canvas: &mut Canvas, plan: &DrawPlan<'_>, plans: &[DrawPlan<'_>]) {
        let (x, y) = (plan.draw_x(), plan.draw_y(canvas.height()));
        match (plan.block.capability, plan.config) {
            (Capability::Item, ConfigValue::Item(item)) => self.draw_center(canvas, x, y, item.color),
            (Capability::Liquid, ConfigValue::Liquid(liquid)) => self.draw_center(canvas, x, y, liquid.color),
            (Capability::Link, ConfigValue::Point(target)) => {
                let other = plans.iter().find(|other| {
                    other.block.name == plan.block.name
                        && !std::ptr::eq(*other, plan)
                        && (other.x - plan.x, other.y - plan.y) == (target.x, target.y)
                });
                if let Some(other) = other {
                    self.draw_bridge(canvas, plan, other);
                }
            }
            (Capability::Toggle, ConfigValue::Int(rgba)) => {
                if let Some(region) = self.region(&format!("{}-top", plan.block.name)) {
                    let size = plan.pixel_size();
                    let tint = Color::from_rgba8888(*rgba as u32);
                    canvas.draw_region(&region, x, y, size, size, 0, false, tint);
                }
            }
            _ => {}
        }
    }

    fn draw_center(&mut self, canvas: &mut Canvas, x: f32, y: f32, color: Color) {
        if let Some(region) = self.region(CENTER_REGION) {
            let (w, h) = (region.width() as f32, region.height() as f32);
            canvas.draw_region(&region, x, y, w, h, 0, false, color);
        }
    }

    fn draw_bridge(&mut self, canvas: &mut Canvas, from: &DrawPlan<'_>, to: &DrawPlan<'_>) {
        let name = &from.block.name;
        let delta = Point2::new(to.x - from.x, to.y - from.y);
        let turns = match (delta.x.signum(), delta.y.signum()) {
            (1, 0) => Some(0),
            (0, 1) => Some(1),
            (-1, 0) => Some(2),
            (0, -1) => Some(3),
            _ => None,
        };
        let size = from.pixel_size();
        let h = canvas.height();

        if let Some(end) = self.region(&format!("{name}-end")) {
            let (a, b) = turns.map_or((0, 0), |t| (t, (t + 2) % 4));
            canvas.draw_region(&end, from.draw_x(), from.draw_y(h), size, size, a, false, Color::WHITE);
            canvas.draw_region(&end, to.draw_x(), to.draw_y(h), size, size, b, false, Color::WHITE);
        }

        let (Some(turns), Some(bridge)) = (turns, self.region(&format!("{name}-bridge"))) else {
            return;
        };
        let steps = delta.x.abs().max(delta.y.abs());
        let (sx, sy) = (delta.x.signum(), delta.y.signum());
        for i in 1..steps {
            let segment = DrawPlan { x: from.x + sx * i, y: from.y + sy * i, ..*from };
            canvas.draw_region(&bridge, segment.draw_x(), segment.draw_y(h), size, size, turns, false, Color::WHITE);
        }
    }

    fn background(&mut self, side: i32) -> Canvas {
        let px = (side as i64 * TILE) as u32;
        let mut background = Canvas::new(px, px);
        match self.region(FLOOR_REGION) {
            Some(floor) => {
                let tile = TILE as f32;
                for ty in 0..side {
                    for tx in 0..side {
                        let (cx, cy) = (tx as f32 * tile + tile / 2.0, ty as f32 * tile + tile / 2.0);
                        background.draw_region(&floor, cx, cy, tile, tile, 0, false, Color::WHITE);
                    }
                }
            }
            None => {
                tracing::warn!(region = FLOOR_REGION, "missing floor sprite, using flat color");
                // Full-canvas fill cannot miss.
                let _ = background.fill_rect(0, 0, px as i64, px as i64, FALLBACK_FLOOR);
            }
        }
        background
    }
}

/// White square whose alpha fades out over the outer quarter on each side
fn soft_square(side: u32) -> RgbaImage {
    let fade = (side as f32 / 4.0).max(1.0);
    RgbaImage::from_fn(side, side, |x, y| {
        let edge = x.min(y).min(side - 1 - x).min(side - 1 - y) as f32 + 0.5;
        let alpha = (edge / fade).min(1.0);
        Rgba([255, 255, 255, (alpha * 255.0).round() as u8])
    })
}
