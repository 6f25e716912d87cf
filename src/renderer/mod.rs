//! Software rasterizers for map and schematic previews

pub mod canvas;
pub mod encode;
pub mod map;
pub mod schematic;
pub mod sprites;

pub use canvas::{Canvas, OutOfBounds};
pub use encode::{encode_png, to_base64_png};
pub use map::MapRasterizer;
pub use schematic::{DrawPlan, SchematicRasterizer};
pub use sprites::{FileSprites, MemorySprites, Region, ResetOnDrop, SpriteProvider};
