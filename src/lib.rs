//! Mindustry Preview
//!
//! Decodes Mindustry map saves and schematics and renders their preview
//! images.

pub mod codec;
pub mod config;
pub mod content;
pub mod daemon;
pub mod error;
pub mod renderer;
pub mod service;

pub use error::{Error, Result};
pub use codec::{
    read_map, read_schematic,
    Color, ConfigValue, Direction, Point2, Team, StringMap,
    MapHeader, SaveVersion, WorldVisitor,
    Schematic, SchematicTile,
};
pub use content::{Block, BlockRef, ContentRegistry, ContentResolver, Item, Liquid};
pub use renderer::{FileSprites, MapRasterizer, MemorySprites, SchematicRasterizer, SpriteProvider};
pub use service::{MapPreview, PreviewService, SchematicPreview};
pub use config::PreviewConfig;
