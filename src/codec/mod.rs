pub mod reader;
pub mod writer;
pub mod types;
pub mod dynamic;
pub mod map;
pub mod schematic;

pub use reader::DataReader;
pub use writer::DataWriter;
pub use types::*;
pub use dynamic::ConfigValue;
pub use map::{read_map, MapHeader, SaveVersion, WorldVisitor, MAP_HEADER};
pub use schematic::{
    read_schematic, remap_legacy_config,
    Schematic, SchematicTile,
    MAX_DIMENSION, MAX_TILES, SCHEMATIC_HEADER,
};
