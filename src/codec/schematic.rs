//! Schematic container (`msch`).
//!
//! Unlike map saves the magic and version byte sit in front of the zlib
//! stream, and the body carries no region framing.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::content::{Block, BlockRef, Capability, ContentResolver, Item};
use crate::error::{Error, Result};
use super::dynamic::ConfigValue;
use super::reader::DataReader;
use super::types::{Point2, StringMap};

pub const SCHEMATIC_HEADER: &[u8; 4] = b"msch";
pub const MAX_DIMENSION: i16 = 1024;
pub const MAX_TILES: i32 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct SchematicTile {
    pub block: BlockRef,
    pub x: i32,
    pub y: i32,
    pub config: ConfigValue,
    pub rotation: i8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schematic {
    pub version: u8,
    pub width: i32,
    pub height: i32,
    pub tiles: Vec<SchematicTile>,
    pub tags: StringMap,
    pub labels: Vec<String>,
}

impl Schematic {
    pub fn name(&self) -> &str {
        self.tags.get("name").map(String::as_str).unwrap_or("unknown")
    }

    pub fn description(&self) -> &str {
        self.tags.get("description").map(String::as_str).unwrap_or("")
    }

    /// Total build cost, ordered by item id. Items the resolver does not
    /// know are dropped.
    pub fn requirements(&self, content: &dyn ContentResolver) -> Vec<(Item, u32)> {
        let mut totals: Vec<(Item, u32)> = Vec::new();
        for tile in &self.tiles {
            for stack in &tile.block.requirements {
                match totals.iter_mut().find(|(item, _)| item.name == stack.item) {
                    Some((_, amount)) => *amount += stack.amount,
                    None => match content.item_by_name(&stack.item) {
                        Some(item) => totals.push((item, stack.amount)),
                        None => tracing::debug!(item = %stack.item, "unknown requirement item"),
                    },
                }
            }
        }
        totals.sort_by_key(|(item, _)| item.id);
        totals
    }

    /// Mod owning the first modded block, if any
    pub fn mod_name(&self) -> Option<&str> {
        self.tiles.iter().find_map(|t| t.block.mod_name.as_deref())
    }
}

/// Decode a schematic container
pub fn read_schematic(data: &[u8], content: &dyn ContentResolver) -> Result<Schematic> {
    if data.len() < SCHEMATIC_HEADER.len() || &data[..4] != SCHEMATIC_HEADER {
        return Err(Error::MalformedHeader("Not a schematic file (missing header).".into()));
    }
    let version = *data
        .get(4)
        .ok_or_else(|| Error::MalformedHeader("missing schematic version".into()))?;

    let mut r = DataReader::new(ZlibDecoder::new(&data[5..]));
    read_body(&mut r, version, content).map_err(|e| match e {
        Error::Io(reason) => Error::corrupt("schematic", reason),
        other => other,
    })
}

fn read_body<R: Read>(r: &mut DataReader<R>, version: u8, content: &dyn ContentResolver) -> Result<Schematic> {
    let width = r.read_i16()?;
    let height = r.read_i16()?;
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::InvalidSchematic(format!(
            "Too large (max possible size is {MAX_DIMENSION}x{MAX_DIMENSION}), got {width}x{height}"
        )));
    }
    if width < 0 || height < 0 {
        return Err(Error::InvalidSchematic(format!("negative size {width}x{height}")));
    }

    let tag_count = r.read_u8()?;
    let mut tags = StringMap::with_capacity(tag_count as usize);
    for _ in 0..tag_count {
        let key = r.read_utf()?;
        let value = r.read_utf()?;
        tags.insert(key, value);
    }
    let labels = parse_labels(tags.get("labels").map(String::as_str).unwrap_or("[]"));

    let block_count = r.read_i8()?.max(0);
    let mut blocks = Vec::with_capacity(block_count as usize);
    for _ in 0..block_count {
        let name = r.read_utf()?;
        blocks.push(content.resolve_block(&name));
    }

    let total = r.read_i32()?;
    if total > MAX_TILES {
        return Err(Error::InvalidSchematic(format!("Too many blocks: {total}")));
    }

    let air = content.air();
    let mut tiles = Vec::with_capacity(total.clamp(0, 4096) as usize);
    for _ in 0..total.max(0) {
        let index = r.read_i8()?;
        let block = usize::try_from(index)
            .ok()
            .and_then(|i| blocks.get(i).cloned())
            .unwrap_or_else(|| air.clone());
        let position = r.read_i32()?;
        let config = if version == 0 {
            remap_legacy_config(&block, r.read_i32()?, position, content)
        } else {
            ConfigValue::read(r, content)?
        };
        let rotation = r.read_i8()?;
        if block.is_air() {
            continue;
        }
        tiles.push(SchematicTile {
            block,
            x: Point2::x_of(position) as i32,
            y: Point2::y_of(position) as i32,
            config,
            rotation,
        });
    }

    tracing::debug!(version, width, height, tiles = tiles.len(), "schematic read");

    Ok(Schematic {
        version,
        width: width as i32,
        height: height as i32,
        tiles,
        tags,
        labels,
    })
}

fn parse_labels(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "ignoring unparseable labels tag");
        Vec::new()
    })
}

/// Version 0 stored every config as a raw int; its meaning depends only on
/// what kind of config the block accepts.
pub fn remap_legacy_config(
    block: &Block,
    value: i32,
    position: i32,
    content: &dyn ContentResolver,
) -> ConfigValue {
    let id = u16::try_from(value).ok();
    match block.capability {
        Capability::Item => id.and_then(|id| content.item(id)).map_or(ConfigValue::None, ConfigValue::Item),
        Capability::Liquid => id.and_then(|id| content.liquid(id)).map_or(ConfigValue::None, ConfigValue::Liquid),
        Capability::Link => ConfigValue::Point(
            Point2::unpack(value).sub(Point2::x_of(position) as i32, Point2::y_of(position) as i32),
        ),
        Capability::Toggle => ConfigValue::Int(value),
        Capability::None => ConfigValue::None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::codec::writer::{deflate, DataWriter};
    use crate::content::registry::tests::test_registry;

    pub(crate) struct TileSpec<'a> {
        pub block: i8,
        pub x: i32,
        pub y: i32,
        pub rotation: i8,
        /// Raw config bytes (a v0 int or a typed object)
        pub config: &'a [u8],
    }

    pub(crate) fn build_schematic(
        version: u8,
        width: i16,
        height: i16,
        tags: &[(&str, &str)],
        blocks: &[&str],
        tiles: &[TileSpec<'_>],
    ) -> Vec<u8> {
        let mut body = DataWriter::new();
        body.write_i16(width);
        body.write_i16(height);
        body.write_u8(tags.len() as u8);
        for (k, v) in tags {
            body.write_utf(k);
            body.write_utf(v);
        }
        body.write_i8(blocks.len() as i8);
        for name in blocks {
            body.write_utf(name);
        }
        body.write_i32(tiles.len() as i32);
        for tile in tiles {
            body.write_i8(tile.block);
            body.write_i32(Point2::pack(tile.x, tile.y));
            body.write_bytes(tile.config);
            body.write_i8(tile.rotation);
        }

        let mut out = DataWriter::new();
        out.write_bytes(SCHEMATIC_HEADER);
        out.write_u8(version);
        out.write_bytes(&deflate(body.as_slice()));
        out.into_vec()
    }

    const NO_CONFIG: &[u8] = &[0];

    #[test]
    fn test_read_basic_schematic() {
        let registry = test_registry();
        let data = build_schematic(
            1,
            3,
            2,
            &[("name", "Copper Wall Line"), ("labels", r#"["defense","early"]"#)],
            &["copper-wall", "conveyor"],
            &[
                TileSpec { block: 0, x: 0, y: 0, rotation: 0, config: NO_CONFIG },
                TileSpec { block: 1, x: 2, y: 1, rotation: 3, config: NO_CONFIG },
            ],
        );
        let schematic = read_schematic(&data, &registry).unwrap();

        assert_eq!(schematic.name(), "Copper Wall Line");
        assert_eq!(schematic.description(), "");
        assert_eq!((schematic.width, schematic.height), (3, 2));
        assert_eq!(schematic.labels, vec!["defense", "early"]);
        assert_eq!(schematic.tiles.len(), 2);
        assert_eq!(schematic.tiles[1].block.name, "conveyor");
        assert_eq!((schematic.tiles[1].x, schematic.tiles[1].y), (2, 1));
        assert_eq!(schematic.tiles[1].rotation, 3);

        let requirements = schematic.requirements(&registry);
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].0.name, "copper");
        assert_eq!(requirements[0].1, 7);
        assert_eq!(schematic.mod_name(), None);
    }

    #[test]
    fn test_bad_labels_become_empty() {
        let registry = test_registry();
        let data = build_schematic(1, 1, 1, &[("labels", "{not json")], &[], &[]);
        let schematic = read_schematic(&data, &registry).unwrap();
        assert!(schematic.labels.is_empty());
        assert_eq!(schematic.name(), "unknown");
    }

    #[test]
    fn test_rejects_oversized_dimensions() {
        let registry = test_registry();
        let data = build_schematic(1, 1025, 4, &[], &[], &[]);
        assert!(matches!(read_schematic(&data, &registry), Err(Error::InvalidSchematic(_))));

        let data = build_schematic(1, 4, -1, &[], &[], &[]);
        assert!(matches!(read_schematic(&data, &registry), Err(Error::InvalidSchematic(_))));
    }

    #[test]
    fn test_rejects_too_many_tiles_before_reading_them() {
        let registry = test_registry();
        let mut body = DataWriter::new();
        body.write_i16(4);
        body.write_i16(4);
        body.write_u8(0);
        body.write_i8(0);
        body.write_i32(MAX_TILES + 1);
        let mut data = SCHEMATIC_HEADER.to_vec();
        data.push(1);
        data.extend(deflate(body.as_slice()));
        assert!(matches!(read_schematic(&data, &registry), Err(Error::InvalidSchematic(_))));
    }

    #[test]
    fn test_missing_header() {
        let registry = test_registry();
        assert!(matches!(read_schematic(b"mscx\x01", &registry), Err(Error::MalformedHeader(_))));
        assert!(matches!(read_schematic(b"msch", &registry), Err(Error::MalformedHeader(_))));
    }

    #[test]
    fn test_truncated_body_is_corrupt() {
        let registry = test_registry();
        let mut data = build_schematic(1, 1, 1, &[], &["copper-wall"], &[
            TileSpec { block: 0, x: 0, y: 0, rotation: 0, config: NO_CONFIG },
        ]);
        data.truncate(data.len() - 10);
        let err = read_schematic(&data, &registry).unwrap_err();
        assert!(matches!(err, Error::CorruptContainer { .. }), "{err:?}");
    }

    #[test]
    fn test_deeply_nested_config_is_corrupt() {
        let registry = test_registry();
        let mut config = Vec::new();
        for _ in 0..10_000 {
            config.push(22);
            config.extend_from_slice(&1i32.to_be_bytes());
        }
        config.push(0);
        let data = build_schematic(1, 1, 1, &[], &["sorter"], &[
            TileSpec { block: 0, x: 0, y: 0, rotation: 0, config: &config },
        ]);
        let err = read_schematic(&data, &registry).unwrap_err();
        assert!(matches!(&err, Error::CorruptContainer { region: "schematic", .. }), "{err:?}");
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_legacy_and_unknown_blocks_are_dropped() {
        let registry = test_registry();
        let data = build_schematic(1, 2, 1, &[], &["dagger-factory", "no-such-block", "mender"], &[
            TileSpec { block: 0, x: 0, y: 0, rotation: 0, config: NO_CONFIG },
            TileSpec { block: 1, x: 1, y: 0, rotation: 0, config: NO_CONFIG },
            TileSpec { block: 9, x: 1, y: 0, rotation: 0, config: NO_CONFIG },
            TileSpec { block: 2, x: 1, y: 0, rotation: 0, config: NO_CONFIG },
        ]);
        let schematic = read_schematic(&data, &registry).unwrap();
        assert_eq!(schematic.tiles.len(), 1);
        assert_eq!(schematic.tiles[0].block.name, "mender");
    }

    #[test]
    fn test_v0_config_remap_by_capability() {
        let registry = test_registry();
        let int = |v: i32| v.to_be_bytes();
        let silicon = int(2);
        let slag = int(1);
        let link = int(Point2::pack(5, 3));
        let light = int(0x00ff00ff);
        let data = build_schematic(0, 6, 4, &[], &["sorter", "unloader", "liquid-source", "bridge-conveyor", "illuminator", "copper-wall"], &[
            TileSpec { block: 0, x: 0, y: 0, rotation: 0, config: &silicon },
            TileSpec { block: 1, x: 1, y: 0, rotation: 0, config: &silicon },
            TileSpec { block: 2, x: 2, y: 0, rotation: 0, config: &slag },
            TileSpec { block: 3, x: 2, y: 3, rotation: 0, config: &link },
            TileSpec { block: 4, x: 4, y: 0, rotation: 0, config: &light },
            TileSpec { block: 5, x: 5, y: 0, rotation: 0, config: &silicon },
        ]);
        let schematic = read_schematic(&data, &registry).unwrap();
        let configs: Vec<_> = schematic.tiles.iter().map(|t| t.config.clone()).collect();

        let silicon = registry.item(2).unwrap();
        assert_eq!(configs[0], ConfigValue::Item(silicon.clone()));
        assert_eq!(configs[0], configs[1]);
        assert_eq!(configs[2], ConfigValue::Liquid(registry.liquid(1).unwrap()));
        assert_eq!(configs[3], ConfigValue::Point(Point2::new(3, 0)));
        assert_eq!(configs[4], ConfigValue::Int(0x00ff00ff));
        assert_eq!(configs[5], ConfigValue::None);
    }

    #[test]
    fn test_decoding_twice_is_identical() {
        let registry = test_registry();
        let data = build_schematic(1, 2, 2, &[("name", "twice")], &["mender"], &[
            TileSpec { block: 0, x: 0, y: 0, rotation: 0, config: &[1, 0, 0, 0, 9] },
        ]);
        assert_eq!(read_schematic(&data, &registry).unwrap(), read_schematic(&data, &registry).unwrap());
    }
}
