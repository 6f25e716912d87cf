//! Map save container (`MSAV`).
//!
//! The whole file is one zlib stream: magic, an i32 version, then
//! length-framed regions. Only the regions needed for a preview are read
//! (`meta`, `content`, `preview_map`); anything after them is ignored.
//!
//! Tiles are never materialized. The `preview_map` region is streamed into
//! a [`WorldVisitor`] cell by cell, so memory stays flat for large maps.

use std::io::Read;
use std::ops::RangeInclusive;

use flate2::read::ZlibDecoder;

use crate::content::{Block, BlockRef, ContentMapper, ContentResolver, ScopedMapper};
use crate::error::{Error, Result};
use super::reader::DataReader;
use super::types::{StringMap, Team};

pub const MAP_HEADER: &[u8; 4] = b"MSAV";

/// Content type ordinals in the content header region
const CONTENT_ITEM: u8 = 0;
const CONTENT_BLOCK: u8 = 1;
const CONTENT_LIQUID: u8 = 4;

/// Packed tile flags in the block section
const TILE_ENTITY: u8 = 1;
const TILE_DATA: u8 = 2;
const TILE_EXTENDED_DATA: u8 = 4;
/// data, floor data, overlay data (bytes) and extra data (i32)
const EXTENDED_DATA_LEN: u64 = 7;

/// Largest accepted map side, in tiles
pub const MAX_MAP_DIMENSION: u16 = 2048;

/// Receives decoded cells in stream order.
///
/// Floors arrive for every cell first; block events follow in a second
/// row-major sweep.
pub trait WorldVisitor {
    /// Tile grid dimensions as stored in the `preview_map` region, called
    /// once before any cell. They agree with the metadata when it has any.
    fn resize(&mut self, _width: u16, _height: u16) {}

    /// `overlay` is air when the cell has none
    fn floor(&mut self, content: &dyn ContentResolver, x: i32, y: i32, floor: &Block, overlay: &Block);

    /// A block was placed on the cell
    fn block(&mut self, content: &dyn ContentResolver, x: i32, y: i32, block: &Block, team: Team);

    /// A building's entity data was read at its center cell
    fn building(&mut self, content: &dyn ContentResolver, x: i32, y: i32, block: &Block, team: Team);
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapHeader {
    pub version: i32,
    pub name: String,
    pub author: Option<String>,
    pub description: String,
    pub width: i32,
    pub height: i32,
    pub tags: StringMap,
}

impl MapHeader {
    fn from_tags(version: i32, tags: StringMap) -> Self {
        let int_tag = |key: &str| tags.get(key).and_then(|v| v.trim().parse().ok()).unwrap_or(0);
        Self {
            version,
            name: tags.get("name").cloned().unwrap_or_else(|| "Unknown".to_string()),
            author: tags.get("author").cloned(),
            description: tags.get("description").cloned().unwrap_or_default(),
            width: int_tag("width"),
            height: int_tag("height"),
            tags,
        }
    }
}

/// Field layout for one save format version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveVersion {
    pub version: i32,
}

impl SaveVersion {
    pub const SUPPORTED: RangeInclusive<i32> = 7..=11;

    pub fn for_version(version: i32) -> Result<Self> {
        if !Self::SUPPORTED.contains(&version) {
            return Err(Error::MalformedHeader(format!("unsupported save version {version}")));
        }
        Ok(Self { version })
    }

    pub fn read_string_map<R: Read>(&self, r: &mut DataReader<R>) -> Result<StringMap> {
        let count = r.read_i16()?.max(0) as usize;
        let mut map = StringMap::with_capacity(count);
        for _ in 0..count {
            let key = r.read_utf()?;
            let value = r.read_utf()?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Build the id table this save was written with
    pub fn read_content_header<R: Read>(
        &self,
        r: &mut DataReader<R>,
        content: &dyn ContentResolver,
    ) -> Result<ContentMapper> {
        let mut mapper = ContentMapper::default();
        let mapped = r.read_i8()?.max(0);
        for _ in 0..mapped {
            let kind = r.read_u8()?;
            let total = r.read_i16()?.max(0) as usize;
            for _ in 0..total {
                let name = r.read_utf()?;
                let current = content.legacy_alias(&name);
                match kind {
                    CONTENT_BLOCK => mapper.blocks.push(Some(content.resolve_block(current))),
                    CONTENT_ITEM => mapper.items.push(content.item_by_name(current)),
                    CONTENT_LIQUID => mapper.liquids.push(content.liquid_by_name(current)),
                    _ => {}
                }
            }
        }
        tracing::debug!(
            blocks = mapper.blocks.len(),
            items = mapper.items.len(),
            liquids = mapper.liquids.len(),
            "content header read"
        );
        Ok(mapper)
    }

    /// Stream the tile grid into `visitor`
    pub fn read_map<R: Read>(
        &self,
        r: &mut DataReader<R>,
        content: &dyn ContentResolver,
        header: &MapHeader,
        visitor: &mut dyn WorldVisitor,
    ) -> Result<()> {
        let width = r.read_u16()?;
        let height = r.read_u16()?;
        check_dimensions(header, width, height)?;
        visitor.resize(width, height);

        let w = width as usize;
        let count = w * height as usize;
        let cell = |i: usize| ((i % w) as i32, (i / w) as i32);
        let air = content.air();
        let stone = content.block_by_name("stone").unwrap_or_else(|| air.clone());

        let mut i = 0;
        while i < count {
            let floor_id = r.read_i16()?;
            let overlay_id = r.read_i16()?;
            let consecutives = r.read_u8()? as usize;

            let floor = match lookup(content, floor_id) {
                Some(floor) if !floor.is_air() => floor,
                _ => stone.clone(),
            };
            let overlay = lookup(content, overlay_id).unwrap_or_else(|| air.clone());

            for j in i..=i + consecutives {
                let (x, y) = cell(j);
                visitor.floor(content, x, y, &floor, &overlay);
            }
            i += consecutives + 1;
        }

        let mut i = 0;
        while i < count {
            let block = lookup(content, r.read_i16()?).unwrap_or_else(|| air.clone());
            let packed = r.read_u8()?;
            let had_entity = packed & TILE_ENTITY != 0;
            let had_data = packed & TILE_DATA != 0;
            let had_extended = packed & TILE_EXTENDED_DATA != 0;
            if had_extended {
                r.skip(EXTENDED_DATA_LEN)?;
            }
            let (x, y) = cell(i);

            if had_entity {
                let is_center = r.read_bool()?;
                if is_center {
                    visitor.block(content, x, y, &block, Team::DERELICT);
                    if block.has_building {
                        let team = r.chunk("building", read_building_team)?;
                        visitor.building(content, x, y, &block, team);
                    } else {
                        // Entity code for this block is gone; drop its data.
                        r.chunk("building", |r| Ok(r.skip_remaining()?))?;
                    }
                }
            } else if had_data {
                visitor.block(content, x, y, &block, Team::DERELICT);
                r.read_i8()?;
            } else if had_extended {
                visitor.block(content, x, y, &block, Team::DERELICT);
            } else {
                let consecutives = r.read_u8()? as usize;
                for j in i..=i + consecutives {
                    let (x, y) = cell(j);
                    visitor.block(content, x, y, &block, Team::DERELICT);
                }
                i += consecutives;
            }
            i += 1;
        }
        Ok(())
    }
}

/// Reject grids too large to preview, and metadata that disagrees with the
/// stored grid
fn check_dimensions(header: &MapHeader, width: u16, height: u16) -> Result<()> {
    if width > MAX_MAP_DIMENSION || height > MAX_MAP_DIMENSION {
        return Err(Error::corrupt(
            "preview_map",
            format!("map size {width}x{height} exceeds {MAX_MAP_DIMENSION}x{MAX_MAP_DIMENSION}"),
        ));
    }
    let declared = (header.width, header.height);
    if declared.0 > 0 && declared.1 > 0 && declared != (width as i32, height as i32) {
        return Err(Error::corrupt(
            "preview_map",
            format!("metadata declares {}x{} but the tile grid is {width}x{height}", declared.0, declared.1),
        ));
    }
    Ok(())
}

fn lookup(content: &dyn ContentResolver, id: i16) -> Option<BlockRef> {
    u16::try_from(id).ok().and_then(|id| content.block(id))
}

/// Read the common building prefix up to the team, skipping the rest
fn read_building_team<R: Read>(r: &mut DataReader<R>) -> Result<Team> {
    let _revision = r.read_i8()?;
    let _health = r.read_f32()?;
    let _rotation = r.read_i8()?;
    let team = Team(r.read_u8()?);
    r.skip_remaining()?;
    Ok(team)
}

/// Decode a map container, streaming its tiles into `visitor`.
///
/// The content mapper installed from the `content` region is cleared again
/// before this returns, whether or not decoding succeeded.
pub fn read_map(
    data: &[u8],
    content: &mut dyn ContentResolver,
    visitor: &mut dyn WorldVisitor,
) -> Result<MapHeader> {
    let mut r = DataReader::new(ZlibDecoder::new(data));

    let mut magic = [0u8; 4];
    for b in magic.iter_mut() {
        *b = r.read_u8().map_err(|e| Error::corrupt("header", e.to_string()))?;
    }
    if &magic != MAP_HEADER {
        return Err(Error::MalformedHeader(format!(
            "expected map header {:?}, found {:?}",
            String::from_utf8_lossy(MAP_HEADER),
            String::from_utf8_lossy(&magic)
        )));
    }
    let version = r.read_i32().map_err(|e| Error::corrupt("header", e.to_string()))?;
    let ver = SaveVersion::for_version(version)?;

    let mut content = ScopedMapper::new(content);

    let tags = r.region("meta", |r| ver.read_string_map(r))?;
    let header = MapHeader::from_tags(version, tags);
    tracing::debug!(
        version,
        name = %header.name,
        width = header.width,
        height = header.height,
        "map header read"
    );

    let mapper = r.region("content", |r| ver.read_content_header(r, &*content))?;
    content.set_temporary_mapper(Some(mapper));

    r.region("preview_map", |r| ver.read_map(r, &*content, &header, visitor))?;

    Ok(header)
}
