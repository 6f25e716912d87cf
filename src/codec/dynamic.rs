use std::io::Read;

use serde::Serialize;

use crate::content::{BlockRef, ContentResolver, Item, Liquid};
use crate::error::{Error, Result};
use super::reader::DataReader;
use super::types::{Point2, Team};

/// Content type ordinals used by typed content references
const CONTENT_ITEM: u8 = 0;
const CONTENT_BLOCK: u8 = 1;
const CONTENT_LIQUID: u8 = 4;

/// Object arrays may hold object arrays, but only this deep
const MAX_NESTING: usize = 8;

/// A block configuration value.
///
/// Version 0 schematics only produce `Int`, `Item`, `Liquid`, `Point` or
/// `None`; later versions store a self-describing value of any kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ConfigValue {
    #[default]
    None,
    Int(i32),
    Long(i64),
    Float(f32),
    String(Option<String>),
    #[serde(serialize_with = "serialize_item")]
    Item(Item),
    #[serde(serialize_with = "serialize_block")]
    Block(BlockRef),
    #[serde(serialize_with = "serialize_liquid")]
    Liquid(Liquid),
    /// Content of a kind this crate does not resolve
    Content { kind: u8, id: i16 },
    IntSeq(Vec<i32>),
    Point(Point2),
    Points(Vec<Point2>),
    TechNode { kind: u8, id: i16 },
    Bool(bool),
    Double(f64),
    Building(i32),
    LogicAccess(i16),
    Bytes(Vec<u8>),
    LegacyUnitCommand(u8),
    Bools(Vec<bool>),
    Unit(i32),
    Vec2s(Vec<(f32, f32)>),
    Vec2(f32, f32),
    #[serde(serialize_with = "serialize_team")]
    Team(Team),
    Ints(Vec<i32>),
    Objects(Vec<ConfigValue>),
    UnitCommand(u16),
    UnitStance(u16),
}

fn serialize_item<S: serde::Serializer>(item: &Item, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&item.name)
}

fn serialize_liquid<S: serde::Serializer>(liquid: &Liquid, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&liquid.name)
}

fn serialize_block<S: serde::Serializer>(block: &BlockRef, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&block.name)
}

fn serialize_team<S: serde::Serializer>(team: &Team, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u8(team.0)
}

impl ConfigValue {
    /// Read one self-describing value: a type tag followed by its payload
    pub fn read<R: Read>(reader: &mut DataReader<R>, content: &dyn ContentResolver) -> Result<Self> {
        Self::read_nested(reader, content, 0)
    }

    fn read_nested<R: Read>(reader: &mut DataReader<R>, content: &dyn ContentResolver, depth: usize) -> Result<Self> {
        let tag = reader.read_u8()?;
        Ok(match tag {
            0 => Self::None,
            1 => Self::Int(reader.read_i32()?),
            2 => Self::Long(reader.read_i64()?),
            3 => Self::Float(reader.read_f32()?),
            4 => {
                let present = reader.read_u8()? != 0;
                Self::String(if present { Some(reader.read_utf()?) } else { None })
            }
            5 => {
                let kind = reader.read_u8()?;
                let id = reader.read_i16()?;
                resolve_content(content, kind, id)
            }
            6 => {
                let len = reader.read_i16()?.max(0) as usize;
                Self::IntSeq(read_n(len, || reader.read_i32())?)
            }
            7 => Self::Point(Point2::new(reader.read_i32()?, reader.read_i32()?)),
            8 => {
                let len = reader.read_i8()?.max(0) as usize;
                Self::Points(read_n(len, || Ok(Point2::unpack(reader.read_i32()?)))?)
            }
            9 => Self::TechNode { kind: reader.read_u8()?, id: reader.read_i16()? },
            10 => Self::Bool(reader.read_bool()?),
            11 => Self::Double(reader.read_f64()?),
            12 => Self::Building(reader.read_i32()?),
            13 => Self::LogicAccess(reader.read_i16()?),
            14 => {
                let len = reader.read_i32()?;
                let len = usize::try_from(len)
                    .map_err(|_| Error::Io(format!("negative byte array length {len}")))?;
                Self::Bytes(reader.read_bytes(len)?)
            }
            15 => Self::LegacyUnitCommand(reader.read_u8()?),
            16 => {
                let len = reader.read_i32()?.max(0) as usize;
                Self::Bools(read_n(len, || reader.read_bool())?)
            }
            17 => Self::Unit(reader.read_i32()?),
            18 => {
                let len = reader.read_i16()?.max(0) as usize;
                Self::Vec2s(read_n(len, || Ok((reader.read_f32()?, reader.read_f32()?)))?)
            }
            19 => Self::Vec2(reader.read_f32()?, reader.read_f32()?),
            20 => Self::Team(Team(reader.read_u8()?)),
            21 => {
                let len = reader.read_i16()?.max(0) as usize;
                Self::Ints(read_n(len, || reader.read_i32())?)
            }
            22 => {
                if depth >= MAX_NESTING {
                    return Err(Error::Io(format!("object nesting deeper than {MAX_NESTING}")));
                }
                let len = reader.read_i32()?.max(0) as usize;
                let mut objects = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    objects.push(Self::read_nested(reader, content, depth + 1)?);
                }
                Self::Objects(objects)
            }
            23 => Self::UnitCommand(reader.read_u16()?),
            24 => Self::UnitStance(reader.read_u16()?),
            other => return Err(Error::Io(format!("unknown object type: {other}"))),
        })
    }
}

fn read_n<T>(len: usize, mut f: impl FnMut() -> std::io::Result<T>) -> Result<Vec<T>> {
    // Lengths come from untrusted input; let the stream run dry before
    // the allocation gets large.
    let mut out = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        out.push(f()?);
    }
    Ok(out)
}

fn resolve_content(content: &dyn ContentResolver, kind: u8, id: i16) -> ConfigValue {
    let found = u16::try_from(id).ok().and_then(|id| match kind {
        CONTENT_ITEM => content.item(id).map(ConfigValue::Item),
        CONTENT_BLOCK => content.block(id).map(ConfigValue::Block),
        CONTENT_LIQUID => content.liquid(id).map(ConfigValue::Liquid),
        _ => None,
    });
    match found {
        Some(value) => value,
        None if matches!(kind, CONTENT_ITEM | CONTENT_BLOCK | CONTENT_LIQUID) => {
            tracing::debug!(kind, id, "unresolved content reference in config");
            ConfigValue::None
        }
        None => ConfigValue::Content { kind, id },
    }
}
