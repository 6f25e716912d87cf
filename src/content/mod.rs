//! Content definitions and the resolver seam.
//!
//! The decoder never owns content: blocks, items and liquids come from a
//! `ContentResolver` supplied fully initialized by the caller.

pub mod registry;

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::Deserialize;

use crate::codec::{Color, Team};

pub use registry::{ContentDefinitions, ContentRegistry};

/// How a block interprets its configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    #[default]
    None,
    /// Sorters, unloaders, item sources
    Item,
    /// Liquid sources
    Liquid,
    /// Bridges and mass drivers; config is a relative link target
    Link,
    /// Lights and switches; config is a raw integer
    Toggle,
}

/// How a block's plan region is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visual {
    #[default]
    Plain,
    Rotated,
    /// Conveyor-style: region depends on which neighbours feed into it
    Autotile,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemStack {
    pub item: String,
    pub amount: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    #[serde(skip)]
    pub id: u16,
    pub name: String,
    #[serde(default = "default_size")]
    pub size: u8,
    #[serde(default = "default_map_color", rename = "color")]
    pub map_color: Color,
    #[serde(default)]
    pub solid: bool,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default = "default_true")]
    pub use_color: bool,
    #[serde(default)]
    pub legacy: bool,
    #[serde(default)]
    pub has_building: bool,
    #[serde(default)]
    pub rotate: bool,
    #[serde(default)]
    pub capability: Capability,
    #[serde(default)]
    pub visual: Visual,
    #[serde(default)]
    pub requirements: Vec<ItemStack>,
    #[serde(default, rename = "mod")]
    pub mod_name: Option<String>,
}

fn default_size() -> u8 {
    1
}

fn default_map_color() -> Color {
    Color::BLACK
}

fn default_true() -> bool {
    true
}

impl Block {
    pub const AIR: &'static str = "air";

    pub fn is_air(&self) -> bool {
        self.id == 0
    }

    pub fn rotates(&self) -> bool {
        self.rotate || matches!(self.visual, Visual::Rotated | Visual::Autotile)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

pub type BlockRef = Arc<Block>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Item {
    #[serde(skip)]
    pub id: u16,
    pub name: String,
    #[serde(default = "default_content_color")]
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Liquid {
    #[serde(skip)]
    pub id: u16,
    pub name: String,
    #[serde(default = "default_content_color")]
    pub color: Color,
}

fn default_content_color() -> Color {
    Color::WHITE
}

/// Content ids as numbered by one particular save, built from its content
/// header. Entries that no longer exist are `None`.
#[derive(Debug, Clone, Default)]
pub struct ContentMapper {
    pub blocks: Vec<Option<BlockRef>>,
    pub items: Vec<Option<Item>>,
    pub liquids: Vec<Option<Liquid>>,
}

pub trait ContentResolver: Send {
    fn block_by_name(&self, name: &str) -> Option<BlockRef>;

    /// Block by numeric id, through the temporary mapper when one is installed
    fn block(&self, id: u16) -> Option<BlockRef>;

    /// The air sentinel, id 0
    fn air(&self) -> BlockRef;

    fn item(&self, id: u16) -> Option<Item>;

    fn item_by_name(&self, name: &str) -> Option<Item>;

    fn liquid(&self, id: u16) -> Option<Liquid>;

    fn liquid_by_name(&self, name: &str) -> Option<Liquid>;

    /// Current name for an identifier renamed in an older game version
    fn legacy_alias<'a>(&'a self, name: &'a str) -> &'a str;

    fn team_color(&self, team: Team) -> Color;

    fn set_temporary_mapper(&mut self, mapper: Option<ContentMapper>);

    /// Resolve a stored block name, degrading to air for unknown or
    /// deprecated blocks.
    fn resolve_block(&self, name: &str) -> BlockRef {
        let current = self.legacy_alias(name);
        match self.block_by_name(current) {
            Some(block) if !block.legacy => block,
            Some(_) => {
                tracing::debug!(block = name, current, "legacy block replaced with air");
                self.air()
            }
            None => {
                tracing::debug!(block = name, "unknown block replaced with air");
                self.air()
            }
        }
    }

    /// Minimap color of a tile. Structures show their team, solid walls
    /// their own color, and open ground the overlay or floor color.
    fn color_for(&self, wall: &Block, floor: &Block, overlay: &Block, team: Team) -> Color {
        if wall.synthetic {
            return self.team_color(team);
        }
        if wall.solid {
            wall.map_color
        } else if !overlay.use_color {
            floor.map_color
        } else {
            overlay.map_color
        }
    }
}

/// Clears the resolver's temporary mapper when dropped, so an installed
/// mapper never outlives the decode that installed it.
pub struct ScopedMapper<'a> {
    content: &'a mut dyn ContentResolver,
}

impl<'a> ScopedMapper<'a> {
    pub fn new(content: &'a mut dyn ContentResolver) -> Self {
        Self { content }
    }
}

impl<'a> Deref for ScopedMapper<'a> {
    type Target = dyn ContentResolver + 'a;

    fn deref(&self) -> &Self::Target {
        self.content
    }
}

impl<'a> DerefMut for ScopedMapper<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.content
    }
}

impl Drop for ScopedMapper<'_> {
    fn drop(&mut self) {
        self.content.set_temporary_mapper(None);
    }
}
