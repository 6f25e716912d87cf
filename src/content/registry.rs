use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::codec::{Color, Team};
use crate::error::{Error, Result};
use super::{Block, BlockRef, ContentMapper, ContentResolver, Item, Liquid};

/// Renamed content from older game versions: `(old, current)`
const LEGACY_ALIASES: &[(&str, &str)] = &[
    ("dart-mech-pad", "legacy-mech-pad"),
    ("dart-ship-pad", "legacy-mech-pad"),
    ("javelin-ship-pad", "legacy-mech-pad"),
    ("trident-ship-pad", "legacy-mech-pad"),
    ("glaive-ship-pad", "legacy-mech-pad"),
    ("alpha-mech-pad", "legacy-mech-pad"),
    ("tau-mech-pad", "legacy-mech-pad"),
    ("omega-mech-pad", "legacy-mech-pad"),
    ("delta-mech-pad", "legacy-mech-pad"),
    ("draug-factory", "legacy-unit-factory"),
    ("spirit-factory", "legacy-unit-factory"),
    ("phantom-factory", "legacy-unit-factory"),
    ("wraith-factory", "legacy-unit-factory"),
    ("ghoul-factory", "legacy-unit-factory-air"),
    ("revenant-factory", "legacy-unit-factory-air"),
    ("dagger-factory", "legacy-unit-factory"),
    ("crawler-factory", "legacy-unit-factory"),
    ("titan-factory", "legacy-unit-factory-ground"),
    ("fortress-factory", "legacy-unit-factory-ground"),
    ("mass-conveyor", "payload-conveyor"),
    ("vestige", "scepter"),
    ("turbine-generator", "steam-generator"),
    ("rocks", "stone-wall"),
    ("sporerocks", "spore-wall"),
    ("icerocks", "ice-wall"),
    ("dunerocks", "dune-wall"),
    ("sandrocks", "sand-wall"),
    ("shalerocks", "shale-wall"),
    ("snowrocks", "snow-wall"),
    ("saltrocks", "salt-wall"),
    ("dirtwall", "dirt-wall"),
    ("ignarock", "basalt"),
    ("holostone", "dacite"),
    ("holostone-wall", "dacite-wall"),
    ("rock", "boulder"),
    ("snowrock", "snow-boulder"),
    ("cliffs", "stone-wall"),
    ("craters", "crater-stone"),
    ("deepwater", "deep-water"),
    ("water", "shallow-water"),
    ("sand", "sand-floor"),
    ("slag", "molten-slag"),
    ("cryofluidmixer", "cryofluid-mixer"),
    ("block-forge", "constructor"),
    ("block-unloader", "payload-unloader"),
    ("block-loader", "payload-loader"),
    ("thermal-pump", "impulse-pump"),
    ("alloy-smelter", "surge-smelter"),
    ("steam-vent", "rhyolite-vent"),
    ("fabricator", "tank-fabricator"),
    ("basic-reconstructor", "refabricator"),
];

/// derelict, sharded, crux, malis, green, blue
const TEAM_COLORS: [u32; 6] = [0x4d4e58ff, 0xffd37fff, 0xf25555ff, 0xa27ce5ff, 0x54d67dff, 0x6c87fdff];

/// On-disk content definitions. List position is the content id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentDefinitions {
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub liquids: Vec<Liquid>,
    #[serde(default)]
    pub teams: HashMap<u8, Color>,
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

/// Data-driven content resolver
pub struct ContentRegistry {
    blocks: Vec<BlockRef>,
    block_ids: HashMap<String, usize>,
    items: Vec<Item>,
    liquids: Vec<Liquid>,
    teams: HashMap<u8, Color>,
    aliases: HashMap<String, String>,
    mapper: Option<ContentMapper>,
}

impl ContentRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Content(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let defs: ContentDefinitions =
            serde_json::from_str(text).map_err(|e| Error::Content(e.to_string()))?;
        Self::from_definitions(defs)
    }

    pub fn from_definitions(defs: ContentDefinitions) -> Result<Self> {
        match defs.blocks.first() {
            Some(first) if first.name == Block::AIR => {}
            _ => return Err(Error::Content("block 0 must be air".into())),
        }
        if defs.blocks.len() > u16::MAX as usize {
            return Err(Error::Content(format!("too many blocks: {}", defs.blocks.len())));
        }

        let mut blocks = Vec::with_capacity(defs.blocks.len());
        let mut block_ids = HashMap::with_capacity(defs.blocks.len());
        for (id, mut block) in defs.blocks.into_iter().enumerate() {
            block.id = id as u16;
            if id == 0 {
                // Air never contributes a color.
                block.map_color = Color::CLEAR;
                block.use_color = false;
                block.solid = false;
                block.synthetic = false;
            }
            if block_ids.insert(block.name.clone(), id).is_some() {
                return Err(Error::Content(format!("duplicate block name: {}", block.name)));
            }
            blocks.push(Arc::new(block));
        }

        let items = defs.items.into_iter().enumerate()
            .map(|(id, item)| Item { id: id as u16, ..item })
            .collect();
        let liquids = defs.liquids.into_iter().enumerate()
            .map(|(id, liquid)| Liquid { id: id as u16, ..liquid })
            .collect();

        let mut aliases: HashMap<String, String> = LEGACY_ALIASES.iter()
            .map(|(old, new)| (old.to_string(), new.to_string()))
            .collect();
        aliases.extend(defs.aliases);

        tracing::info!(blocks = blocks.len(), aliases = aliases.len(), "content registry loaded");

        Ok(Self {
            blocks,
            block_ids,
            items,
            liquids,
            teams: defs.teams,
            aliases,
            mapper: None,
        })
    }

    pub fn blocks(&self) -> &[BlockRef] {
        &self.blocks
    }

    pub fn has_mapper(&self) -> bool {
        self.mapper.is_some()
    }
}

impl ContentResolver for ContentRegistry {
    fn block_by_name(&self, name: &str) -> Option<BlockRef> {
        self.block_ids.get(name).map(|&id| self.blocks[id].clone())
    }

    fn block(&self, id: u16) -> Option<BlockRef> {
        match &self.mapper {
            Some(mapper) => mapper.blocks.get(id as usize).cloned().flatten(),
            None => self.blocks.get(id as usize).cloned(),
        }
    }

    fn air(&self) -> BlockRef {
        self.blocks[0].clone()
    }

    fn item(&self, id: u16) -> Option<Item> {
        match &self.mapper {
            Some(mapper) => mapper.items.get(id as usize).cloned().flatten(),
            None => self.items.get(id as usize).cloned(),
        }
    }

    fn item_by_name(&self, name: &str) -> Option<Item> {
        self.items.iter().find(|i| i.name == name).cloned()
    }

    fn liquid(&self, id: u16) -> Option<Liquid> {
        match &self.mapper {
            Some(mapper) => mapper.liquids.get(id as usize).cloned().flatten(),
            None => self.liquids.get(id as usize).cloned(),
        }
    }

    fn liquid_by_name(&self, name: &str) -> Option<Liquid> {
        self.liquids.iter().find(|l| l.name == name).cloned()
    }

    fn legacy_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    fn team_color(&self, team: Team) -> Color {
        if let Some(&color) = self.teams.get(&team.0) {
            return color;
        }
        match TEAM_COLORS.get(team.0 as usize) {
            Some(&rgba) => Color::from_rgba8888(rgba),
            None => generated_team_color(team.0),
        }
    }

    fn set_temporary_mapper(&mut self, mapper: Option<ContentMapper>) {
        self.mapper = mapper;
    }
}

/// Stable color for teams without a fixed palette entry
fn generated_team_color(id: u8) -> Color {
    let hue = (id as f32 * 137.508) % 360.0;
    let (s, v) = (0.8_f32, 0.9_f32);
    let c = v * s;
    let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match (hue / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Color::rgb(to_u8(r), to_u8(g), to_u8(b))
}
