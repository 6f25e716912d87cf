use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered string key/value metadata, as stored in both containers
pub type StringMap = IndexMap<String, String>;

/// Integer tile point, packed on the wire as `(x << 16) | (y & 0xFFFF)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Point2 {
    pub x: i32,
    pub y: i32,
}

impl Point2 {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn pack(x: i32, y: i32) -> i32 {
        ((x as i16 as i32) << 16) | (y & 0xFFFF)
    }

    /// X half of a packed point
    pub fn x_of(packed: i32) -> i16 {
        ((packed as u32) >> 16) as i16
    }

    /// Y half of a packed point
    pub fn y_of(packed: i32) -> i16 {
        (packed & 0xFFFF) as i16
    }

    pub fn unpack(packed: i32) -> Self {
        Self::new(Self::x_of(packed) as i32, Self::y_of(packed) as i32)
    }

    pub fn sub(self, x: i32, y: i32) -> Self {
        Self::new(self.x - x, self.y - y)
    }
}

/// Quarter-turn rotation (0 = +x, 1 = +y, 2 = -x, 3 = -y)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Direction {
    #[default]
    Right = 0,
    Up = 1,
    Left = 2,
    Down = 3,
}

impl Direction {
    pub fn from_rotation(rotation: u8) -> Self {
        match rotation % 4 {
            0 => Self::Right,
            1 => Self::Up,
            2 => Self::Left,
            _ => Self::Down,
        }
    }

    /// Unit step in tile space (y grows upward)
    pub fn to_vector(self) -> (i32, i32) {
        match self {
            Self::Right => (1, 0),
            Self::Up => (0, 1),
            Self::Left => (-1, 0),
            Self::Down => (0, -1),
        }
    }
}

/// Team id as stored in building entity data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Team(pub u8);

impl Team {
    pub const DERELICT: Team = Team(0);
    pub const SHARDED: Team = Team(1);
    pub const CRUX: Team = Team(2);
}

/// Color (RGBA, 0-255)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const CLEAR: Color = Color::new(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn from_rgba8888(v: u32) -> Self {
        let [r, g, b, a] = v.to_be_bytes();
        Self { r, g, b, a }
    }

    pub fn rgba8888(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }

    pub fn argb8888(self) -> u32 {
        u32::from_be_bytes([self.a, self.r, self.g, self.b])
    }

    /// Parse `rrggbb` or `rrggbbaa`, with or without a leading `#`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let v = u32::from_str_radix(hex, 16).ok()?;
        match hex.len() {
            6 => Some(Self::from_rgba8888((v << 8) | 0xFF)),
            8 => Some(Self::from_rgba8888(v)),
            _ => None,
        }
    }

    /// Lowercase `rrggbbaa`
    pub fn to_hex(self) -> String {
        format!("{:08x}", self.rgba8888())
    }

    pub fn to_pixel(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Component-wise multiply, used for tinting sprite regions
    pub fn mul(self, other: Color) -> Self {
        let m = |a: u8, b: u8| ((a as u16 * b as u16 + 127) / 255) as u8;
        Self::new(m(self.r, other.r), m(self.g, other.g), m(self.b, other.b), m(self.a, other.a))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| format!("invalid color: {value}"))
    }
}
