use image::{Rgba, RgbaImage};

use crate::codec::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pixel ({x}, {y}) outside {width}x{height} canvas")]
pub struct OutOfBounds {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Straight-alpha RGBA raster with y pointing down.
///
/// Checked writes (`set`, `fill_rect`) report pixels that fall outside
/// the canvas; sprite and image draws clip silently.
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { image: RgbaImage::new(width, height) }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.image.get_pixel_checked(x, y).map(|&Rgba([r, g, b, a])| Color::new(r, g, b, a))
    }

    fn index(&self, x: i64, y: i64) -> Result<(u32, u32), OutOfBounds> {
        let (width, height) = self.image.dimensions();
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            return Err(OutOfBounds { x, y, width, height });
        }
        Ok((x as u32, y as u32))
    }

    /// Replace one pixel
    pub fn set(&mut self, x: i64, y: i64, color: Color) -> Result<(), OutOfBounds> {
        let (x, y) = self.index(x, y)?;
        self.image.put_pixel(x, y, Rgba(color.to_pixel()));
        Ok(())
    }

    /// Replace a rectangle. In-bounds pixels are written even when part
    /// of the rectangle is not; the first miss is returned.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Color) -> Result<(), OutOfBounds> {
        let mut first_miss = None;
        for py in y..y + h {
            for px in x..x + w {
                if let Err(miss) = self.set(px, py, color) {
                    first_miss.get_or_insert(miss);
                }
            }
        }
        first_miss.map_or(Ok(()), Err)
    }

    /// Source-over one pixel, clipped
    pub fn blend(&mut self, x: i64, y: i64, color: Color) {
        if let Ok((x, y)) = self.index(x, y) {
            let dst = self.image.get_pixel_mut(x, y);
            *dst = Rgba(blend_over(color.to_pixel(), dst.0));
        }
    }

    /// Outline covering `w + 1` by `h + 1` pixels, both corners inclusive
    pub fn outline_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Color) {
        if w < 0 || h < 0 {
            return;
        }
        for px in x..=x + w {
            self.blend(px, y, color);
            if h > 0 {
                self.blend(px, y + h, color);
            }
        }
        for py in y + 1..y + h {
            self.blend(x, py, color);
            if w > 0 {
                self.blend(x + w, py, color);
            }
        }
    }

    /// Source-over another raster with its top-left corner at `(x, y)`
    pub fn draw_image(&mut self, src: &RgbaImage, x: i64, y: i64) {
        for (sx, sy, pixel) in src.enumerate_pixels() {
            if pixel.0[3] == 0 {
                continue;
            }
            let (dx, dy) = (x + sx as i64, y + sy as i64);
            if let Ok((dx, dy)) = self.index(dx, dy) {
                let dst = self.image.get_pixel_mut(dx, dy);
                *dst = Rgba(blend_over(pixel.0, dst.0));
            }
        }
    }

    /// Draw a sprite region centered on `(cx, cy)`, stretched to `w` by `h`
    /// before rotating it counter-clockwise by `quarter_turns`. `flip_y`
    /// mirrors the region top to bottom. Nearest-neighbour sampled, each
    /// texel multiplied by `tint`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_region(
        &mut self,
        region: &RgbaImage,
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        quarter_turns: u8,
        flip_y: bool,
        tint: Color,
    ) {
        if w <= 0.0 || h <= 0.0 || region.width() == 0 || region.height() == 0 {
            return;
        }
        let q = quarter_turns % 4;
        let (half_x, half_y) = if q % 2 == 1 { (h / 2.0, w / 2.0) } else { (w / 2.0, h / 2.0) };
        let (rw, rh) = (region.width() as f32, region.height() as f32);

        let x0 = (cx - half_x).floor().max(0.0) as i64;
        let y0 = (cy - half_y).floor().max(0.0) as i64;
        let x1 = ((cx + half_x).ceil() as i64).min(self.width() as i64);
        let y1 = ((cy + half_y).ceil() as i64).min(self.height() as i64);

        for py in y0..y1 {
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                // Image space is y-down; rotate in y-up space.
                let (u, v) = (dx, -dy);
                let (u, v) = match q {
                    1 => (v, -u),
                    2 => (-u, -v),
                    3 => (-v, u),
                    _ => (u, v),
                };
                let v = if flip_y { -v } else { v };

                let fx = (u / w + 0.5) * rw;
                let fy = (0.5 - v / h) * rh;
                if fx < 0.0 || fy < 0.0 || fx >= rw || fy >= rh {
                    continue;
                }
                let texel = region.get_pixel(fx as u32, fy as u32).0;
                let tinted = Color::new(texel[0], texel[1], texel[2], texel[3]).mul(tint).to_pixel();
                if tinted[3] == 0 {
                    continue;
                }
                let dst = self.image.get_pixel_mut(px as u32, py as u32);
                *dst = Rgba(blend_over(tinted, dst.0));
            }
        }
    }
}

/// Porter-Duff source-over on straight (non-premultiplied) alpha
fn blend_over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    let sa = src[3] as f32 / 255.0;
    if sa >= 1.0 {
        return src;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }
    let channel = |s: u8, d: u8| {
        let c = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };
    [
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}
