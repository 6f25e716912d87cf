use base64::Engine;
use image::{ImageEncoder, RgbaImage};

use crate::error::{Error, Result};

/// Encode a raster as PNG bytes
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(image.as_raw(), image.width(), image.height(), image::ExtendedColorType::Rgba8)
        .map_err(|e| Error::Image(e.to_string()))?;
    Ok(buf)
}

/// PNG bytes as standard padded base64, the form previews are returned in
pub fn to_base64_png(image: &RgbaImage) -> Result<String> {
    Ok(base64::engine::general_purpose::STANDARD.encode(encode_png(image)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_png_round_trips_pixels() {
        let mut image = RgbaImage::new(3, 2);
        image.put_pixel(2, 1, Rgba([10, 20, 30, 40]));
        let png = encode_png(&image).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1), &Rgba([10, 20, 30, 40]));
    }

    #[test]
    fn test_base64_is_standard_alphabet() {
        let encoded = to_base64_png(&RgbaImage::new(1, 1)).unwrap();
        assert!(encoded.starts_with("iVBORw0KGgo"));
        let bytes = base64::engine::general_purpose::STANDARD.decode(&encoded).unwrap();
        assert_eq!(bytes, encode_png(&RgbaImage::new(1, 1)).unwrap());
    }
}
