//! Raster drawing of the world onto a fixed-size canvas.

use std::io::Cursor;

use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::Result;

pub(crate) const BACKGROUND: Rgba<u8> = Rgba([26, 26, 46, 255]);
pub(crate) const SURVIVOR: Rgba<u8> = Rgba([255, 77, 77, 255]);
pub(crate) const GOAL: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub(crate) const HEADING: Rgba<u8> = Rgba([16, 16, 16, 255]);

/// Parse a `#rrggbb` color.
pub(crate) fn parse_color(hex: &str) -> Option<Rgba<u8>> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

/// Scale a background map to the viewport.
pub(crate) fn fit_background(map: DynamicImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(&map.to_rgba8(), width, height, imageops::FilterType::Triangle)
}

/// A frame being drawn, addressed in world meters.
pub(crate) struct Canvas {
    image: RgbaImage,
    px_per_m_x: f64,
    px_per_m_y: f64,
    world_height: f64,
}

impl Canvas {
    /// Start a frame from the background (or a flat fill when there is none).
    pub(crate) fn new(
        background: Option<&RgbaImage>,
        viewport: (u32, u32),
        world_size: (f64, f64),
    ) -> Self {
        let (width, height) = viewport;
        let image = match background {
            Some(bg) if bg.dimensions() == viewport => bg.clone(),
            _ => RgbaImage::from_pixel(width, height, BACKGROUND),
        };
        Self {
            image,
            px_per_m_x: width as f64 / world_size.0,
            px_per_m_y: height as f64 / world_size.1,
            world_height: world_size.1,
        }
    }

    /// World point to pixel center (origin top-left).
    fn to_px(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.px_per_m_x, (self.world_height - y) * self.px_per_m_y)
    }

    fn put(&mut self, px: i64, py: i64, color: Rgba<u8>) {
        let (w, h) = self.image.dimensions();
        if (0..i64::from(w)).contains(&px) && (0..i64::from(h)).contains(&py) {
            self.image.put_pixel(px as u32, py as u32, color);
        }
    }

    /// Filled disc of `radius` meters.
    pub(crate) fn fill_circle(&mut self, x: f64, y: f64, radius: f64, color: Rgba<u8>) {
        self.annulus(x, y, 0.0, radius, color);
    }

    /// Circle outline `thickness` pixels wide.
    pub(crate) fn ring(&mut self, x: f64, y: f64, radius: f64, thickness: f64, color: Rgba<u8>) {
        let outer = radius * self.px_per_m_x.min(self.px_per_m_y);
        let inner_m = ((outer - thickness).max(0.0)) / self.px_per_m_x.min(self.px_per_m_y);
        self.annulus(x, y, inner_m, radius, color);
    }

    fn annulus(&mut self, x: f64, y: f64, inner: f64, outer: f64, color: Rgba<u8>) {
        let (cx, cy) = self.to_px(x, y);
        let scale = self.px_per_m_x.min(self.px_per_m_y);
        let (r_in, r_out) = (inner * scale, outer * scale);
        let reach = r_out.ceil() as i64;
        let (cxi, cyi) = (cx.round() as i64, cy.round() as i64);

        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let d = ((dx * dx + dy * dy) as f64).sqrt();
                if d <= r_out && d >= r_in {
                    self.put(cxi + dx, cyi + dy, color);
                }
            }
        }
    }

    /// Straight segment between two world points.
    pub(crate) fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgba<u8>) {
        let (x0, y0) = self.to_px(from.0, from.1);
        let (x1, y1) = self.to_px(to.0, to.1);
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as i64;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let px = (x0 + (x1 - x0) * t).round() as i64;
            let py = (y0 + (y1 - y0) * t).round() as i64;
            self.put(px, py, color);
        }
    }

    /// Encode the frame as PNG.
    pub(crate) fn encode_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    #[cfg(test)]
    pub(crate) fn pixel_at(&self, x: f64, y: f64) -> Rgba<u8> {
        let (px, py) = self.to_px(x, y);
        *self.image.get_pixel(px.round() as u32, py.round() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_color("#00d9ff"), Some(Rgba([0, 217, 255, 255])));
        assert_eq!(parse_color("00d9ff"), None);
        assert_eq!(parse_color("#00d9f"), None);
        assert_eq!(parse_color("#zzzzzz"), None);
    }

    #[test]
    fn vertical_axis_is_flipped() {
        let mut canvas = Canvas::new(None, (800, 600), (8.0, 6.0));
        canvas.fill_circle(1.0, 1.0, 0.15, SURVIVOR);

        // (1 m, 1 m) sits 100 px from the left and 100 px above the bottom
        assert_eq!(canvas.pixel_at(1.0, 1.0), SURVIVOR);
        assert_eq!(*canvas.image.get_pixel(100, 500), SURVIVOR);
        assert_eq!(*canvas.image.get_pixel(100, 100), BACKGROUND);
    }

    #[test]
    fn drawing_off_canvas_is_clipped() {
        let mut canvas = Canvas::new(None, (80, 60), (8.0, 6.0));
        canvas.fill_circle(-1.0, 7.0, 0.5, SURVIVOR);
        canvas.line((0.0, 0.0), (10.0, 10.0), HEADING);
        assert!(!canvas.encode_png().unwrap().is_empty());
    }

    #[test]
    fn coordinates_past_u32_do_not_wrap() {
        let mut canvas = Canvas::new(None, (80, 60), (8.0, 6.0));
        let wrapped = (1i64 << 32) + 5;
        canvas.put(wrapped, 5, SURVIVOR);
        canvas.put(5, wrapped, SURVIVOR);
        canvas.put(wrapped, wrapped, SURVIVOR);
        assert!(canvas.image.pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn encodes_png_signature() {
        let canvas = Canvas::new(None, (16, 12), (8.0, 6.0));
        let png = canvas.encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
