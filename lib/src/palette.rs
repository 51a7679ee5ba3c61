//! Two-colour palette parsing and nearest-colour quantization

/// Parse `#rrggbb` (the `#` is optional, hex digits in either case).
///
/// Anything else resolves to black rather than failing.
pub fn parse_hex_color(value: &str) -> [u8; 3] {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return [0, 0, 0];
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
    [channel(0), channel(2), channel(4)]
}

/// Format a colour as lowercase `#rrggbb`
pub fn to_hex_color(color: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// Convert an 8-bit colour to normalized [0, 1] channels
#[inline]
pub fn normalize(color: [u8; 3]) -> [f32; 3] {
    [
        color[0] as f32 / 255.0,
        color[1] as f32 / 255.0,
        color[2] as f32 / 255.0,
    ]
}

/// Convert normalized channels back to 8-bit, rounding to nearest
#[inline]
pub fn denormalize(color: [f32; 3]) -> [u8; 3] {
    [
        (color[0] * 255.0).round().clamp(0.0, 255.0) as u8,
        (color[1] * 255.0).round().clamp(0.0, 255.0) as u8,
        (color[2] * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

/// Two reference colours in normalized space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    colors: [[f32; 3]; 2],
}

impl Palette {
    pub fn new(color1: [u8; 3], color2: [u8; 3]) -> Self {
        Self {
            colors: [normalize(color1), normalize(color2)],
        }
    }

    pub fn colors(&self) -> &[[f32; 3]; 2] {
        &self.colors
    }

    /// Palette entry closest to `color` by squared Euclidean distance.
    ///
    /// The best match is only replaced on a strictly smaller distance, so an
    /// exact tie resolves to the first colour.
    pub fn nearest(&self, color: [f32; 3]) -> [f32; 3] {
        let mut best = self.colors[0];
        let mut best_distance = f32::INFINITY;

        for candidate in &self.colors {
            let dr = color[0] - candidate[0];
            let dg = color[1] - candidate[1];
            let db = color[2] - candidate[2];
            let distance = dr * dr + dg * dg + db * db;
            if distance < best_distance {
                best_distance = distance;
                best = *candidate;
            }
        }

        best
    }
}
