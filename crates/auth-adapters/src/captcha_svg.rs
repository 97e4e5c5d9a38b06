//! SVG captcha rendering.
//!
//! Digits are drawn as jittered seven-segment strokes, each glyph rotated
//! and coloured independently, under a few random noise curves. The output
//! contains no text nodes, so the solution cannot be read from the markup.

use std::fmt::Write;

use domains::CaptchaRenderer;
use rand::Rng;

/// Segment endpoints in a unit cell (x right, y down): a b c d e f g.
const SEGMENTS: [((f32, f32), (f32, f32)); 7] = [
    ((0.0, 0.0), (1.0, 0.0)),
    ((1.0, 0.0), (1.0, 0.5)),
    ((1.0, 0.5), (1.0, 1.0)),
    ((0.0, 1.0), (1.0, 1.0)),
    ((0.0, 0.5), (0.0, 1.0)),
    ((0.0, 0.0), (0.0, 0.5)),
    ((0.0, 0.5), (1.0, 0.5)),
];

/// Lit segments per digit, bit 0 = a ... bit 6 = g.
const DIGIT_MASKS: [u8; 10] = [
    0b011_1111, 0b000_0110, 0b101_1011, 0b100_1111, 0b110_0110,
    0b110_1101, 0b111_1101, 0b000_0111, 0b111_1111, 0b110_1111,
];

#[derive(Debug, Clone)]
pub struct SvgCaptchaRenderer {
    pub width: u32,
    pub height: u32,
    /// Number of noise curves drawn over the glyphs
    pub noise: usize,
}

impl Default for SvgCaptchaRenderer {
    fn default() -> Self {
        Self {
            width: 150,
            height: 50,
            noise: 2,
        }
    }
}

fn random_color(rng: &mut impl Rng) -> String {
    format!(
        "#{:02x}{:02x}{:02x}",
        rng.gen_range(30..170u8),
        rng.gen_range(30..170u8),
        rng.gen_range(30..170u8)
    )
}

impl SvgCaptchaRenderer {
    fn glyph(&self, rng: &mut impl Rng, digit: u8, slot: usize, slots: usize) -> String {
        let cell_w = self.width as f32 / slots as f32;
        let glyph_w = cell_w * 0.45;
        let glyph_h = self.height as f32 * 0.6;
        let x0 = cell_w * slot as f32 + (cell_w - glyph_w) / 2.0 + rng.gen_range(-3.0f32..3.0);
        let y0 = (self.height as f32 - glyph_h) / 2.0 + rng.gen_range(-4.0f32..4.0);
        let angle: f32 = rng.gen_range(-18.0..18.0);
        let (cx, cy) = (x0 + glyph_w / 2.0, y0 + glyph_h / 2.0);

        let mut d = String::new();
        let mask = DIGIT_MASKS[usize::from(digit % 10)];
        for (i, ((x1, y1), (x2, y2))) in SEGMENTS.iter().enumerate() {
            if mask & (1 << i) == 0 {
                continue;
            }
            let mut jitter = || rng.gen_range(-1.5f32..1.5);
            let _ = write!(
                d,
                "M{:.1} {:.1}L{:.1} {:.1}",
                x0 + x1 * glyph_w + jitter(),
                y0 + y1 * glyph_h + jitter(),
                x0 + x2 * glyph_w + jitter(),
                y0 + y2 * glyph_h + jitter(),
            );
        }

        format!(
            r#"<path d="{d}" fill="none" stroke="{color}" stroke-width="{sw:.1}" stroke-linecap="round" transform="rotate({angle:.1} {cx:.1} {cy:.1})"/>"#,
            color = random_color(&mut *rng),
            sw = rng.gen_range(2.5f32..4.0),
        )
    }

    fn noise_curve(&self, rng: &mut impl Rng) -> String {
        let (w, h) = (self.width as f32, self.height as f32);
        format!(
            r#"<path d="M{:.1} {:.1}Q{:.1} {:.1} {:.1} {:.1}" fill="none" stroke="{}" stroke-width="1.5"/>"#,
            rng.gen_range(0.0..w * 0.2),
            rng.gen_range(0.0..h),
            rng.gen_range(w * 0.3..w * 0.7),
            rng.gen_range(0.0..h),
            rng.gen_range(w * 0.8..w),
            rng.gen_range(0.0..h),
            random_color(rng),
        )
    }
}

impl CaptchaRenderer for SvgCaptchaRenderer {
    fn render(&self, solution: &str) -> String {
        let mut rng = rand::thread_rng();
        let digits: Vec<u8> = solution
            .bytes()
            .filter(u8::is_ascii_digit)
            .map(|b| b - b'0')
            .collect();
        let slots = digits.len().max(1);

        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0,0,{w},{h}">"#,
            w = self.width,
            h = self.height,
        );
        for (slot, digit) in digits.iter().enumerate() {
            svg.push_str(&self.glyph(&mut rng, *digit, slot, slots));
        }
        for _ in 0..self.noise {
            svg.push_str(&self.noise_curve(&mut rng));
        }
        svg.push_str("</svg>");
        svg
    }
}
