use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use ttf_parser::Face;

use crate::config::LayoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextSize {
    pub width: f32,
    pub height: f32,
}

/// Text measurement capability handed to the layout engine. Implementations
/// must be safe for concurrent reads; the engine never loads fonts itself.
pub trait TextMeasure: Send + Sync {
    /// Rendered size of `text` in the measurer's font at `font_size`.
    /// Lines are separated by `\n`.
    fn measure(&self, text: &str, font_size: f32) -> TextSize;
}

static SYSTEM_METRICS: Lazy<FontMetrics> = Lazy::new(|| {
    let config = LayoutConfig::default();
    FontMetrics::load(&config.font_family, config.font_bold, config.label_line_height)
});

/// Shared measurer for the default font, initialized on first use.
pub fn system_metrics() -> &'static FontMetrics {
    &SYSTEM_METRICS
}

/// Deterministic measurer using per-character width factors calibrated on a
/// common sans-serif face.
#[derive(Debug, Clone, Copy)]
pub struct ApproximateMetrics {
    line_height: f32,
    bold: bool,
}

impl ApproximateMetrics {
    pub fn new(line_height: f32, bold: bool) -> Self {
        Self { line_height, bold }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(config.label_line_height, config.font_bold)
    }

    fn line_width(&self, line: &str, font_size: f32) -> f32 {
        let weight = if self.bold { BOLD_WIDTH_FACTOR } else { 1.0 };
        line.chars().map(char_width_factor).sum::<f32>() * font_size * weight
    }
}

impl Default for ApproximateMetrics {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default())
    }
}

impl TextMeasure for ApproximateMetrics {
    fn measure(&self, text: &str, font_size: f32) -> TextSize {
        measure_lines(text, font_size, self.line_height, |line| {
            self.line_width(line, font_size)
        })
    }
}

/// Bold glyphs run roughly this much wider than regular ones.
const BOLD_WIDTH_FACTOR: f32 = 1.08;

fn measure_lines(
    text: &str,
    font_size: f32,
    line_height: f32,
    mut width_of: impl FnMut(&str) -> f32,
) -> TextSize {
    if font_size <= 0.0 {
        return TextSize::default();
    }
    let mut lines = 0usize;
    let mut width = 0.0f32;
    for line in text.split('\n') {
        lines += 1;
        width = width.max(width_of(line.trim()));
    }
    TextSize {
        width: width.max(0.0),
        height: lines.max(1) as f32 * font_size * line_height,
    }
}

pub(crate) fn char_width_factor(ch: char) -> f32 {
    match ch {
        ' ' => 0.278,
        '\\' | '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '{' | '}' => 0.300,
        '-' | '+' => 0.333,
        'A' | 'B' | 'E' | 'K' | 'P' | 'S' | 'V' | 'X' | 'Y' => 0.667,
        'C' | 'D' | 'H' | 'N' | 'R' | 'U' => 0.722,
        'F' | 'T' | 'Z' => 0.611,
        'G' | 'O' | 'Q' => 0.778,
        'I' => 0.278,
        'J' => 0.500,
        'L' => 0.556,
        'M' => 0.833,
        'W' => 0.944,
        'a' | 'b' | 'd' | 'e' | 'g' | 'h' | 'n' | 'o' | 'p' | 'q' | 'u' => 0.556,
        'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' => 0.500,
        'f' | 't' => 0.278,
        'i' | 'j' | 'l' => 0.222,
        'm' => 0.833,
        'r' => 0.333,
        'w' => 0.722,
        '0'..='9' => 0.556,
        '@' => 1.015,
        '#' | '%' | '&' => 0.889,
        _ => 0.600,
    }
}

/// Measures with real glyph advances of a system face. ASCII advances are
/// read once at load time, so measuring needs no mutable state or lock.
pub struct FontMetrics {
    face: Option<LoadedFace>,
    fallback: ApproximateMetrics,
    line_height: f32,
}

struct LoadedFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascii_advances: [u16; 128],
}

impl FontMetrics {
    pub fn load(font_family: &str, bold: bool, line_height: f32) -> Self {
        let face = load_face(font_family, bold);
        if face.is_none() {
            log::warn!("no system face for `{font_family}`; using approximate text metrics");
        }
        Self {
            face,
            fallback: ApproximateMetrics::new(line_height, bold),
            line_height,
        }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::load(
            &config.font_family,
            config.font_bold,
            config.label_line_height,
        )
    }

    pub fn has_face(&self) -> bool {
        self.face.is_some()
    }
}

impl TextMeasure for FontMetrics {
    fn measure(&self, text: &str, font_size: f32) -> TextSize {
        let Some(face) = &self.face else {
            return self.fallback.measure(text, font_size);
        };
        measure_lines(text, font_size, self.line_height, |line| {
            face.line_width(line, font_size)
        })
    }
}

impl LoadedFace {
    fn line_width(&self, line: &str, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * 0.56;

        if line.is_ascii() {
            return line
                .bytes()
                .map(|byte| match self.ascii_advances[byte as usize] {
                    0 => fallback,
                    advance => advance as f32 * scale,
                })
                .sum();
        }

        let Ok(face) = Face::parse(&self.data, self.index) else {
            return line.chars().count() as f32 * fallback;
        };
        line.chars()
            .map(|ch| {
                face.glyph_index(ch)
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .map(|advance| advance as f32 * scale)
                    .unwrap_or(fallback)
            })
            .sum()
    }
}

fn load_face(font_family: &str, bold: bool) -> Option<LoadedFace> {
    let names: Vec<String> = font_family
        .split(',')
        .map(|part| part.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|name| !name.is_empty())
        .collect();
    let mut families: Vec<Family<'_>> = names
        .iter()
        .map(|name| match name.to_ascii_lowercase().as_str() {
            "serif" => Family::Serif,
            "sans-serif" | "system-ui" => Family::SansSerif,
            "monospace" => Family::Monospace,
            _ => Family::Name(name.as_str()),
        })
        .collect();
    if families.is_empty() {
        families.push(Family::SansSerif);
    }

    let mut db = Database::new();
    db.load_system_fonts();
    let query = Query {
        families: &families,
        weight: if bold { Weight::BOLD } else { Weight::NORMAL },
        stretch: Stretch::Normal,
        style: Style::Normal,
    };
    let id = db.query(&query)?;
    let mut loaded = None;
    db.with_face_data(id, |data, index| {
        let Ok(face) = Face::parse(data, index) else {
            return;
        };
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
            }
        }
        loaded = Some(LoadedFace {
            data: data.to_vec(),
            index,
            units_per_em: face.units_per_em().max(1),
            ascii_advances,
        });
    });
    loaded
}
