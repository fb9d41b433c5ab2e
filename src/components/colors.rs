//! Color selection panel — HSV picker, palette strip, palette file import.

use std::path::Path;

use eframe::egui;
use egui::Color32;

// ============================================================================
// COLORS PANEL
// ============================================================================

/// Primary drawing color plus the palette strip.
///
/// The HSV sliders are the source of truth while the user drags them; the
/// separate hue/saturation fields survive round-trips through black and
/// grey, where RGB alone would forget them.
pub struct ColorsPanel {
    hue: f32,
    saturation: f32,
    value: f32,
    alpha: u8,
    /// Palette chips shown under the picker.
    pub palette: Vec<Color32>,
    /// Set by `show` when the user clicks "Load palette…"; the app resets
    /// it after opening the file dialog.
    pub want_load_palette: bool,
}

impl Default for ColorsPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorsPanel {
    pub fn new() -> Self {
        Self {
            hue: 0.0,
            saturation: 0.0,
            value: 0.0,
            alpha: 255,
            palette: default_palette(),
            want_load_palette: false,
        }
    }

    pub fn primary_color(&self) -> Color32 {
        hsv_to_color(self.hue, self.saturation, self.value, self.alpha)
    }

    pub fn set_primary(&mut self, color: Color32) {
        let [h, s, v] = color_to_hsv(color);
        // Keep the previous hue/saturation when the new color degenerates
        // (black loses hue and saturation, white and greys lose hue).
        if s > 0.0 && v > 0.0 {
            self.hue = h;
        }
        if v > 0.0 {
            self.saturation = s;
        }
        self.value = v;
        self.alpha = color.a();
    }

    /// Replace the palette (after a successful file import).
    pub fn set_palette(&mut self, colors: Vec<Color32>) {
        if !colors.is_empty() {
            self.palette = colors;
        }
    }

    pub fn show(&mut self, ui: &mut egui::Ui) {
        ui.label("Color");

        // Preview swatch.
        let preview = self.primary_color();
        let (rect, _) = ui.allocate_exact_size(egui::vec2(ui.available_width(), 28.0), egui::Sense::hover());
        ui.painter().rect_filled(rect, 3.0, preview);
        ui.painter().rect_stroke(rect, 3.0, egui::Stroke::new(1.0, ui.visuals().weak_text_color()));

        ui.add(egui::Slider::new(&mut self.hue, 0.0..=359.9).text("H"));
        ui.add(egui::Slider::new(&mut self.saturation, 0.0..=1.0).text("S"));
        ui.add(egui::Slider::new(&mut self.value, 0.0..=1.0).text("V"));
        ui.add(egui::Slider::new(&mut self.alpha, 0..=255).text("A"));

        ui.separator();
        ui.label("Palette");
        let chip = 18.0;
        ui.horizontal_wrapped(|ui| {
            ui.spacing_mut().item_spacing = egui::vec2(3.0, 3.0);
            let palette = self.palette.clone();
            for color in palette {
                let (rect, response) =
                    ui.allocate_exact_size(egui::vec2(chip, chip), egui::Sense::click());
                ui.painter().rect_filled(rect, 2.0, color);
                let response = response.on_hover_text(format!(
                    "#{:02X}{:02X}{:02X}{:02X}",
                    color.r(),
                    color.g(),
                    color.b(),
                    color.a()
                ));
                if response.clicked() {
                    self.set_primary(color);
                }
            }
        });

        if ui.button("Load palette…").clicked() {
            self.want_load_palette = true;
        }
    }
}

/// Classic 16-color starter palette.
fn default_palette() -> Vec<Color32> {
    [
        (0x00, 0x00, 0x00),
        (0xFF, 0xFF, 0xFF),
        (0x9D, 0x9D, 0x9D),
        (0xBE, 0x26, 0x33),
        (0xE0, 0x6F, 0x8B),
        (0x49, 0x3C, 0x2B),
        (0xA4, 0x64, 0x22),
        (0xEB, 0x89, 0x31),
        (0xF7, 0xE2, 0x6B),
        (0x2F, 0x48, 0x4E),
        (0x44, 0x89, 0x1A),
        (0xA3, 0xCE, 0x27),
        (0x1B, 0x26, 0x32),
        (0x00, 0x57, 0x84),
        (0x31, 0xA2, 0xF2),
        (0xB2, 0xDC, 0xEF),
    ]
    .into_iter()
    .map(|(r, g, b)| Color32::from_rgb(r, g, b))
    .collect()
}

// -- Colour-space conversions -----------------------------------

/// 6-sector HSV→RGB.  `h` in degrees (wrapped into [0,360)), `s`/`v` in
/// [0,1], alpha carried through unchanged.
pub fn hsv_to_color(h: f32, s: f32, v: f32, a: u8) -> Color32 {
    let h = h.rem_euclid(360.0);
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match (h / 60.0) as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Color32::from_rgba_unmultiplied(
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
        a,
    )
}

/// RGB→HSV; returns `[hue_degrees, saturation, value]`.
pub fn color_to_hsv(color: Color32) -> [f32; 3] {
    let r = color.r() as f32 / 255.0;
    let g = color.g() as f32 / 255.0;
    let b = color.b() as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;

    let h = if d == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / d).rem_euclid(6.0)
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    let s = if max == 0.0 { 0.0 } else { d / max };
    [h * 60.0, s, max]
}

// ============================================================================
// PALETTE FILE IMPORT — Aseprite container
// ============================================================================

/// Error type for palette file parsing.
#[derive(Debug)]
pub enum PaletteError {
    Io(std::io::Error),
    /// Missing magic numbers, truncated data, or inconsistent sizes.
    Format(String),
}

impl std::fmt::Display for PaletteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaletteError::Io(e) => write!(f, "I/O error: {}", e),
            PaletteError::Format(e) => write!(f, "Palette format error: {}", e),
        }
    }
}

impl From<std::io::Error> for PaletteError {
    fn from(e: std::io::Error) -> Self {
        PaletteError::Io(e)
    }
}

const ASE_HEADER_MAGIC: u16 = 0xA5E0;
const ASE_FRAME_MAGIC: u16 = 0xF1FA;
const ASE_HEADER_LEN: usize = 128;
const ASE_FRAME_HEADER_LEN: usize = 16;
const ASE_CHUNK_PALETTE: u16 = 0x2019;
/// Palette entry flag: a name string follows the RGBA bytes.
const ASE_ENTRY_HAS_NAME: u16 = 0x0001;

/// Little-endian cursor over the palette file bytes.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PaletteError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| PaletteError::Format("unexpected end of file".into()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, PaletteError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, PaletteError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, PaletteError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip(&mut self, n: usize) -> Result<(), PaletteError> {
        self.take(n).map(|_| ())
    }

    fn seek_to(&mut self, pos: usize) -> Result<(), PaletteError> {
        if pos < self.pos || pos > self.data.len() {
            return Err(PaletteError::Format("chunk size exceeds file".into()));
        }
        self.pos = pos;
        Ok(())
    }
}

/// Read the palette out of an Aseprite sprite/tileset container.
pub fn load_palette(path: &Path) -> Result<Vec<Color32>, PaletteError> {
    let raw = std::fs::read(path)?;
    parse_palette(&raw)
}

/// Scan an Aseprite container for palette chunks (type `0x2019`) and
/// collect their RGBA entries.  Layout: a 128-byte file header with magic
/// `0xA5E0` at byte offset 4, then per frame a 16-byte header with magic
/// `0xF1FA` followed by its chunks.  Per-entry name strings are skipped
/// when the flag bit announces them.
pub fn parse_palette(raw: &[u8]) -> Result<Vec<Color32>, PaletteError> {
    let mut r = ByteReader::new(raw);
    let _file_size = r.read_u32()?;
    let magic = r.read_u16()?;
    if magic != ASE_HEADER_MAGIC {
        return Err(PaletteError::Format(format!(
            "bad header magic 0x{:04X}",
            magic
        )));
    }
    let frames = r.read_u16()?;
    // The rest of the header (dimensions, color depth, …) is irrelevant
    // for palette extraction.
    r.seek_to(ASE_HEADER_LEN)?;

    let mut colors = Vec::new();
    for _ in 0..frames {
        let frame_start = r.pos();
        let frame_bytes = r.read_u32()? as usize;
        let frame_magic = r.read_u16()?;
        if frame_magic != ASE_FRAME_MAGIC {
            return Err(PaletteError::Format(format!(
                "bad frame magic 0x{:04X}",
                frame_magic
            )));
        }
        if frame_bytes < ASE_FRAME_HEADER_LEN {
            return Err(PaletteError::Format("frame size too small".into()));
        }
        let old_chunk_count = r.read_u16()?;
        let _duration_ms = r.read_u16()?;
        r.skip(2)?;
        let new_chunk_count = r.read_u32()?;
        let chunk_count = if new_chunk_count == 0 {
            old_chunk_count as u32
        } else {
            new_chunk_count
        };

        for _ in 0..chunk_count {
            let chunk_start = r.pos();
            let chunk_size = r.read_u32()? as usize;
            let chunk_type = r.read_u16()?;
            if chunk_size < 6 {
                return Err(PaletteError::Format("chunk size too small".into()));
            }
            if chunk_type == ASE_CHUNK_PALETTE {
                read_palette_chunk(&mut r, &mut colors)?;
            }
            r.seek_to(chunk_start + chunk_size)?;
        }
        r.seek_to(frame_start + frame_bytes)?;
    }

    if colors.is_empty() {
        return Err(PaletteError::Format("no palette chunk found".into()));
    }
    Ok(colors)
}

fn read_palette_chunk(
    r: &mut ByteReader<'_>,
    colors: &mut Vec<Color32>,
) -> Result<(), PaletteError> {
    let _palette_size = r.read_u32()?;
    let first_index = r.read_u32()?;
    let last_index = r.read_u32()?;
    r.skip(8)?;

    let count = last_index
        .checked_sub(first_index)
        .map(|n| n as u64 + 1)
        .ok_or_else(|| PaletteError::Format("palette index range inverted".into()))?;

    for _ in 0..count {
        let flags = r.read_u16()?;
        let red = r.read_u8()?;
        let green = r.read_u8()?;
        let blue = r.read_u8()?;
        let alpha = r.read_u8()?;
        if flags & ASE_ENTRY_HAS_NAME != 0 {
            let name_len = r.read_u16()? as usize;
            r.skip(name_len)?;
        }
        colors.push(Color32::from_rgba_unmultiplied(red, green, blue, alpha));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
