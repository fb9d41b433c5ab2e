use std::collections::HashMap;
use std::sync::Mutex;

use eframe::egui;
use egui::{Color32, Pos2, Rect, Stroke, Vec2};
use image::{Rgba, RgbaImage};

use crate::components::history::{PixelChange, UndoJournal};
use crate::components::tools::Tool;

// ============================================================================
// PIXEL COLOR
// ============================================================================

/// A single sprite cell: fully transparent, or a solid RGBA value.
///
/// Transparency is a distinct state rather than an alpha-zero color so that
/// selection and export logic can ask "is there content here" without
/// inspecting channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelColor {
    #[default]
    Transparent,
    Solid(Rgba<u8>),
}

impl PixelColor {
    /// Collapse an alpha-zero RGBA value into `Transparent`.
    pub fn from_rgba(rgba: Rgba<u8>) -> Self {
        if rgba[3] == 0 {
            PixelColor::Transparent
        } else {
            PixelColor::Solid(rgba)
        }
    }

    pub fn from_color32(color: Color32) -> Self {
        Self::from_rgba(Rgba([color.r(), color.g(), color.b(), color.a()]))
    }

    pub fn is_transparent(&self) -> bool {
        matches!(self, PixelColor::Transparent)
    }

    pub fn rgba(&self) -> Option<Rgba<u8>> {
        match self {
            PixelColor::Transparent => None,
            PixelColor::Solid(rgba) => Some(*rgba),
        }
    }

    pub fn to_color32(&self) -> Option<Color32> {
        self.rgba()
            .map(|c| Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3]))
    }
}

// ============================================================================
// SPRITE RASTER — dense 2D grid of pixel colors
// ============================================================================

/// Error type for raster resize operations.
#[derive(Debug)]
pub enum RasterError {
    /// A resize target dimension was zero.
    InvalidDimension(u32, u32),
}

impl std::fmt::Display for RasterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RasterError::InvalidDimension(w, h) => {
                write!(f, "invalid sprite dimensions {}×{}", w, h)
            }
        }
    }
}

/// The sprite's pixel grid.  Dense row-major storage — sprites stay in the
/// tens-to-low-hundreds of cells per axis, so sparse chunking buys nothing.
///
/// Dimensions are always ≥ 1.  Out-of-range coordinates passed to the
/// accessors read `Transparent` / write nothing; this is the forgiving
/// boundary the input layer leans on.
#[derive(Clone, Debug)]
pub struct SpriteRaster {
    width: u32,
    height: u32,
    cells: Vec<PixelColor>,
}

impl SpriteRaster {
    /// Create a fully transparent raster.  Zero dimensions are clamped to
    /// 1×1 — resize operations are where dimension errors are reported.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = if width == 0 || height == 0 {
            eprintln!("SpriteRaster::new: zero dimension {}×{}, clamped to 1×1", width, height);
            (width.max(1), height.max(1))
        } else {
            (width, height)
        };
        Self {
            width,
            height,
            cells: vec![PixelColor::Transparent; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> PixelColor {
        if x >= self.width || y >= self.height {
            return PixelColor::Transparent;
        }
        self.cells[(y * self.width + x) as usize]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: PixelColor) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.cells[(y * self.width + x) as usize] = color;
    }

    /// True iff any cell holds content.  O(width·height).
    pub fn has_content(&self) -> bool {
        self.cells.iter().any(|c| !c.is_transparent())
    }

    /// Reset every cell to transparent.  Does not touch the undo journal —
    /// this backs "new sprite" after the UI has prompted about unsaved work.
    pub fn clear(&mut self) {
        self.cells.fill(PixelColor::Transparent);
    }

    /// Grow or crop the canvas.  The overlapping region keeps its content,
    /// new area is transparent, cropped content is discarded.
    pub fn resize_canvas(&mut self, new_w: u32, new_h: u32) -> Result<(), RasterError> {
        if new_w == 0 || new_h == 0 {
            return Err(RasterError::InvalidDimension(new_w, new_h));
        }
        let mut cells = vec![PixelColor::Transparent; (new_w * new_h) as usize];
        let copy_w = self.width.min(new_w);
        let copy_h = self.height.min(new_h);
        for y in 0..copy_h {
            for x in 0..copy_w {
                cells[(y * new_w + x) as usize] = self.cells[(y * self.width + x) as usize];
            }
        }
        self.cells = cells;
        self.width = new_w;
        self.height = new_h;
        Ok(())
    }

    /// Rescale the sprite content to new dimensions with nearest-neighbor
    /// sampling.
    pub fn resize_sprite(&mut self, new_w: u32, new_h: u32) -> Result<(), RasterError> {
        if new_w == 0 || new_h == 0 {
            return Err(RasterError::InvalidDimension(new_w, new_h));
        }
        let mut cells = vec![PixelColor::Transparent; (new_w * new_h) as usize];
        for y in 0..new_h {
            let src_y = ((y as u64 * self.height as u64) / new_h as u64).min(self.height as u64 - 1) as u32;
            for x in 0..new_w {
                let src_x =
                    ((x as u64 * self.width as u64) / new_w as u64).min(self.width as u64 - 1) as u32;
                cells[(y * new_w + x) as usize] =
                    self.cells[(src_y * self.width + src_x) as usize];
            }
        }
        self.cells = cells;
        self.width = new_w;
        self.height = new_h;
        Ok(())
    }
}

// ============================================================================
// VIEW TRANSFORM — screen ↔ grid mapping under pan/zoom
// ============================================================================

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 32.0;
/// Multiplicative step applied per zoom tick.
const ZOOM_STEP: f32 = 1.2;

/// Pure coordinate mapping between the canvas viewport and the sprite grid.
/// All screen points are viewport-local (origin at the canvas rect's
/// top-left corner); the widget translates pointer positions before they
/// get here.
#[derive(Clone, Debug)]
pub struct ViewTransform {
    pan_offset: Vec2,
    zoom: f32,
    /// Canvas viewport size, refreshed by the widget every frame.
    viewport: Vec2,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            pan_offset: Vec2::ZERO,
            zoom: 1.0,
            viewport: Vec2::new(640.0, 640.0),
        }
    }
}

impl ViewTransform {
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan_offset(&self) -> Vec2 {
        self.pan_offset
    }

    pub fn set_viewport(&mut self, size: Vec2) {
        self.viewport = size;
    }

    pub fn reset(&mut self) {
        self.pan_offset = Vec2::ZERO;
        self.zoom = 1.0;
    }

    /// Edge length of one grid cell on screen, floored to whole pixels.
    /// At 1.0 zoom the sprite fits the viewport along its larger axis.
    pub fn cell_size(&self, grid_w: u32, grid_h: u32) -> f32 {
        let fit = (self.viewport.x / grid_w as f32).min(self.viewport.y / grid_h as f32);
        (fit * self.zoom).floor()
    }

    /// Screen position of cell (0,0)'s top-left corner: the sprite is
    /// centered in the viewport, then shifted by the pan offset.
    pub fn origin(&self, grid_w: u32, grid_h: u32) -> Pos2 {
        let cell = self.cell_size(grid_w, grid_h);
        Pos2::new(
            (self.viewport.x - grid_w as f32 * cell) / 2.0 + self.pan_offset.x,
            (self.viewport.y - grid_h as f32 * cell) / 2.0 + self.pan_offset.y,
        )
    }

    /// Map a viewport point to the containing grid cell.  The result may
    /// lie outside the grid; callers bounds-check against the raster.
    /// `None` when the view is degenerate (cell size under one pixel).
    pub fn screen_to_grid(&self, grid_w: u32, grid_h: u32, p: Pos2) -> Option<(i32, i32)> {
        let cell = self.cell_size(grid_w, grid_h);
        if cell < 1.0 {
            return None;
        }
        let origin = self.origin(grid_w, grid_h);
        Some((
            ((p.x - origin.x) / cell).floor() as i32,
            ((p.y - origin.y) / cell).floor() as i32,
        ))
    }

    /// Screen rectangle covered by a grid cell.
    pub fn grid_to_screen_rect(&self, grid_w: u32, grid_h: u32, gx: i32, gy: i32) -> Rect {
        let cell = self.cell_size(grid_w, grid_h);
        let origin = self.origin(grid_w, grid_h);
        Rect::from_min_size(
            Pos2::new(origin.x + gx as f32 * cell, origin.y + gy as f32 * cell),
            Vec2::splat(cell),
        )
    }

    /// Unbounded pan.  An off-center or even empty viewport is allowed;
    /// the user pans back.
    pub fn pan(&mut self, delta: Vec2) {
        self.pan_offset += delta;
    }

    /// Zoom one step in (`dir ≥ 0`) or out (`dir < 0`), keeping the content
    /// under `screen_point` visually fixed.  No-op when the clamp leaves
    /// the zoom unchanged.
    pub fn zoom_at(&mut self, screen_point: Pos2, dir: i32) {
        let old = self.zoom;
        let new = if dir >= 0 { old * ZOOM_STEP } else { old / ZOOM_STEP };
        let new = new.clamp(MIN_ZOOM, MAX_ZOOM);
        if new == old {
            return;
        }
        self.pan_offset += screen_point.to_vec2() * (1.0 - new / old);
        self.zoom = new;
    }
}

// ============================================================================
// SELECTION & CLIPBOARD
// ============================================================================

/// Marquee selection: a normalized inclusive rectangle plus a detached
/// snapshot of the non-transparent cells inside it.  The snapshot never
/// re-reads the raster, so raster edits cannot corrupt an in-flight drag.
#[derive(Clone, Debug)]
pub struct Selection {
    anchor: (i32, i32),
    cursor: (i32, i32),
    /// Non-transparent content keyed by grid position.  Transparent cells
    /// inside the marquee are selection area, not content.
    pixels: HashMap<(i32, i32), PixelColor>,
    /// True while the content lives only in `pixels` and not in the
    /// raster: mid-drag, or a paste that has not been applied yet.
    detached: bool,
}

impl Selection {
    /// Normalized inclusive bounds: (min_x, min_y, max_x, max_y).
    pub fn rect(&self) -> (i32, i32, i32, i32) {
        (
            self.anchor.0.min(self.cursor.0),
            self.anchor.1.min(self.cursor.1),
            self.anchor.0.max(self.cursor.0),
            self.anchor.1.max(self.cursor.1),
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x0, y0, x1, y1) = self.rect();
        x >= x0 && x <= x1 && y >= y0 && y <= y1
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> impl Iterator<Item = (&(i32, i32), &PixelColor)> {
        self.pixels.iter()
    }
}

/// In-app clipboard: pixels keyed relative to the copied rect's top-left
/// corner.  Process-wide and overwritten by each Copy, like the OS
/// clipboard it mirrors into.
static SPRITE_CLIPBOARD: Mutex<Option<HashMap<(i32, i32), PixelColor>>> = Mutex::new(None);

fn set_clipboard(pixels: HashMap<(i32, i32), PixelColor>) {
    *SPRITE_CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()) = Some(pixels);
}

fn get_clipboard() -> Option<HashMap<(i32, i32), PixelColor>> {
    SPRITE_CLIPBOARD.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

pub fn has_clipboard_content() -> bool {
    SPRITE_CLIPBOARD
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
        .is_some_and(|p| !p.is_empty())
}

/// Mirror a copied selection to the OS clipboard as a rendered RGBA image
/// so other applications can paste it.  Failures are ignored — the in-app
/// clipboard is the authoritative store.
fn copy_to_system_clipboard(pixels: &HashMap<(i32, i32), PixelColor>) {
    let Some(((w, h), img)) = render_clipboard_image(pixels) else {
        return;
    };
    if let Ok(mut clip) = arboard::Clipboard::new() {
        let data = arboard::ImageData {
            width: w as usize,
            height: h as usize,
            bytes: std::borrow::Cow::Borrowed(img.as_raw()),
        };
        let _ = clip.set_image(data);
    }
}

fn render_clipboard_image(
    pixels: &HashMap<(i32, i32), PixelColor>,
) -> Option<((u32, u32), RgbaImage)> {
    let min_x = pixels.keys().map(|p| p.0).min()?;
    let min_y = pixels.keys().map(|p| p.1).min()?;
    let max_x = pixels.keys().map(|p| p.0).max()?;
    let max_y = pixels.keys().map(|p| p.1).max()?;
    let w = (max_x - min_x + 1) as u32;
    let h = (max_y - min_y + 1) as u32;
    let mut img = RgbaImage::new(w, h);
    for (&(x, y), color) in pixels {
        if let Some(rgba) = color.rgba() {
            img.put_pixel((x - min_x) as u32, (y - min_y) as u32, rgba);
        }
    }
    Some(((w, h), img))
}

// ============================================================================
// CANVAS STATE — the document: raster + view + selection + history
// ============================================================================

/// One open sprite document.  Owns the raster, the view transform, the undo
/// journal and the selection engine; the UI layer only ever calls the
/// methods on this type.
///
/// Screen-point parameters are viewport-local positions (see
/// [`ViewTransform`]).  Selection, clipboard and undo methods silently
/// no-op on invalid state — they are invoked speculatively from input
/// handlers.  Resize and I/O methods return real errors.
pub struct CanvasState {
    raster: SpriteRaster,
    pub view: ViewTransform,
    history: UndoJournal,
    selection: Option<Selection>,
    marqueeing: bool,
    dragging: bool,
    /// Cursor cell at the previous drag step, for delta computation.
    drag_last: (i32, i32),
}

impl CanvasState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            raster: SpriteRaster::new(width, height),
            view: ViewTransform::default(),
            history: UndoJournal::default(),
            selection: None,
            marqueeing: false,
            dragging: false,
            drag_last: (0, 0),
        }
    }

    pub fn raster(&self) -> &SpriteRaster {
        &self.raster
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    // ---- lifecycle ----------------------------------------------------------

    pub fn has_content(&self) -> bool {
        self.raster.has_content()
    }

    /// Wipe the sprite.  Destructive: no undo entry is recorded.  The UI
    /// prompts about unsaved work before calling this.
    pub fn clear(&mut self) {
        self.raster.clear();
        self.clear_selection();
    }

    /// Grow or crop the canvas.  Clears the selection and the undo journal:
    /// both hold grid coordinates the resize may invalidate.
    pub fn resize_canvas(&mut self, new_w: u32, new_h: u32) -> Result<(), RasterError> {
        self.raster.resize_canvas(new_w, new_h)?;
        self.clear_selection();
        self.history.clear();
        Ok(())
    }

    /// Nearest-neighbor resample.  Same side effects as [`Self::resize_canvas`].
    pub fn resize_sprite(&mut self, new_w: u32, new_h: u32) -> Result<(), RasterError> {
        self.raster.resize_sprite(new_w, new_h)?;
        self.clear_selection();
        self.history.clear();
        Ok(())
    }

    // ---- editing ------------------------------------------------------------

    /// Bracket a continuous gesture (one pen stroke) so its pixel writes
    /// coalesce into a single undo entry.
    pub fn begin_interaction(&mut self) {
        self.history.begin_group();
    }

    pub fn end_interaction(&mut self) {
        self.history.end_group();
    }

    pub fn draw_pixel(&mut self, screen: Pos2, color: PixelColor) {
        let Some((gx, gy)) = self.grid_cell(screen) else {
            return;
        };
        self.draw_pixel_at(gx, gy, color);
    }

    /// Write one cell, journaled.  Out-of-grid coordinates are a silent
    /// no-op.
    pub fn draw_pixel_at(&mut self, gx: i32, gy: i32, color: PixelColor) {
        if !self.raster.in_bounds(gx, gy) {
            return;
        }
        let (x, y) = (gx as u32, gy as u32);
        let old = self.raster.get_pixel(x, y);
        if old == color {
            return;
        }
        self.history.record_change(PixelChange { x, y, old, new: color });
        self.raster.set_pixel(x, y, color);
    }

    pub fn pixel_color_at(&self, screen: Pos2) -> PixelColor {
        match self.grid_cell(screen) {
            Some((gx, gy)) if self.raster.in_bounds(gx, gy) => {
                self.raster.get_pixel(gx as u32, gy as u32)
            }
            _ => PixelColor::Transparent,
        }
    }

    // ---- flood fill ---------------------------------------------------------

    pub fn flood_fill(&mut self, screen: Pos2, fill: PixelColor) {
        let Some((gx, gy)) = self.grid_cell(screen) else {
            return;
        };
        self.flood_fill_at(gx, gy, fill);
    }

    /// 4-connected flood fill from a seed cell.  The fill set is every cell
    /// reachable from the seed while exactly matching the seed's original
    /// color; filling with that same color is an immediate no-op.  All
    /// writes land in one grouped undo entry pushed after traversal.
    ///
    /// Explicit Vec stack over packed flat indices — no recursion depth
    /// limit on large regions.
    pub fn flood_fill_at(&mut self, gx: i32, gy: i32, fill: PixelColor) {
        if !self.raster.in_bounds(gx, gy) {
            return;
        }
        let w = self.raster.width() as usize;
        let h = self.raster.height() as usize;
        let target = self.raster.get_pixel(gx as u32, gy as u32);
        if target == fill {
            return;
        }

        let mut visited = vec![false; w * h];
        let mut stack: Vec<u32> = Vec::with_capacity(256);
        let seed = gy as usize * w + gx as usize;
        visited[seed] = true;
        stack.push(seed as u32);

        let mut changes = Vec::new();
        while let Some(idx) = stack.pop() {
            let i = idx as usize;
            let x = i % w;
            let y = i / w;
            changes.push(PixelChange {
                x: x as u32,
                y: y as u32,
                old: target,
                new: fill,
            });

            if x > 0 {
                let ni = i - 1;
                if !visited[ni] && self.raster.cells[ni] == target {
                    visited[ni] = true;
                    stack.push(ni as u32);
                }
            }
            if x + 1 < w {
                let ni = i + 1;
                if !visited[ni] && self.raster.cells[ni] == target {
                    visited[ni] = true;
                    stack.push(ni as u32);
                }
            }
            if y > 0 {
                let ni = i - w;
                if !visited[ni] && self.raster.cells[ni] == target {
                    visited[ni] = true;
                    stack.push(ni as u32);
                }
            }
            if y + 1 < h {
                let ni = i + w;
                if !visited[ni] && self.raster.cells[ni] == target {
                    visited[ni] = true;
                    stack.push(ni as u32);
                }
            }
        }

        for change in &changes {
            self.raster.set_pixel(change.x, change.y, change.new);
        }
        self.history.record_group(changes);
    }

    // ---- selection gestures -------------------------------------------------

    pub fn start_marquee_selection(&mut self, screen: Pos2) {
        let Some((gx, gy)) = self.grid_cell(screen) else {
            return;
        };
        self.start_marquee_at(gx, gy);
    }

    /// Begin a marquee.  An existing selection is discarded — including a
    /// floating paste that was never applied.
    pub fn start_marquee_at(&mut self, gx: i32, gy: i32) {
        if self.dragging {
            return;
        }
        let start = self.clamp_to_grid(gx, gy);
        self.selection = Some(Selection {
            anchor: start,
            cursor: start,
            pixels: HashMap::new(),
            detached: false,
        });
        self.marqueeing = true;
    }

    pub fn update_marquee_selection(&mut self, screen: Pos2) {
        let Some((gx, gy)) = self.grid_cell(screen) else {
            return;
        };
        self.update_marquee_at(gx, gy);
    }

    /// Move the marquee cursor corner.  Clamped into the grid so a pointer
    /// that leaves the viewport still yields a valid rect.
    pub fn update_marquee_at(&mut self, gx: i32, gy: i32) {
        if !self.marqueeing {
            return;
        }
        let cursor = self.clamp_to_grid(gx, gy);
        if let Some(sel) = self.selection.as_mut() {
            sel.cursor = cursor;
        }
    }

    /// Finalize the marquee: snapshot the rect's non-transparent content
    /// into the detached pixel map.
    pub fn end_marquee_selection(&mut self) {
        if !self.marqueeing {
            return;
        }
        self.marqueeing = false;
        let Some(sel) = self.selection.as_mut() else {
            return;
        };
        let (x0, y0, x1, y1) = sel.rect();
        let mut pixels = HashMap::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                if self.raster.in_bounds(x, y) {
                    let color = self.raster.get_pixel(x as u32, y as u32);
                    if !color.is_transparent() {
                        pixels.insert((x, y), color);
                    }
                }
            }
        }
        sel.pixels = pixels;
    }

    pub fn is_point_in_selection(&self, screen: Pos2) -> bool {
        let Some((gx, gy)) = self.grid_cell(screen) else {
            return false;
        };
        self.selection.as_ref().is_some_and(|s| s.contains(gx, gy))
    }

    pub fn start_dragging_selection(&mut self, screen: Pos2) {
        let Some((gx, gy)) = self.grid_cell(screen) else {
            return;
        };
        self.start_dragging_at(gx, gy);
    }

    /// Begin moving the selection.  On the first drag of attached content
    /// the source cells are cleared from the live raster so the hole is
    /// visible immediately; that clear is deliberately not journaled — a
    /// single Undo after a completed drag restores only the destination
    /// cells (see `end_dragging_selection`).
    pub fn start_dragging_at(&mut self, gx: i32, gy: i32) {
        if self.marqueeing || self.dragging {
            return;
        }
        let Some(sel) = self.selection.as_mut() else {
            return;
        };
        if !sel.contains(gx, gy) {
            return;
        }
        if !sel.detached {
            for &(px, py) in sel.pixels.keys() {
                self.raster.set_pixel(px as u32, py as u32, PixelColor::Transparent);
            }
            sel.detached = true;
        }
        self.dragging = true;
        self.drag_last = (gx, gy);
    }

    pub fn drag_selection(&mut self, screen: Pos2) {
        let Some((gx, gy)) = self.grid_cell(screen) else {
            return;
        };
        self.drag_selection_to(gx, gy);
    }

    /// Shift the rect and every carried pixel by the cursor delta.  Pixels
    /// pushed off the grid are dropped for good.
    pub fn drag_selection_to(&mut self, gx: i32, gy: i32) {
        if !self.dragging {
            return;
        }
        let (dx, dy) = (gx - self.drag_last.0, gy - self.drag_last.1);
        if dx == 0 && dy == 0 {
            return;
        }
        self.drag_last = (gx, gy);
        let Some(sel) = self.selection.as_mut() else {
            return;
        };
        sel.anchor = (sel.anchor.0 + dx, sel.anchor.1 + dy);
        sel.cursor = (sel.cursor.0 + dx, sel.cursor.1 + dy);
        let mut moved = HashMap::with_capacity(sel.pixels.len());
        for (&(px, py), &color) in &sel.pixels {
            let np = (px + dx, py + dy);
            if self.raster.in_bounds(np.0, np.1) {
                moved.insert(np, color);
            }
        }
        sel.pixels = moved;
    }

    /// Drop the dragged content at its current position: every surviving
    /// pixel overwrites its destination cell, journaled as one group.
    pub fn end_dragging_selection(&mut self) {
        if !self.dragging {
            return;
        }
        self.dragging = false;
        self.commit_detached();
    }

    /// Commit a detached selection (a floating paste, or content picked up
    /// by a drag) into the raster as one grouped undo entry.  No-op when
    /// the selection is attached or absent.
    pub fn apply_selection(&mut self) {
        if self.marqueeing || self.dragging {
            return;
        }
        self.commit_detached();
    }

    fn commit_detached(&mut self) {
        let Some(sel) = self.selection.as_mut() else {
            return;
        };
        if !sel.detached {
            return;
        }
        let mut changes = Vec::new();
        for (&(px, py), &color) in &sel.pixels {
            let (x, y) = (px as u32, py as u32);
            let old = self.raster.get_pixel(x, y);
            if old != color {
                changes.push(PixelChange { x, y, old, new: color });
                self.raster.set_pixel(x, y, color);
            }
        }
        self.history.record_group(changes);
        sel.detached = false;
    }

    /// Clear every selected cell to transparent as one grouped undo entry,
    /// then drop the selection.  A floating (never-applied) selection has
    /// no raster footprint and is simply discarded.
    pub fn delete_selection(&mut self) {
        if self.marqueeing || self.dragging {
            return;
        }
        let Some(sel) = self.selection.take() else {
            return;
        };
        if sel.detached {
            return;
        }
        let (x0, y0, x1, y1) = sel.rect();
        let mut changes = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                if !self.raster.in_bounds(x, y) {
                    continue;
                }
                let (ux, uy) = (x as u32, y as u32);
                let old = self.raster.get_pixel(ux, uy);
                if !old.is_transparent() {
                    changes.push(PixelChange {
                        x: ux,
                        y: uy,
                        old,
                        new: PixelColor::Transparent,
                    });
                    self.raster.set_pixel(ux, uy, PixelColor::Transparent);
                }
            }
        }
        self.history.record_group(changes);
    }

    /// Drop the selection without touching the raster.  Detached content
    /// that was never applied is lost.
    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.marqueeing = false;
        self.dragging = false;
    }

    // ---- clipboard ----------------------------------------------------------

    /// Snapshot the selection's content into the process-wide clipboard,
    /// keyed relative to the rect's top-left corner, and mirror it to the
    /// OS clipboard.  No-op without at least one content pixel.
    pub fn copy_selection(&self) {
        let Some(sel) = self.selection.as_ref() else {
            return;
        };
        if sel.pixels.is_empty() {
            return;
        }
        let (x0, y0, _, _) = sel.rect();
        let mut relative = HashMap::with_capacity(sel.pixels.len());
        for (&(px, py), &color) in &sel.pixels {
            relative.insert((px - x0, py - y0), color);
        }
        copy_to_system_clipboard(&relative);
        set_clipboard(relative);
    }

    pub fn paste_from_clipboard(&mut self, screen: Pos2) {
        let Some((gx, gy)) = self.grid_cell(screen) else {
            return;
        };
        self.paste_at(gx, gy);
    }

    /// Float the clipboard content as a fresh detached selection anchored
    /// at the given cell.  Nothing is written to the raster until
    /// `apply_selection` or a drag commits it.  Entries falling outside the
    /// grid are clipped.
    pub fn paste_at(&mut self, gx: i32, gy: i32) {
        if self.marqueeing || self.dragging {
            return;
        }
        let Some(clip) = get_clipboard() else {
            return;
        };
        if clip.is_empty() {
            return;
        }
        self.clear_selection();

        let min_x = clip.keys().map(|p| p.0).min().unwrap_or(0);
        let min_y = clip.keys().map(|p| p.1).min().unwrap_or(0);
        let max_x = clip.keys().map(|p| p.0).max().unwrap_or(0);
        let max_y = clip.keys().map(|p| p.1).max().unwrap_or(0);

        let mut pixels = HashMap::with_capacity(clip.len());
        for (&(rx, ry), &color) in &clip {
            let pos = (gx + rx - min_x, gy + ry - min_y);
            if self.raster.in_bounds(pos.0, pos.1) {
                pixels.insert(pos, color);
            }
        }
        self.selection = Some(Selection {
            anchor: (gx, gy),
            cursor: (gx + (max_x - min_x), gy + (max_y - min_y)),
            pixels,
            detached: true,
        });
    }

    // ---- flags --------------------------------------------------------------

    pub fn has_selection(&self) -> bool {
        self.selection.is_some()
    }

    pub fn is_dragging_selection(&self) -> bool {
        self.dragging
    }

    pub fn has_clipboard_content(&self) -> bool {
        has_clipboard_content()
    }

    // ---- view ---------------------------------------------------------------

    pub fn pan(&mut self, delta: Vec2) {
        self.view.pan(delta);
    }

    pub fn zoom_at(&mut self, screen: Pos2, dir: i32) {
        self.view.zoom_at(screen, dir);
    }

    /// Grid cell under a viewport-local point, unbounded.
    fn grid_cell(&self, screen: Pos2) -> Option<(i32, i32)> {
        self.view
            .screen_to_grid(self.raster.width, self.raster.height, screen)
    }

    /// Grid cell under a viewport-local point, or `None` when outside the
    /// sprite.  Used by the status bar.
    pub fn cursor_cell(&self, screen: Pos2) -> Option<(u32, u32)> {
        match self.grid_cell(screen) {
            Some((gx, gy)) if self.raster.in_bounds(gx, gy) => Some((gx as u32, gy as u32)),
            _ => None,
        }
    }

    fn clamp_to_grid(&self, gx: i32, gy: i32) -> (i32, i32) {
        (
            gx.clamp(0, self.raster.width as i32 - 1),
            gy.clamp(0, self.raster.height as i32 - 1),
        )
    }

    // ---- history ------------------------------------------------------------

    pub fn undo(&mut self) {
        self.history.undo(&mut self.raster);
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.len()
    }

    // ---- I/O ----------------------------------------------------------------

    /// Replace the sprite wholesale with a decoded image file.  Selection
    /// and undo history die with the old raster.
    pub fn load_image(&mut self, path: &std::path::Path) -> Result<(), crate::io::IoError> {
        let raster = crate::io::load_image(path)?;
        crate::log_info!(
            "Loaded {} as {}×{} sprite",
            path.display(),
            raster.width(),
            raster.height()
        );
        self.raster = raster;
        self.clear_selection();
        self.history.clear();
        self.view.reset();
        Ok(())
    }

    pub fn export_image(
        &self,
        path: &std::path::Path,
        scale: u32,
    ) -> Result<(), crate::io::IoError> {
        crate::io::export_image(&self.raster, path, scale)
    }
}

// ============================================================================
// BACKGROUND PATTERN
// ============================================================================

/// Checkerboard rendered behind transparent cells.  Passed by value into
/// the render call each frame; deliberately not process-wide state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackgroundPattern {
    pub color1: Color32,
    pub color2: Color32,
    /// Checker square edge in grid cells, at least 1.
    pub size: u32,
}

impl Default for BackgroundPattern {
    fn default() -> Self {
        Self {
            color1: Color32::from_gray(200),
            color2: Color32::from_gray(160),
            size: 1,
        }
    }
}

impl BackgroundPattern {
    pub fn color_for(&self, gx: i32, gy: i32) -> Color32 {
        let s = self.size.max(1) as i32;
        if (gx.div_euclid(s) + gy.div_euclid(s)).rem_euclid(2) == 0 {
            self.color1
        } else {
            self.color2
        }
    }
}

// ============================================================================
// CANVAS WIDGET — checkerboard + cells + selection overlay, input routing
// ============================================================================

/// The canvas view.  Owns only presentation state; every edit is routed
/// through [`CanvasState`].  Redrawing is idempotent.
pub struct Canvas {
    pub last_canvas_rect: Option<Rect>,
    /// Accent color for the marquee outline (set from theme).
    pub selection_stroke: Color32,
    /// Faint accent for the marquee fill overlay.
    pub selection_fill: Color32,
    stroke_active: bool,
    select_active: bool,
    last_paint_cell: Option<(i32, i32)>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            last_canvas_rect: None,
            selection_stroke: Color32::from_rgb(66, 133, 244),
            selection_fill: Color32::from_rgba_unmultiplied(66, 133, 244, 40),
            stroke_active: false,
            select_active: false,
            last_paint_cell: None,
        }
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        state: &mut CanvasState,
        tool: Tool,
        draw_color: PixelColor,
        background: &BackgroundPattern,
        show_grid: bool,
    ) {
        let available_size = ui.available_size();
        let sense = egui::Sense::click_and_drag().union(egui::Sense::hover());
        let (response, painter) = ui.allocate_painter(available_size, sense);
        let canvas_rect = response.rect;
        self.last_canvas_rect = Some(canvas_rect);
        state.view.set_viewport(canvas_rect.size());

        let to_local = |p: Pos2| Pos2::new(p.x - canvas_rect.min.x, p.y - canvas_rect.min.y);
        let pointer = response
            .hover_pos()
            .or_else(|| response.interact_pointer_pos());

        // Panning with the middle mouse button works regardless of tool.
        if response.dragged() && ui.input(|i| i.pointer.middle_down()) {
            state.pan(response.drag_delta());
        }

        self.handle_tool_input(ui, state, &response, tool, draw_color, pointer, to_local);

        // Scroll wheel zoom towards the cursor.
        if response.hovered() {
            let scroll = ui.input(|i| i.scroll_delta.y);
            if scroll.abs() > 0.1
                && let Some(pos) = pointer
            {
                state.zoom_at(to_local(pos), if scroll > 0.0 { 1 } else { -1 });
            }
        }

        self.paint(ui, state, &painter, canvas_rect, background, show_grid, tool, pointer);
    }

    fn handle_tool_input(
        &mut self,
        ui: &mut egui::Ui,
        state: &mut CanvasState,
        response: &egui::Response,
        tool: Tool,
        draw_color: PixelColor,
        pointer: Option<Pos2>,
        to_local: impl Fn(Pos2) -> Pos2,
    ) {
        let primary_down = ui.input(|i| i.pointer.primary_down());

        match tool {
            Tool::Pan => {
                if response.dragged_by(egui::PointerButton::Primary) {
                    state.pan(response.drag_delta());
                }
            }
            Tool::Pen | Tool::Eraser => {
                let color = if tool == Tool::Pen {
                    draw_color
                } else {
                    PixelColor::Transparent
                };
                if primary_down && (self.stroke_active || response.hovered()) {
                    if !self.stroke_active {
                        state.begin_interaction();
                        self.stroke_active = true;
                        self.last_paint_cell = None;
                    }
                    if let Some(pos) = pointer {
                        self.paint_stroke_to(state, to_local(pos), color);
                    }
                } else if self.stroke_active {
                    self.stroke_active = false;
                    self.last_paint_cell = None;
                    state.end_interaction();
                }
            }
            Tool::Bucket => {
                if response.clicked()
                    && let Some(pos) = response.interact_pointer_pos()
                {
                    state.flood_fill(to_local(pos), draw_color);
                }
            }
            Tool::Select => {
                if primary_down && !self.select_active && response.hovered() {
                    self.select_active = true;
                    if let Some(pos) = pointer {
                        let local = to_local(pos);
                        if state.is_point_in_selection(local) {
                            state.start_dragging_selection(local);
                        } else {
                            state.start_marquee_selection(local);
                        }
                    }
                } else if primary_down && self.select_active {
                    if let Some(pos) = pointer {
                        let local = to_local(pos);
                        if state.is_dragging_selection() {
                            state.drag_selection(local);
                        } else {
                            state.update_marquee_selection(local);
                        }
                    }
                } else if !primary_down && self.select_active {
                    self.select_active = false;
                    if state.is_dragging_selection() {
                        state.end_dragging_selection();
                    } else {
                        state.end_marquee_selection();
                    }
                }
            }
        }
    }

    /// Draw along the straight line from the previously painted cell to the
    /// cell under `local`, so fast pointer motion leaves no gaps.
    fn paint_stroke_to(&mut self, state: &mut CanvasState, local: Pos2, color: PixelColor) {
        let gw = state.raster().width();
        let gh = state.raster().height();
        let Some((cx, cy)) = state.view.screen_to_grid(gw, gh, local) else {
            return;
        };
        match self.last_paint_cell {
            Some((lx, ly)) if (lx, ly) != (cx, cy) => {
                let steps = (cx - lx).abs().max((cy - ly).abs());
                for i in 1..=steps {
                    let t = i as f32 / steps as f32;
                    let gx = lx + ((cx - lx) as f32 * t).round() as i32;
                    let gy = ly + ((cy - ly) as f32 * t).round() as i32;
                    state.draw_pixel_at(gx, gy, color);
                }
            }
            Some(_) => {}
            None => state.draw_pixel_at(cx, cy, color),
        }
        self.last_paint_cell = Some((cx, cy));
    }

    fn paint(
        &self,
        ui: &egui::Ui,
        state: &CanvasState,
        painter: &egui::Painter,
        canvas_rect: Rect,
        background: &BackgroundPattern,
        show_grid: bool,
        tool: Tool,
        pointer: Option<Pos2>,
    ) {
        let painter = painter.with_clip_rect(canvas_rect);
        painter.rect_filled(canvas_rect, 0.0, ui.visuals().extreme_bg_color);

        let gw = state.raster().width();
        let gh = state.raster().height();
        let cell = state.view.cell_size(gw, gh);
        if cell < 1.0 {
            return;
        }

        let offset = canvas_rect.min.to_vec2();
        let cell_rect =
            |gx: i32, gy: i32| state.view.grid_to_screen_rect(gw, gh, gx, gy).translate(offset);

        for gy in 0..gh as i32 {
            for gx in 0..gw as i32 {
                let rect = cell_rect(gx, gy);
                if !rect.intersects(canvas_rect) {
                    continue;
                }
                painter.rect_filled(rect, 0.0, background.color_for(gx, gy));
                if let Some(color) = state.raster().get_pixel(gx as u32, gy as u32).to_color32() {
                    painter.rect_filled(rect, 0.0, color);
                }
            }
        }

        // Detached selection content floats above the raster.
        if let Some(sel) = state.selection()
            && sel.is_detached()
        {
            for (&(gx, gy), color) in sel.pixels() {
                if let Some(color) = color.to_color32() {
                    painter.rect_filled(cell_rect(gx, gy), 0.0, color);
                }
            }
        }

        if show_grid && cell >= 6.0 {
            let grid_color = Color32::from_rgba_unmultiplied(100, 100, 100, 60);
            let sprite_min = cell_rect(0, 0).min;
            let sprite_max = cell_rect(gw as i32 - 1, gh as i32 - 1).max;
            for gx in 0..=gw as i32 {
                let x = sprite_min.x + gx as f32 * cell;
                painter.line_segment(
                    [Pos2::new(x, sprite_min.y), Pos2::new(x, sprite_max.y)],
                    Stroke::new(1.0, grid_color),
                );
            }
            for gy in 0..=gh as i32 {
                let y = sprite_min.y + gy as f32 * cell;
                painter.line_segment(
                    [Pos2::new(sprite_min.x, y), Pos2::new(sprite_max.x, y)],
                    Stroke::new(1.0, grid_color),
                );
            }
        }

        // Sprite border.
        let sprite_rect = Rect::from_min_max(
            cell_rect(0, 0).min,
            cell_rect(gw as i32 - 1, gh as i32 - 1).max,
        );
        painter.rect_stroke(sprite_rect, 0.0, Stroke::new(1.0, Color32::from_gray(100)));

        // Marquee outline.
        if let Some(sel) = state.selection() {
            let (x0, y0, x1, y1) = sel.rect();
            let rect = Rect::from_min_max(cell_rect(x0, y0).min, cell_rect(x1, y1).max);
            painter.rect_filled(rect, 0.0, self.selection_fill);
            painter.rect_stroke(rect, 0.0, Stroke::new(1.5, self.selection_stroke));
        }

        // Hovered-cell outline for the pixel tools.
        if matches!(tool, Tool::Pen | Tool::Eraser | Tool::Bucket)
            && let Some(pos) = pointer
        {
            let local = Pos2::new(pos.x - canvas_rect.min.x, pos.y - canvas_rect.min.y);
            if let Some((gx, gy)) = state.view.screen_to_grid(gw, gh, local)
                && state.raster().in_bounds(gx, gy)
            {
                let rect = cell_rect(gx, gy);
                painter.rect_stroke(rect, 0.0, Stroke::new(1.0, Color32::from_black_alpha(180)));
                painter.rect_stroke(rect, 0.0, Stroke::new(0.5, Color32::from_white_alpha(200)));
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Serializes tests that touch the process-wide clipboard.
    static CLIP_LOCK: Mutex<()> = Mutex::new(());

    fn solid(r: u8, g: u8, b: u8) -> PixelColor {
        PixelColor::Solid(Rgba([r, g, b, 255]))
    }

    const RED: PixelColor = PixelColor::Solid(Rgba([255, 0, 0, 255]));
    const BLUE: PixelColor = PixelColor::Solid(Rgba([0, 0, 255, 255]));

    // ---- raster -------------------------------------------------------------

    #[test]
    fn has_content_and_clear() {
        let mut state = CanvasState::new(16, 16);
        assert!(!state.has_content());
        state.draw_pixel_at(3, 4, RED);
        assert!(state.has_content());
        state.clear();
        assert!(!state.has_content());
    }

    #[test]
    fn out_of_bounds_access_is_silent() {
        let mut raster = SpriteRaster::new(8, 8);
        raster.set_pixel(99, 99, RED);
        assert_eq!(raster.get_pixel(99, 99), PixelColor::Transparent);
        assert!(!raster.has_content());
    }

    #[test]
    fn resize_canvas_preserves_overlap_and_clears_new_area() {
        let mut raster = SpriteRaster::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                raster.set_pixel(x, y, solid(x as u8, y as u8, 0));
            }
        }
        raster.resize_canvas(12, 5).unwrap();
        assert_eq!(raster.width(), 12);
        assert_eq!(raster.height(), 5);
        for y in 0..5 {
            for x in 0..8 {
                assert_eq!(raster.get_pixel(x, y), solid(x as u8, y as u8, 0));
            }
            for x in 8..12 {
                assert_eq!(raster.get_pixel(x, y), PixelColor::Transparent);
            }
        }
    }

    #[test]
    fn resize_rejects_zero_dimensions() {
        let mut raster = SpriteRaster::new(8, 8);
        assert!(matches!(
            raster.resize_canvas(0, 5),
            Err(RasterError::InvalidDimension(0, 5))
        ));
        assert!(matches!(
            raster.resize_sprite(5, 0),
            Err(RasterError::InvalidDimension(5, 0))
        ));
        // Failed resizes leave the raster untouched.
        assert_eq!(raster.width(), 8);
        assert_eq!(raster.height(), 8);
    }

    #[test]
    fn resize_sprite_resamples_nearest_neighbor() {
        let mut raster = SpriteRaster::new(2, 2);
        raster.set_pixel(0, 0, RED);
        raster.set_pixel(1, 0, BLUE);
        raster.set_pixel(0, 1, solid(0, 255, 0));
        raster.set_pixel(1, 1, solid(255, 255, 0));

        raster.resize_sprite(4, 4).unwrap();
        // Each source cell becomes a 2×2 block.
        for (x, y, want) in [
            (0, 0, RED),
            (1, 1, RED),
            (2, 0, BLUE),
            (3, 1, BLUE),
            (0, 2, solid(0, 255, 0)),
            (3, 3, solid(255, 255, 0)),
        ] {
            assert_eq!(raster.get_pixel(x, y), want, "cell ({x},{y})");
        }
    }

    #[test]
    fn resize_clears_selection_and_history() {
        let mut state = CanvasState::new(8, 8);
        state.draw_pixel_at(1, 1, RED);
        state.start_marquee_at(0, 0);
        state.update_marquee_at(3, 3);
        state.end_marquee_selection();
        assert!(state.has_selection());
        assert!(state.can_undo());

        state.resize_canvas(10, 10).unwrap();
        assert!(!state.has_selection());
        assert!(!state.can_undo());
    }

    // ---- view transform -----------------------------------------------------

    fn fixed_view(state: &mut CanvasState) {
        state.view.set_viewport(Vec2::new(640.0, 640.0));
        // 16×16 grid in 640px viewport → 40px cells at 1.0 zoom.
    }

    #[test]
    fn screen_grid_round_trip() {
        let mut state = CanvasState::new(16, 16);
        fixed_view(&mut state);
        state.pan(Vec2::new(7.0, -13.0));
        for gy in 0..16 {
            for gx in 0..16 {
                let center = state.view.grid_to_screen_rect(16, 16, gx, gy).center();
                assert_eq!(
                    state.view.screen_to_grid(16, 16, center),
                    Some((gx, gy)),
                    "cell ({gx},{gy})"
                );
            }
        }
    }

    #[test]
    fn pan_is_unclamped() {
        let mut state = CanvasState::new(16, 16);
        fixed_view(&mut state);
        state.pan(Vec2::new(-100_000.0, 100_000.0));
        assert_eq!(state.view.pan_offset(), Vec2::new(-100_000.0, 100_000.0));
    }

    #[test]
    fn zoom_clamps_and_noops_at_bounds() {
        let mut state = CanvasState::new(16, 16);
        fixed_view(&mut state);
        for _ in 0..200 {
            state.zoom_at(Pos2::new(320.0, 320.0), 1);
        }
        assert_eq!(state.view.zoom(), MAX_ZOOM);
        let pan_at_max = state.view.pan_offset();
        // Further zooming in changes nothing — including the pan fixup.
        state.zoom_at(Pos2::new(320.0, 320.0), 1);
        assert_eq!(state.view.pan_offset(), pan_at_max);

        for _ in 0..200 {
            state.zoom_at(Pos2::new(320.0, 320.0), -1);
        }
        assert_eq!(state.view.zoom(), MIN_ZOOM);
    }

    #[test]
    fn zoom_at_applies_pan_fixup() {
        let mut state = CanvasState::new(16, 16);
        fixed_view(&mut state);
        let point = Pos2::new(320.0, 320.0);
        state.zoom_at(point, 1);
        // pan += p · (1 − new/old) with new/old = 1.2
        let expected = point.to_vec2() * (1.0 - 1.2);
        let got = state.view.pan_offset();
        assert!((got.x - expected.x).abs() < 1e-3, "{got:?} vs {expected:?}");
        assert!((got.y - expected.y).abs() < 1e-3);
    }

    // ---- editing + undo -----------------------------------------------------

    #[test]
    fn fresh_sprite_draw_and_undo_scenario() {
        let mut state = CanvasState::new(16, 16);
        state.begin_interaction();
        state.draw_pixel_at(0, 0, RED);
        state.end_interaction();
        assert_eq!(state.raster().get_pixel(0, 0), RED);
        assert!(state.can_undo());

        state.undo();
        assert_eq!(state.raster().get_pixel(0, 0), PixelColor::Transparent);
        assert!(!state.can_undo());
    }

    #[test]
    fn grouped_strokes_undo_in_lifo_order() {
        let mut state = CanvasState::new(16, 16);

        state.begin_interaction();
        for x in 0..5 {
            state.draw_pixel_at(x, 0, RED);
        }
        state.end_interaction();

        state.begin_interaction();
        for x in 0..5 {
            state.draw_pixel_at(x, 0, BLUE);
        }
        state.end_interaction();

        assert_eq!(state.undo_depth(), 2);
        state.undo();
        for x in 0..5 {
            assert_eq!(state.raster().get_pixel(x, 0), RED);
        }
        state.undo();
        for x in 0..5 {
            assert_eq!(state.raster().get_pixel(x, 0), PixelColor::Transparent);
        }
        assert!(!state.can_undo());
    }

    #[test]
    fn drawing_same_color_records_nothing() {
        let mut state = CanvasState::new(8, 8);
        state.draw_pixel_at(2, 2, RED);
        assert_eq!(state.undo_depth(), 1);
        state.draw_pixel_at(2, 2, RED);
        assert_eq!(state.undo_depth(), 1);
    }

    // ---- flood fill ---------------------------------------------------------

    #[test]
    fn flood_fill_colors_exactly_the_connected_region() {
        let mut state = CanvasState::new(8, 8);
        // Vertical wall at x == 3 splits the sprite in two.
        for y in 0..8 {
            state.draw_pixel_at(3, y, BLUE);
        }
        state.flood_fill_at(0, 0, RED);

        for y in 0..8i32 {
            for x in 0..8i32 {
                let got = state.raster().get_pixel(x as u32, y as u32);
                if x == 3 {
                    assert_eq!(got, BLUE, "wall ({x},{y})");
                } else if x < 3 {
                    assert_eq!(got, RED, "left of wall ({x},{y})");
                } else {
                    assert_eq!(got, PixelColor::Transparent, "right of wall ({x},{y})");
                }
            }
        }
        // 8 ungrouped wall writes plus the fill's single grouped entry.
        assert_eq!(state.undo_depth(), 8 + 1);
    }

    #[test]
    fn flood_fill_with_seed_color_is_a_no_op() {
        let mut state = CanvasState::new(8, 8);
        state.flood_fill_at(0, 0, PixelColor::Transparent);
        assert!(!state.can_undo());

        state.draw_pixel_at(0, 0, RED);
        let depth = state.undo_depth();
        state.flood_fill_at(0, 0, RED);
        assert_eq!(state.undo_depth(), depth);
    }

    #[test]
    fn flood_fill_undoes_as_one_entry() {
        let mut state = CanvasState::new(8, 8);
        state.flood_fill_at(0, 0, RED);
        assert_eq!(state.undo_depth(), 1);
        state.undo();
        assert!(!state.has_content());
    }

    #[test]
    fn flood_fill_diagonals_are_not_connected() {
        let mut state = CanvasState::new(4, 4);
        // Checkerboard of red: diagonal neighbors only.
        for y in 0..4i32 {
            for x in 0..4i32 {
                if (x + y) % 2 == 0 {
                    state.draw_pixel_at(x, y, RED);
                }
            }
        }
        state.flood_fill_at(0, 0, BLUE);
        assert_eq!(state.raster().get_pixel(0, 0), BLUE);
        // (1,1) is diagonal to the seed — untouched.
        assert_eq!(state.raster().get_pixel(1, 1), RED);
    }

    // ---- selection ----------------------------------------------------------

    /// 8×8 sprite with a 2×2 red block at (1,1)..(2,2).
    fn block_state() -> CanvasState {
        let mut state = CanvasState::new(8, 8);
        for y in 1..=2 {
            for x in 1..=2 {
                state.draw_pixel_at(x, y, RED);
            }
        }
        state.clear_history_for_test();
        state
    }

    impl CanvasState {
        fn clear_history_for_test(&mut self) {
            self.history.clear();
        }

        fn select_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
            self.start_marquee_at(x0, y0);
            self.update_marquee_at(x1, y1);
            self.end_marquee_selection();
        }
    }

    #[test]
    fn marquee_snapshots_only_content_cells() {
        let mut state = block_state();
        state.select_rect(0, 0, 3, 3);
        let sel = state.selection().unwrap();
        assert_eq!(sel.rect(), (0, 0, 3, 3));
        assert_eq!(sel.pixel_count(), 4);
        assert!(!sel.is_detached());
    }

    #[test]
    fn drag_move_conserves_pixels() {
        let mut state = block_state();
        state.select_rect(1, 1, 2, 2);

        state.start_dragging_at(1, 1);
        assert!(state.is_dragging_selection());
        // Source hole appears immediately.
        assert_eq!(state.raster().get_pixel(1, 1), PixelColor::Transparent);

        state.drag_selection_to(4, 4);
        state.end_dragging_selection();
        assert!(!state.is_dragging_selection());

        // Content moved by (+3,+3); old positions transparent.
        for y in 1..=2u32 {
            for x in 1..=2u32 {
                assert_eq!(state.raster().get_pixel(x, y), PixelColor::Transparent);
                assert_eq!(state.raster().get_pixel(x + 3, y + 3), RED);
            }
        }
    }

    #[test]
    fn undo_after_drag_restores_destination_only() {
        // The source-clear at drag start is not journaled: one undo after a
        // completed drag restores the destination cells to their pre-drop
        // colors and leaves the cleared source cells transparent.
        let mut state = block_state();
        state.draw_pixel_at(5, 5, BLUE);
        state.clear_history_for_test();

        state.select_rect(1, 1, 2, 2);
        state.start_dragging_at(1, 1);
        state.drag_selection_to(4, 4);
        state.end_dragging_selection();
        assert_eq!(state.undo_depth(), 1);
        // Destination (5,5) was overwritten by a moved red pixel.
        assert_eq!(state.raster().get_pixel(5, 5), RED);

        state.undo();
        // Destination cells restored (the blue pixel reappears)…
        assert_eq!(state.raster().get_pixel(5, 5), BLUE);
        assert_eq!(state.raster().get_pixel(4, 4), PixelColor::Transparent);
        // …but the source stays cleared.
        assert_eq!(state.raster().get_pixel(1, 1), PixelColor::Transparent);
    }

    #[test]
    fn drag_drops_pixels_pushed_off_grid() {
        let mut state = block_state();
        state.select_rect(1, 1, 2, 2);
        state.start_dragging_at(1, 1);
        // Shift left by two so column 1 lands off-grid at x = -1.
        state.drag_selection_to(-1, 1);
        let sel = state.selection().unwrap();
        assert_eq!(sel.pixel_count(), 2);
        // Dragging back does not resurrect them.
        state.drag_selection_to(1, 1);
        assert_eq!(state.selection().unwrap().pixel_count(), 2);
        state.end_dragging_selection();
    }

    #[test]
    fn delete_selection_clears_rect_as_one_entry() {
        let mut state = block_state();
        state.select_rect(0, 0, 3, 3);
        state.delete_selection();
        assert!(!state.has_selection());
        assert!(!state.has_content());
        assert_eq!(state.undo_depth(), 1);
        state.undo();
        assert_eq!(state.raster().get_pixel(1, 1), RED);
    }

    #[test]
    fn selection_ops_no_op_without_selection() {
        let mut state = block_state();
        state.delete_selection();
        state.end_dragging_selection();
        state.apply_selection();
        state.copy_selection();
        state.drag_selection_to(3, 3);
        assert!(state.raster().has_content());
        assert!(!state.can_undo());
    }

    #[test]
    fn copy_paste_round_trip() {
        let _guard = CLIP_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut state = block_state();
        state.select_rect(1, 1, 2, 2);
        state.copy_selection();
        assert!(state.has_clipboard_content());

        // Paste floats at (5,5): nothing applied to the raster yet.
        state.paste_at(5, 5);
        let sel = state.selection().unwrap();
        assert!(sel.is_detached());
        assert_eq!(sel.rect(), (5, 5, 6, 6));
        assert_eq!(state.raster().get_pixel(5, 5), PixelColor::Transparent);
        assert!(!state.can_undo());

        state.apply_selection();
        assert_eq!(state.raster().get_pixel(5, 5), RED);
        assert_eq!(state.raster().get_pixel(6, 6), RED);
        assert_eq!(state.undo_depth(), 1);
        // Original block untouched by copy/paste.
        assert_eq!(state.raster().get_pixel(1, 1), RED);

        state.undo();
        assert_eq!(state.raster().get_pixel(5, 5), PixelColor::Transparent);
    }

    #[test]
    fn paste_clips_to_grid_and_delete_discards_floating() {
        let _guard = CLIP_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut state = block_state();
        state.select_rect(1, 1, 2, 2);
        state.copy_selection();

        // Anchored at the far corner: only (7,7) survives clipping.
        state.paste_at(7, 7);
        assert_eq!(state.selection().unwrap().pixel_count(), 1);

        // Deleting a floating paste discards it without touching raster
        // or journal.
        state.delete_selection();
        assert!(!state.has_selection());
        assert!(!state.can_undo());
        assert_eq!(state.raster().get_pixel(7, 7), PixelColor::Transparent);
    }

    #[test]
    fn copy_requires_content() {
        let _guard = CLIP_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        set_clipboard(HashMap::new());
        let mut state = CanvasState::new(8, 8);
        state.select_rect(0, 0, 3, 3);
        // Marquee over empty cells has no content; copy must not clobber
        // the (empty) clipboard into a pastable state.
        state.copy_selection();
        assert!(!has_clipboard_content());
    }

    #[test]
    fn second_drag_after_drop_moves_the_same_content() {
        let mut state = block_state();
        state.select_rect(1, 1, 2, 2);
        state.start_dragging_at(1, 1);
        state.drag_selection_to(3, 3);
        state.end_dragging_selection();

        // Selection is still active over the dropped content; drag again.
        state.start_dragging_at(3, 3);
        assert_eq!(state.raster().get_pixel(3, 3), PixelColor::Transparent);
        state.drag_selection_to(4, 4);
        state.end_dragging_selection();
        assert_eq!(state.raster().get_pixel(4, 4), RED);
    }

    #[test]
    fn background_pattern_alternates_and_handles_size() {
        let bg = BackgroundPattern::default();
        assert_eq!(bg.color_for(0, 0), bg.color1);
        assert_eq!(bg.color_for(1, 0), bg.color2);
        assert_eq!(bg.color_for(1, 1), bg.color1);

        let big = BackgroundPattern { size: 2, ..bg };
        assert_eq!(big.color_for(0, 0), big.color_for(1, 1));
        assert_ne!(big.color_for(0, 0), big.color_for(2, 0));
    }
}
