//! Application shell — menu bar, keyboard shortcuts, dialogs, status bar.
//!
//! Deliberately thin: every edit is a call into [`CanvasState`]; this file
//! never touches the raster, journal or selection directly.

use eframe::egui;
use egui::Pos2;

use crate::assets::AppSettings;
use crate::canvas::{Canvas, CanvasState, PixelColor};
use crate::components::colors::{self, ColorsPanel};
use crate::components::tools::ToolsPanel;
use crate::io::FileHandler;
use crate::{log_err, log_info};

/// Dimensions of a fresh document.
const DEFAULT_SPRITE: (u32, u32) = (32, 32);

// ============================================================================
// DIALOGS
// ============================================================================

/// Modal dialog asking for sprite dimensions (New / Resize).
struct SizeDialog {
    open: bool,
    title: &'static str,
    width_text: String,
    height_text: String,
}

impl SizeDialog {
    fn closed(title: &'static str) -> Self {
        Self {
            open: false,
            title,
            width_text: String::new(),
            height_text: String::new(),
        }
    }

    fn open_with(&mut self, w: u32, h: u32) {
        self.open = true;
        self.width_text = w.to_string();
        self.height_text = h.to_string();
    }

    /// Returns `Some((w, h))` the frame the user confirms valid input.
    fn show(&mut self, ctx: &egui::Context) -> Option<(u32, u32)> {
        if !self.open {
            return None;
        }
        let mut result = None;
        let mut cancelled = false;
        let mut open = self.open;
        egui::Window::new(self.title)
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Width");
                    ui.text_edit_singleline(&mut self.width_text);
                });
                ui.horizontal(|ui| {
                    ui.label("Height");
                    ui.text_edit_singleline(&mut self.height_text);
                });
                let parsed = self
                    .width_text
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .zip(self.height_text.trim().parse::<u32>().ok())
                    .filter(|&(w, h)| w > 0 && h > 0);
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(parsed.is_some(), egui::Button::new("OK"))
                        .clicked()
                    {
                        result = parsed;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                });
            });
        self.open = open && result.is_none() && !cancelled;
        result
    }
}

/// "Discard current sprite?" confirmation before New wipes content.
struct ConfirmDialog {
    open: bool,
}

impl ConfirmDialog {
    /// Returns true the frame the user confirms the discard.
    fn show(&mut self, ctx: &egui::Context) -> bool {
        if !self.open {
            return false;
        }
        let mut discard = false;
        let mut cancelled = false;
        let mut open = self.open;
        egui::Window::new("Discard Sprite?")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label("The current sprite has unsaved content.");
                ui.horizontal(|ui| {
                    if ui.button("Discard").clicked() {
                        discard = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                });
            });
        self.open = open && !discard && !cancelled;
        discard
    }
}

/// Export dialog: pick the integer scale, then the destination file.
struct ExportDialog {
    open: bool,
    scale: u32,
}

impl ExportDialog {
    fn show(&mut self, ctx: &egui::Context) -> Option<u32> {
        if !self.open {
            return None;
        }
        let mut result = None;
        let mut cancelled = false;
        let mut open = self.open;
        egui::Window::new("Export PNG")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Scale");
                    ui.add(egui::DragValue::new(&mut self.scale).clamp_range(1..=64));
                    ui.label("× per cell");
                });
                ui.horizontal(|ui| {
                    if ui.button("Export…").clicked() {
                        result = Some(self.scale.max(1));
                    }
                    if ui.button("Cancel").clicked() {
                        cancelled = true;
                    }
                });
            });
        self.open = open && result.is_none() && !cancelled;
        result
    }
}

// ============================================================================
// APP
// ============================================================================

pub struct PixelFEApp {
    state: CanvasState,
    canvas: Canvas,
    tools_panel: ToolsPanel,
    colors_panel: ColorsPanel,
    settings: AppSettings,
    files: FileHandler,
    status: String,
    new_dialog: SizeDialog,
    resize_canvas_dialog: SizeDialog,
    resize_sprite_dialog: SizeDialog,
    confirm_new: ConfirmDialog,
    export_dialog: ExportDialog,
}

impl PixelFEApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        cc.egui_ctx.set_visuals(if settings.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });
        let export_scale = settings.export_scale;
        Self {
            state: CanvasState::new(DEFAULT_SPRITE.0, DEFAULT_SPRITE.1),
            canvas: Canvas::new(),
            tools_panel: ToolsPanel::new(),
            colors_panel: ColorsPanel::new(),
            settings,
            files: FileHandler::new(),
            status: String::new(),
            new_dialog: SizeDialog::closed("New Sprite"),
            resize_canvas_dialog: SizeDialog::closed("Resize Canvas"),
            resize_sprite_dialog: SizeDialog::closed("Resize Sprite"),
            confirm_new: ConfirmDialog { open: false },
            export_dialog: ExportDialog {
                open: false,
                scale: export_scale,
            },
        }
    }

    fn any_dialog_open(&self) -> bool {
        self.new_dialog.open
            || self.resize_canvas_dialog.open
            || self.resize_sprite_dialog.open
            || self.confirm_new.open
            || self.export_dialog.open
    }

    /// Viewport-local canvas center, the fallback paste anchor.
    fn canvas_center_local(&self) -> Pos2 {
        match self.canvas.last_canvas_rect {
            Some(rect) => Pos2::new(rect.width() / 2.0, rect.height() / 2.0),
            None => Pos2::new(320.0, 320.0),
        }
    }

    /// Viewport-local pointer position when it hovers the canvas.
    fn pointer_on_canvas(&self, ctx: &egui::Context) -> Option<Pos2> {
        let rect = self.canvas.last_canvas_rect?;
        let pos = ctx.input(|i| i.pointer.hover_pos())?;
        if rect.contains(pos) {
            Some(Pos2::new(pos.x - rect.min.x, pos.y - rect.min.y))
        } else {
            None
        }
    }

    fn request_new_sprite(&mut self) {
        if self.state.has_content() {
            self.confirm_new.open = true;
        } else {
            self.new_dialog.open_with(DEFAULT_SPRITE.0, DEFAULT_SPRITE.1);
        }
    }

    fn open_image(&mut self) {
        let Some(path) = self.files.pick_import_path() else {
            return;
        };
        match self.state.load_image(&path) {
            Ok(()) => {
                self.status = format!(
                    "Opened {} ({}×{})",
                    path.display(),
                    self.state.raster().width(),
                    self.state.raster().height()
                );
            }
            Err(e) => {
                log_err!("Open {} failed: {}", path.display(), e);
                self.status = format!("Could not open image: {}", e);
            }
        }
    }

    fn export_image(&mut self, scale: u32) {
        let Some(path) = self.files.pick_export_path() else {
            return;
        };
        match self.state.export_image(&path, scale) {
            Ok(()) => {
                log_info!("Exported {} at {}×", path.display(), scale);
                self.status = format!("Exported {}", path.display());
                if self.settings.export_scale != scale {
                    self.settings.export_scale = scale;
                    self.settings.save();
                }
            }
            Err(e) => {
                log_err!("Export {} failed: {}", path.display(), e);
                self.status = format!("Export failed: {}", e);
            }
        }
    }

    fn load_palette(&mut self) {
        let Some(path) = self.files.pick_palette_path() else {
            return;
        };
        match colors::load_palette(&path) {
            Ok(palette) => {
                self.status = format!("Loaded palette with {} colors", palette.len());
                self.colors_panel.set_palette(palette);
            }
            Err(e) => {
                log_err!("Palette {} failed: {}", path.display(), e);
                self.status = format!("Could not load palette: {}", e);
            }
        }
    }

    fn paste(&mut self, ctx: &egui::Context) {
        let anchor = self
            .pointer_on_canvas(ctx)
            .unwrap_or_else(|| self.canvas_center_local());
        self.state.paste_from_clipboard(anchor);
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if self.any_dialog_open() {
            return;
        }
        self.tools_panel.handle_shortcuts(ctx);

        let command = ctx.input(|i| i.modifiers.command);
        if command {
            if ctx.input(|i| i.key_pressed(egui::Key::Z)) {
                self.state.undo();
            }
            if ctx.input(|i| i.key_pressed(egui::Key::C)) {
                self.state.copy_selection();
            }
            if ctx.input(|i| i.key_pressed(egui::Key::V)) {
                self.paste(ctx);
            }
        }

        if ctx.wants_keyboard_input() {
            return;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace)) {
            self.state.delete_selection();
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.state.clear_selection();
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Enter)) {
            self.state.apply_selection();
        }
    }

    fn show_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("New…").clicked() {
                        self.request_new_sprite();
                        ui.close_menu();
                    }
                    if ui.button("Open Image…").clicked() {
                        self.open_image();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Export PNG…").clicked() {
                        self.export_dialog.open = true;
                        self.export_dialog.scale = self.settings.export_scale;
                        ui.close_menu();
                    }
                    if ui.button("Load Palette…").clicked() {
                        self.load_palette();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("Edit", |ui| {
                    if ui
                        .add_enabled(self.state.can_undo(), egui::Button::new("Undo"))
                        .clicked()
                    {
                        self.state.undo();
                        ui.close_menu();
                    }
                    ui.separator();

                    let has_sel = self.state.has_selection();
                    let floating = self.state.selection().is_some_and(|s| s.is_detached());
                    if ui
                        .add_enabled(has_sel, egui::Button::new("Copy"))
                        .clicked()
                    {
                        self.state.copy_selection();
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(self.state.has_clipboard_content(), egui::Button::new("Paste"))
                        .clicked()
                    {
                        self.paste(ctx);
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(floating, egui::Button::new("Apply Selection"))
                        .clicked()
                    {
                        self.state.apply_selection();
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(has_sel, egui::Button::new("Delete Selection"))
                        .clicked()
                    {
                        self.state.delete_selection();
                        ui.close_menu();
                    }
                    if ui
                        .add_enabled(has_sel, egui::Button::new("Select None"))
                        .clicked()
                    {
                        self.state.clear_selection();
                        ui.close_menu();
                    }
                });

                ui.menu_button("Sprite", |ui| {
                    if ui.button("Resize Canvas…").clicked() {
                        self.resize_canvas_dialog
                            .open_with(self.state.raster().width(), self.state.raster().height());
                        ui.close_menu();
                    }
                    if ui.button("Resize Sprite…").clicked() {
                        self.resize_sprite_dialog
                            .open_with(self.state.raster().width(), self.state.raster().height());
                        ui.close_menu();
                    }
                });

                ui.menu_button("View", |ui| {
                    let center = self.canvas_center_local();
                    if ui.button("Zoom In").clicked() {
                        self.state.zoom_at(center, 1);
                        ui.close_menu();
                    }
                    if ui.button("Zoom Out").clicked() {
                        self.state.zoom_at(center, -1);
                        ui.close_menu();
                    }
                    if ui.button("Reset View").clicked() {
                        self.state.view.reset();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui
                        .checkbox(&mut self.settings.show_pixel_grid, "Pixel Grid")
                        .changed()
                    {
                        self.settings.save();
                    }
                    if ui
                        .checkbox(&mut self.settings.dark_mode, "Dark Mode")
                        .changed()
                    {
                        ctx.set_visuals(if self.settings.dark_mode {
                            egui::Visuals::dark()
                        } else {
                            egui::Visuals::light()
                        });
                        self.settings.save();
                    }
                });
            });
        });
    }

    fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let raster = self.state.raster();
                ui.label(format!("{}×{}", raster.width(), raster.height()));
                ui.separator();
                ui.label(format!("{:.0}%", self.state.view.zoom() * 100.0));
                ui.separator();
                if let Some(local) = self.pointer_on_canvas(ctx)
                    && let Some((cx, cy)) = self.state.cursor_cell(local)
                {
                    ui.label(format!("({}, {})", cx, cy));
                    ui.separator();
                }
                ui.label(self.tools_panel.active.status_hint());
                if !self.status.is_empty() {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(&self.status);
                    });
                }
            });
        });
    }

    fn show_dialogs(&mut self, ctx: &egui::Context) {
        if self.confirm_new.show(ctx) {
            self.new_dialog.open_with(DEFAULT_SPRITE.0, DEFAULT_SPRITE.1);
        }
        if let Some((w, h)) = self.new_dialog.show(ctx) {
            if (w, h) == (self.state.raster().width(), self.state.raster().height()) {
                // Same dimensions: wipe in place, keeping the view framing.
                self.state.clear();
            } else {
                self.state = CanvasState::new(w, h);
            }
            self.status = format!("New {}×{} sprite", w, h);
            log_info!("New sprite {}×{}", w, h);
        }
        if let Some((w, h)) = self.resize_canvas_dialog.show(ctx) {
            match self.state.resize_canvas(w, h) {
                Ok(()) => self.status = format!("Canvas resized to {}×{}", w, h),
                Err(e) => {
                    log_err!("Resize canvas failed: {}", e);
                    self.status = format!("Resize failed: {}", e);
                }
            }
        }
        if let Some((w, h)) = self.resize_sprite_dialog.show(ctx) {
            match self.state.resize_sprite(w, h) {
                Ok(()) => self.status = format!("Sprite resampled to {}×{}", w, h),
                Err(e) => {
                    log_err!("Resize sprite failed: {}", e);
                    self.status = format!("Resize failed: {}", e);
                }
            }
        }
        if let Some(scale) = self.export_dialog.show(ctx) {
            self.export_image(scale);
        }
    }
}

impl eframe::App for PixelFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_shortcuts(ctx);
        self.show_menu_bar(ctx);
        self.show_status_bar(ctx);

        egui::SidePanel::left("tool_panel")
            .resizable(false)
            .default_width(170.0)
            .show(ctx, |ui| {
                self.tools_panel.show(ui);
                ui.separator();
                self.colors_panel.show(ui);
            });

        if self.colors_panel.want_load_palette {
            self.colors_panel.want_load_palette = false;
            self.load_palette();
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let draw_color = PixelColor::from_color32(self.colors_panel.primary_color());
                let background = self.settings.background_pattern();
                self.canvas.show(
                    ui,
                    &mut self.state,
                    self.tools_panel.active,
                    draw_color,
                    &background,
                    self.settings.show_pixel_grid,
                );
            });

        self.show_dialogs(ctx);
    }
}
