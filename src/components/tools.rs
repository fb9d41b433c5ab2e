//! Tool strip — the pixel tools and their selector panel.

use eframe::egui;

/// Active canvas tool.  All of these are single-cell tools; there are no
/// brush sizes or shapes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Pen,
    Eraser,
    Bucket,
    Select,
    Pan,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[Tool::Pen, Tool::Eraser, Tool::Bucket, Tool::Select, Tool::Pan]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Pen => "Pen",
            Tool::Eraser => "Eraser",
            Tool::Bucket => "Bucket",
            Tool::Select => "Select",
            Tool::Pan => "Pan",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Tool::Pen => "✏",
            Tool::Eraser => "⬜",
            Tool::Bucket => "🌢",
            Tool::Select => "▭",
            Tool::Pan => "✋",
        }
    }

    /// One-line hint shown in the status bar.
    pub fn status_hint(&self) -> &'static str {
        match self {
            Tool::Pen => "Drag to draw with the primary color",
            Tool::Eraser => "Drag to erase cells to transparent",
            Tool::Bucket => "Click to flood-fill the connected region",
            Tool::Select => "Drag a marquee; drag inside it to move",
            Tool::Pan => "Drag to pan the view",
        }
    }

    /// Keyboard shortcut that activates the tool.
    pub fn shortcut(&self) -> egui::Key {
        match self {
            Tool::Pen => egui::Key::P,
            Tool::Eraser => egui::Key::E,
            Tool::Bucket => egui::Key::B,
            Tool::Select => egui::Key::M,
            Tool::Pan => egui::Key::H,
        }
    }
}

/// The tool selector strip.
pub struct ToolsPanel {
    pub active: Tool,
}

impl Default for ToolsPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolsPanel {
    pub fn new() -> Self {
        Self { active: Tool::default() }
    }

    pub fn show(&mut self, ui: &mut egui::Ui) {
        ui.label("Tools");
        for &tool in Tool::all() {
            let selected = self.active == tool;
            let text = format!("{} {}", tool.icon(), tool.label());
            if ui.selectable_label(selected, text).clicked() {
                self.active = tool;
            }
        }
    }

    /// Apply single-key tool shortcuts.  Skipped while a text field has
    /// focus.
    pub fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        for &tool in Tool::all() {
            if ctx.input(|i| i.key_pressed(tool.shortcut())) {
                self.active = tool;
            }
        }
    }
}
