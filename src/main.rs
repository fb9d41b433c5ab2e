// GUI-subsystem binary: no console window is ever allocated on Windows.
#![windows_subsystem = "windows"]

use eframe::egui;
use pixelfe::app::PixelFEApp;
use pixelfe::{log_info, logger};

fn main() -> Result<(), eframe::Error> {
    // Initialize session log (overwrites previous session log)
    logger::init();
    log_info!("PixelFE {} starting", env!("CARGO_PKG_VERSION"));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([720.0, 480.0])
            .with_title("PixelFE"),
        ..Default::default()
    };

    eframe::run_native(
        "PixelFE",
        options,
        Box::new(|cc| Box::new(PixelFEApp::new(cc))),
    )
}
