//! Application settings — persisted as a `key=value` text file.
//!
//! Location:
//!   Linux:    `~/.config/pixelfe/pixelfe_settings.cfg`  (XDG respected)
//!   Windows:  `%APPDATA%\PixelFE\pixelfe_settings.cfg`
//!   macOS:    `~/Library/Application Support/PixelFE/pixelfe_settings.cfg`

use std::path::PathBuf;

use eframe::egui;
use egui::Color32;

use crate::canvas::BackgroundPattern;

#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    pub dark_mode: bool,
    pub show_pixel_grid: bool,
    /// Checkerboard squares rendered behind transparent cells.
    pub checker_color1: Color32,
    pub checker_color2: Color32,
    pub checker_size: u32,
    /// Default scale offered by the export dialog.
    pub export_scale: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            dark_mode: true,
            show_pixel_grid: true,
            checker_color1: Color32::from_gray(200),
            checker_color2: Color32::from_gray(160),
            checker_size: 1,
            export_scale: 8,
        }
    }
}

impl AppSettings {
    /// The checkerboard config handed to the canvas render call each frame.
    pub fn background_pattern(&self) -> BackgroundPattern {
        BackgroundPattern {
            color1: self.checker_color1,
            color2: self.checker_color2,
            size: self.checker_size.max(1),
        }
    }

    /// Path to the settings file; `None` when no usable directory exists.
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("pixelfe");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("pixelfe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("PixelFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("pixelfe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("PixelFE");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("pixelfe_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("pixelfe_settings.cfg")))
        }
    }

    /// Serialize a Color32 as "r,g,b,a"
    fn color_to_str(c: Color32) -> String {
        format!("{},{},{},{}", c.r(), c.g(), c.b(), c.a())
    }

    /// Parse a Color32 from "r,g,b,a"
    fn str_to_color(s: &str) -> Option<Color32> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            let a = parts[3].trim().parse::<u8>().ok()?;
            Some(Color32::from_rgba_unmultiplied(r, g, b, a))
        } else {
            None
        }
    }

    /// Save settings to disk.  Failures are ignored — settings are a
    /// convenience, never worth crashing over.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        let content = format!(
            "dark_mode={}\n\
             show_pixel_grid={}\n\
             checker_color1={}\n\
             checker_color2={}\n\
             checker_size={}\n\
             export_scale={}\n",
            self.dark_mode,
            self.show_pixel_grid,
            Self::color_to_str(self.checker_color1),
            Self::color_to_str(self.checker_color2),
            self.checker_size,
            self.export_scale,
        );
        let _ = std::fs::write(path, content);
    }

    /// Load settings from disk (returns defaults if missing or corrupt).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };

        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "dark_mode" => {
                    if let Ok(v) = val.parse() {
                        s.dark_mode = v;
                    }
                }
                "show_pixel_grid" => {
                    if let Ok(v) = val.parse() {
                        s.show_pixel_grid = v;
                    }
                }
                "checker_color1" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.checker_color1 = c;
                    }
                }
                "checker_color2" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.checker_color2 = c;
                    }
                }
                "checker_size" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.checker_size = v.max(1);
                    }
                }
                "export_scale" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.export_scale = v.max(1);
                    }
                }
                _ => {}
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_round_trips_through_config_string() {
        let c = Color32::from_rgba_unmultiplied(12, 34, 56, 78);
        assert_eq!(AppSettings::str_to_color(&AppSettings::color_to_str(c)), Some(c));
        assert_eq!(AppSettings::str_to_color("not,a,color"), None);
    }

    #[test]
    fn background_pattern_enforces_minimum_size() {
        let settings = AppSettings {
            checker_size: 0,
            ..Default::default()
        };
        assert_eq!(settings.background_pattern().size, 1);
    }
}
