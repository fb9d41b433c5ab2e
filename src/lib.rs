//! PixelFE — a small desktop pixel-art editor.
//!
//! The editing core is the canvas subsystem in [`canvas`]: the sprite
//! raster, the screen↔grid view transform, the marquee selection engine
//! and flood fill, backed by the bounded undo journal in
//! [`components::history`].  Everything else (menus, dialogs, panels) is
//! thin UI glue in [`app`] that only ever talks to
//! [`canvas::CanvasState`].

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod app;
pub mod assets;
pub mod canvas;
pub mod components;
pub mod io;
