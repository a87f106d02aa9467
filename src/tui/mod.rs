//! Interactive console: output view, stdin box and assistant panel (Ratatui).

pub mod app;
pub mod clipboard;
pub mod events;
pub mod handler;
pub mod ui;

pub use handler::run_console;
