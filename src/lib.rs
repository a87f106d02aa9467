//! Run single source files on a remote Piston sandbox, from the command line
//! or an interactive console with an assistant panel.

pub mod assistant;
pub mod config;
pub mod execution;
pub mod handlers;
pub mod language;
pub mod printer;
pub mod session;
pub mod source;
pub mod tui;
