//! Command-line front end for notekit
mod app;
mod main;

pub use app::*;
pub use main::*;
