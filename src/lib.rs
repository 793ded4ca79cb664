pub mod app;
pub mod champions;
pub mod config;
pub mod ddragon;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod output;
pub mod store;
pub mod tiles;
pub mod tui;
