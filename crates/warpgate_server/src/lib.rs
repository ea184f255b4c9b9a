//! The portal plugin and the in-memory host it runs against.

pub mod commands;
pub mod config;
pub mod decoration;
pub mod detector;
pub mod host;
pub mod listeners;
pub mod player;
pub mod plugin;
pub mod portal_gun;
pub mod server;
pub mod status;
pub mod world;
