//! Drape - a message-passing rendering pipeline for user marks on a map.
//!
//! Two threads cooperate through typed message queues: the resource upload
//! thread ([`backend`]) owns the user marks and batches their geometry per
//! tile, while the render thread ([`frontend`]) owns the graphics context and
//! draws the visible tiles and the GUI widgets. [`engine::DrapeEngine`]
//! spawns both and exposes the public API.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod frontend;
pub mod geometry;
pub mod gui;
pub mod message;
pub mod render;
pub mod screen;
pub mod tile;
pub mod user_marks;
pub mod util;
