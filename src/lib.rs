//! Save/restore orchestration for a visual-novel runtime
//!
//! This crate lets independent presentation objects (video players, composite
//! sprite layers, ...) register as restorable, snapshots all of them at a
//! reached dialogue position, and rebuilds them later in priority order.
//!
//! # Architecture
//!
//! - `restoration`: registry, checkpoint position index, coordinator and stores
//! - `game_state`: per-session state that owns the registry and index
//! - `assets`: the asset loader boundary components load through
//! - `video`, `composite_sprite`: restorable presentation components
//! - `config`: restoration settings

pub mod assets;
pub mod composite_sprite;
pub mod config;
pub mod game_state;
pub mod restoration;
pub mod video;

pub use config::RestorationConfig;
pub use game_state::GameState;
