//! Skirmish - Tactical Session Engine

pub mod ai;
pub mod core;
pub mod engine;
pub mod events;
pub mod grid;
pub mod path;
pub mod turn;
