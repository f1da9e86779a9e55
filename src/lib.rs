//! RetroWave visualizer core
//!
//! Real-time audio analysis from switchable sources, an adaptive quality
//! loop, a bank of stateful renderers and a beat-driven rhythm game, all
//! driven one frame at a time through [`state::Session`].

pub mod audio;
pub mod cli;
pub mod clock;
pub mod config;
pub mod game;
pub mod quality;
pub mod state;
pub mod viz;
