//! Squat rep counting and scoring from pose landmark streams.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod counter;
pub mod error;
pub mod geometry;
pub mod input;
pub mod job;
pub mod legs;
pub mod logging;
pub mod pose;
pub mod score;
pub mod trace;
pub mod tracker;
