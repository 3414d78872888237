//! Shared types for the `lvl` level meter: configuration, platform paths,
//! the pipeline message protocol and the ffmpeg `ametadata` stream parser.

pub mod ametadata;
pub mod config;
pub mod platform;
pub mod protocol;
