//! # stickdrive Library
//!
//! Drive a two-motor ev3dev robot chassis with a gamepad analog stick.
//!
//! This library maps live analog-stick input to differential-drive motor
//! commands: each bound controller axis is an independent ordered event
//! stream whose samples are converted into bounded speed commands for
//! exactly one motor. The [`tracker`] module owns the lifecycle of that
//! mapping; [`mapper`] holds the pure stick-to-speed conversion.

pub mod config;
pub mod error;
pub mod layout;
pub mod mapper;
pub mod motor;
pub mod source;
pub mod tracker;
