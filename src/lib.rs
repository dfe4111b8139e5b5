//! Volume Dial - animated volume readout for rotary dial control surfaces
//!
//! This library provides:
//! - A timer-driven smoother that eases the displayed value towards the target
//! - A per-dial controller that turns host events into throttled frame pushes
//! - A frame renderer producing PNG volume bars
//! - A broadcast bus for volume changes reported by the audio backend

pub mod bus;
pub mod config;
pub mod dial;
pub mod smoother;
