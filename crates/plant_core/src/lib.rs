//! Core types and utilities shared by the plant generation crates.
//!
//! This crate provides the foundational types used across the workspace:
//! - The error taxonomy for configuration and structural failures
//! - Tick timing for the growth animation loop
//! - Transform state for decorative shape nodes

pub mod error;
pub mod time;
pub mod transform;

pub use error::*;
pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{Mat4, Quat, Vec2, Vec3};
