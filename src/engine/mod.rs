//! # Engine Module
//!
//! Internal ECS engine implementation.
//!
//! This module contains all core ECS building blocks:
//! - Archetype storage
//! - Entity allocation
//! - Type-erased component descriptors
//! - Archetype selection filters
//! - Tick scheduling and systems
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod component;
pub mod entity;
pub mod archetype;
pub mod query;
pub mod manager;
pub mod systems;
pub mod schedule;
pub mod world;
