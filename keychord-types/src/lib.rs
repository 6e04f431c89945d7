//! # Keychord Types
//!
//! Fundamental type definitions shared by the keychord resolution engine.
//!
//! ## Modules
//!
//! - [`action`] - Key bindings: what a matrix position does on each layer
//! - [`keycode`] - HID keyboard usage codes plus the consumer and system keys in the same table
//! - [`modifier`] - Modifier bit layouts, both side-agnostic combinations and HID report bits

#![no_std]

pub mod action;
pub mod keycode;
pub mod modifier;
