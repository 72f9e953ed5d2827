//! HTTP request handlers.

pub mod basic;
pub mod commands;
pub mod devices;
pub mod operators;
