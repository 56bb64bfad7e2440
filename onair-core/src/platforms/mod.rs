// File: onair-core/src/platforms/mod.rs

pub mod obs;
