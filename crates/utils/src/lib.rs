//! Byte-cursor support shared by the resource-store crates.

pub mod data_reader;
