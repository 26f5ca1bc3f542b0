//! Parsers for the on-disk container formats: map files, volume records,
//! and loose patch files.

pub(crate) mod map;
pub(crate) mod patch;
pub(crate) mod volume;
