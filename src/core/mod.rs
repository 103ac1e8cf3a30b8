//! RPM package codec
//!
//! Leaves first:
//!
//! - [`tag`] - Known tags, their ids and declared wire types
//! - [`types`] - Primitive codec for header values
//! - [`io`] - Byte cursor and alignment helpers
//! - [`header`] - Header structure: index array plus storage blob
//! - [`lead`] - Fixed 96-byte preamble
//! - [`cpio`] - newc archive members and trailer
//! - [`compression`] - gzip / zstd payload compression
//! - [`flags`] - Dependency and file flag sets
//! - [`file`] - File entries and their one-shot builder
//! - [`builder`] - Package assembler
//! - [`package`] - Package parser
//! - [`validation`] - Name, version and target checks
//! - [`manifest`] - TOML package manifest
//! - [`error`] - Error types

pub mod builder;
pub mod compression;
pub mod cpio;
pub mod error;
pub mod file;
pub mod flags;
pub mod header;
pub mod io;
pub mod lead;
pub mod manifest;
pub mod package;
pub mod tag;
pub mod types;
pub mod validation;
