//! Archive format internals
//!
//! - [`pickle`] - length-prefixed binary buffer used for the header fields
//! - [`namespace`] - directory / file / link tree and its JSON form
//! - [`integrity`] - whole-file and per-block SHA-256 digests
//! - [`header`] - on-disk header framing
//! - [`builder`] - packing, with [`ordering`], [`unpack`] and [`crawl`]
//! - [`reader`] - listing and extraction, with [`cache`]
//! - [`paths`] - containment checks shared by packing and extraction

pub mod builder;
pub mod cache;
pub mod config;
pub mod crawl;
pub mod error;
pub mod header;
pub mod integrity;
pub mod namespace;
pub mod ordering;
pub mod paths;
pub mod pickle;
pub mod platform;
pub mod reader;
pub mod unpack;
