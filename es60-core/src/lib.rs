//! # ES60 Core
//!
//! Reader, writer and correction engine for Simrad ES60 `.raw` files.
//!
//! The ES60 adds a deterministic triangle wave (period 2721 pings) to every
//! power sample it records. This crate frames and decodes the telegrams in a
//! recording, removes the wave for a known starting ping, and estimates the
//! unknown starting phase from the data itself.
//!
//! ## Modules
//!
//! - `constants`: Telegram layout constants and limits
//! - `error`: Error type shared by every operation
//! - `timestamp`: 100ns tick timestamps used in telegram headers
//! - `telegram`: Telegram, header and payload types
//! - `codec`: Byte order detection, telegram framing and encoding
//! - `raw`, `config`, `nmea`: Lazily decoded payloads
//! - `builder`: Construction of telegrams from typed fields
//! - `reader`: File sessions with offset tracking and random access
//! - `index`: Per-channel telegram offset tables
//! - `track`: NMEA track point grouping and speed estimation
//! - `wave`: Triangle wave model and ping frame counting
//! - `corrector`: Streaming correction of a file chain
//! - `stats`: Per-channel ping statistics across a file chain
//! - `search`: Phase search and reliability classification

#![warn(missing_docs)]

pub mod builder;
pub mod codec;
pub mod config;
pub mod constants;
pub mod corrector;
pub mod error;
pub mod index;
pub mod nmea;
pub mod raw;
pub mod reader;
pub mod search;
pub mod stats;
pub mod telegram;
pub mod timestamp;
pub mod track;
pub mod wave;

// Re-export commonly used types
pub use codec::ByteOrder;
pub use error::TelegramError;
pub use reader::TelegramFile;
pub use telegram::{Payload, Telegram, TelegramHeader, TelegramKind};
pub use timestamp::Timestamp;

/// Result type alias for ES60 operations
pub type Result<T> = core::result::Result<T, TelegramError>;
