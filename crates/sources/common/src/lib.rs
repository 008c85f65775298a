//! Page-source plumbing shared by every rendering backend.
//!
//! [`extractor`] turns a rendered ranking table into [`MarketRecord`]s and
//! [`scripted`] provides an in-memory source for driving the tracker
//! without a browser.
//!
//! [`MarketRecord`]: coinwatch_core::MarketRecord

pub mod extractor;
pub mod scripted;

pub use extractor::{parse_row, Extractor, RowLayout};
pub use scripted::{ScriptedPage, ScriptedRow, ScriptedSource, ScriptedStats};
