// src/lib.rs

//! Listing crawler library
//!
//! Splits a capped, paginated search into sub-queries small enough to page
//! through completely, records every probe in a resumable frontier, and
//! fetches the structured records of each result page.

pub mod error;
pub mod models;
pub mod partition;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
