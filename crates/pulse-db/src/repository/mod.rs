//! # Repository Layer
//!
//! The record store repository. One repository covers all five category
//! tables; the category picks the table, the payload variant picks the
//! columns.

pub mod records;

pub use records::RecordStore;
