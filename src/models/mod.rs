//! Data models for the CourseMaker application.
//!
//! Field names serialize in camelCase to match the web client.

mod course;
mod destination;
mod member;
mod page;
mod tag;

pub use course::*;
pub use destination::*;
pub use member::*;
pub use page::*;
pub use tag::*;
