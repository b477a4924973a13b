//! Course assembly service.
//!
//! Turns course requests into a consistent aggregate of course row, itinerary rows and tag links,
//! and keeps that aggregate consistent across update, view counting and delete. Every public
//! operation runs inside one database transaction that is handed explicitly to each collaborator.

mod collaborators;
mod course;
mod validation;

pub use collaborators::*;
pub use course::*;
pub use validation::CourseDraft;

#[cfg(test)]
mod tests;
