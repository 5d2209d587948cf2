//! Repository implementations for database operations.

mod participation_repo;

pub use participation_repo::{Participation, ParticipationRepository};
