pub mod entity;
pub mod invariants;

pub use entity::{RatedEntry, RatingsPage};
pub use invariants::validate_ratings_page;
