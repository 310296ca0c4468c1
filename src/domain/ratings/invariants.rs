use super::entity::RatingsPage;
use crate::domain::{DomainError, DomainResult};

/// Validates the upstream contract for a ratings page.
pub fn validate_ratings_page(page: &RatingsPage) -> DomainResult<()> {
    for entry in &page.media_list {
        if entry.media.id <= 0 {
            return Err(DomainError::InvalidValue(format!(
                "Rated entry media id must be positive, got {}",
                entry.media.id
            )));
        }

        if !(0.0..=10.0).contains(&entry.score) {
            return Err(DomainError::InvalidValue(format!(
                "Rated entry score {} outside the 0-10 raw range",
                entry.score
            )));
        }
    }

    Ok(())
}
