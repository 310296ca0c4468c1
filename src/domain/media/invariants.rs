use super::entity::CatalogPage;
use crate::domain::{DomainError, DomainResult};

/// Validates the upstream contract for a catalog page.
/// A violation here means the API answered but broke its shape, which
/// callers must be able to tell apart from a transport failure.
pub fn validate_catalog_page(page: &CatalogPage) -> DomainResult<()> {
    if page.page_info.per_page == 0 && !page.media.is_empty() {
        return Err(DomainError::InvariantViolation(
            "Catalog page carries media but reports per_page = 0".to_string(),
        ));
    }

    if page.media.len() > page.page_info.per_page as usize && page.page_info.per_page > 0 {
        return Err(DomainError::InvariantViolation(format!(
            "Catalog page carries {} media, more than per_page {}",
            page.media.len(),
            page.page_info.per_page
        )));
    }

    for media in &page.media {
        if media.id <= 0 {
            return Err(DomainError::InvalidValue(format!(
                "Catalog media id must be positive, got {}",
                media.id
            )));
        }
    }

    Ok(())
}
