pub mod entity;
pub mod invariants;

pub use entity::{
    CatalogPage, FuzzyDate, Media, MediaTag, MediaTitle, PageInfo, Season, StaffCredit, Studio,
    Trailer,
};
pub use invariants::validate_catalog_page;
