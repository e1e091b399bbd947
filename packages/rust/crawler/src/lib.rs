//! Listing fetcher, content extraction, and page layouts.
//!
//! This crate provides:
//! - [`fetcher`]: Fetches the listing page and emits [`Regulation`] records
//! - [`extractor`]: Pulls the substantive text out of a document page
//! - [`layouts`]: Known container layouts, probed in priority order
//! - [`normalize`]: ROC date conversion and link resolution
//!
//! [`Regulation`]: regcrawler_shared::Regulation

pub mod extractor;
pub mod fetcher;
pub mod layouts;
pub mod listing;
pub mod normalize;

pub use extractor::ContentExtractor;
pub use fetcher::{FetchReport, Fetcher};
pub use layouts::{ContainerLayout, ContentLayout, LayoutRegistry};
pub use listing::{ListingRow, ParsedListing, parse_listing};
pub use normalize::{resolve_link, to_gregorian_date};
