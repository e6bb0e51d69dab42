//! Incremental listing of external paginated collections.
//!
//! A [`WatermarkListing`] pages through an [`ObjectLister`] and emits only
//! items that a persisted [`BucketListingCursor`] has not covered yet.

pub mod cursor;
pub mod lister;
pub mod watermark;

pub use cursor::BucketListingCursor;
pub use lister::{DirectoryLister, ListedObject, ListingPage, MemoryObjectLister, ObjectLister};
pub use watermark::{ListingPhase, WatermarkListing};
