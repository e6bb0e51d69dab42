//! Watermark-driven incremental listing cycles.

use std::time::Duration;

use tracing::debug;

use super::cursor::BucketListingCursor;
use super::lister::{ListedObject, ObjectLister};

/// Where a listing is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingPhase {
    /// No cursor was found yet
    Init,
    /// Cursor loaded; the last cycle emitted items
    Scanning,
    /// The last cycle found nothing new
    Idle,
}

/// Runs listing cycles against a cursor.
///
/// A cycle only moves the cursor after every page was read, so a failed
/// cycle leaves it untouched and the next one starts from the same place.
#[derive(Debug, Clone)]
pub struct WatermarkListing {
    cursor: BucketListingCursor,
    phase: ListingPhase,
}

impl Default for WatermarkListing {
    fn default() -> Self {
        Self::new()
    }
}

impl WatermarkListing {
    pub fn new() -> Self {
        Self {
            cursor: BucketListingCursor::default(),
            phase: ListingPhase::Init,
        }
    }

    pub fn resume(cursor: Option<BucketListingCursor>) -> Self {
        match cursor {
            Some(cursor) => Self {
                cursor,
                phase: ListingPhase::Scanning,
            },
            None => Self::new(),
        }
    }

    pub fn phase(&self) -> ListingPhase {
        self.phase
    }

    pub fn cursor(&self) -> &BucketListingCursor {
        &self.cursor
    }

    /// Page through `lister` and return the items not seen before.
    ///
    /// Items modified after `cycle_start_ms - min_age` are left for a later
    /// cycle.
    pub async fn run_cycle(
        &mut self,
        lister: &dyn ObjectLister,
        cycle_start_ms: i64,
        min_age: Duration,
    ) -> anyhow::Result<Vec<ListedObject>> {
        self.phase = ListingPhase::Scanning;
        let min_age_ms = i64::try_from(min_age.as_millis()).unwrap_or(i64::MAX);
        let newest_allowed = cycle_start_ms.saturating_sub(min_age_ms);

        let mut emitted = Vec::new();
        let mut marker: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let page = lister.list_page(marker.as_deref()).await?;
            pages += 1;
            for object in page.objects {
                if !self.cursor.is_new(object.last_modified, &object.key) {
                    continue;
                }
                if object.last_modified > newest_allowed {
                    continue;
                }
                emitted.push(object);
            }
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        self.cursor
            .advance(emitted.iter().map(|o| (o.last_modified, o.key.as_str())));
        if emitted.is_empty() {
            self.phase = ListingPhase::Idle;
        }

        debug!(
            "Listing cycle read {} page(s), emitted {} item(s), watermark {}",
            pages,
            emitted.len(),
            self.cursor.watermark()
        );
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::lister::MemoryObjectLister;

    const NOW: i64 = 1_000_000;

    fn keys(objects: &[ListedObject]) -> Vec<&str> {
        objects.iter().map(|o| o.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_gap_free_across_cycles() {
        let lister = MemoryObjectLister::new(2);
        lister.set_objects(vec![ListedObject::new("a", 1, 0)]).await;

        let mut listing = WatermarkListing::new();
        assert_eq!(listing.phase(), ListingPhase::Init);

        let first = listing.run_cycle(&lister, NOW, Duration::ZERO).await.unwrap();
        assert_eq!(keys(&first), vec!["a"]);
        assert_eq!(listing.cursor(), &BucketListingCursor::new(1, ["a"]));

        lister
            .set_objects(vec![
                ListedObject::new("a", 1, 0),
                ListedObject::new("b", 1, 0),
                ListedObject::new("c", 2, 0),
            ])
            .await;
        let second = listing.run_cycle(&lister, NOW, Duration::ZERO).await.unwrap();
        assert_eq!(keys(&second), vec!["b", "c"]);
        assert_eq!(listing.cursor(), &BucketListingCursor::new(2, ["c"]));
        assert_eq!(listing.phase(), ListingPhase::Scanning);
    }

    #[tokio::test]
    async fn test_second_cycle_without_changes_is_idle() {
        let lister = MemoryObjectLister::new(10);
        lister
            .set_objects(vec![
                ListedObject::new("x", 5, 0),
                ListedObject::new("y", 5, 0),
                ListedObject::new("z", 3, 0),
            ])
            .await;

        let mut listing = WatermarkListing::new();
        assert_eq!(
            listing.run_cycle(&lister, NOW, Duration::ZERO).await.unwrap().len(),
            3
        );
        let cursor = listing.cursor().clone();

        let again = listing.run_cycle(&lister, NOW, Duration::ZERO).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(listing.cursor(), &cursor);
        assert_eq!(listing.phase(), ListingPhase::Idle);
    }

    #[tokio::test]
    async fn test_min_age_defers_recent_items() {
        let lister = MemoryObjectLister::new(10);
        lister
            .set_objects(vec![
                ListedObject::new("old", NOW - 10_000, 0),
                ListedObject::new("fresh", NOW - 100, 0),
            ])
            .await;

        let mut listing = WatermarkListing::new();
        let first = listing
            .run_cycle(&lister, NOW, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(keys(&first), vec!["old"]);

        let later = listing
            .run_cycle(&lister, NOW + 5_000, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(keys(&later), vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_resume_from_cursor() {
        let lister = MemoryObjectLister::new(1);
        lister
            .set_objects(vec![
                ListedObject::new("a", 7, 0),
                ListedObject::new("b", 7, 0),
                ListedObject::new("c", 8, 0),
            ])
            .await;

        let mut listing = WatermarkListing::resume(Some(BucketListingCursor::new(7, ["a"])));
        assert_eq!(listing.phase(), ListingPhase::Scanning);
        let emitted = listing.run_cycle(&lister, NOW, Duration::ZERO).await.unwrap();
        assert_eq!(keys(&emitted), vec!["b", "c"]);
    }
}
