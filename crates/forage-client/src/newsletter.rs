use forage_core::error::AppError;
use forage_core::models::{NewContentItem, SourceType, compute_hash};
use forage_core::retry::RetryPolicy;
use forage_core::traits::{ContentStore, Fetcher, UnitCollector};

use crate::extract::PageExtractor;

/// Collects one newsletter page per attempt.
///
/// The source id is the page URL. Fetching runs under the collector's
/// retry policy; extraction and persistence failures surface as
/// permanent errors. A page whose body hash already exists in the
/// content store is treated as a successful no-op (the source is alive,
/// just unchanged since the last run).
#[derive(Clone)]
pub struct NewsletterCollector<F, S>
where
    F: Fetcher,
    S: ContentStore,
{
    fetcher: F,
    store: S,
    retry: RetryPolicy,
    extractor: PageExtractor,
}

impl<F, S> NewsletterCollector<F, S>
where
    F: Fetcher,
    S: ContentStore,
{
    pub fn new(fetcher: F, store: S, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            store,
            retry,
            extractor: PageExtractor::new(),
        }
    }
}

impl<F, S> UnitCollector for NewsletterCollector<F, S>
where
    F: Fetcher,
    S: ContentStore,
{
    async fn attempt(&self, source_id: &str) -> Result<(), AppError> {
        let html = self
            .retry
            .execute("newsletter fetch", || self.fetcher.fetch(source_id))
            .await?;
        tracing::debug!(%source_id, bytes = html.len(), "Fetched newsletter page");

        let page = self.extractor.extract(&html, source_id)?;
        let content_hash = compute_hash(&page.body);

        if self.store.find_by_hash(&content_hash).await?.is_some() {
            tracing::info!(%source_id, "Newsletter content unchanged, nothing to store");
            return Ok(());
        }

        let item = NewContentItem {
            source_id: source_id.to_string(),
            source_type: SourceType::Newsletter,
            title: page.title,
            body: page.body,
            url: source_id.to_string(),
            published_at: page.published_at,
            content_hash,
        };
        let id = self.store.save(&item).await?;
        tracing::info!(%source_id, %id, title = %item.title, "Stored newsletter item");
        Ok(())
    }
}
