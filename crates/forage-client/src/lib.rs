pub mod extract;
pub mod fetcher;
pub mod newsletter;
pub mod pacing;
pub mod video;

pub use extract::{PageContent, PageExtractor};
pub use fetcher::PageFetcher;
pub use newsletter::NewsletterCollector;
pub use pacing::{PacedFetcher, PacingConfig};
pub use video::VideoCollector;
