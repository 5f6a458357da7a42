use forage_core::error::AppError;
use forage_core::models::{NewContentItem, SourceType, compute_hash};
use forage_core::retry::RetryPolicy;
use forage_core::traits::{ContentStore, Fetcher, UnitCollector};
use serde::Deserialize;
use url::Url;

/// Collects metadata for one video per attempt.
///
/// The source id is a video URL in any of the usual shapes (watch,
/// short link, embed, shorts). Unrecognized shapes are permanent
/// validation failures; the oEmbed metadata fetch runs under the
/// collector's retry policy. Items are deduplicated on video id + title
/// so an unchanged video is a successful no-op on later runs.
#[derive(Clone)]
pub struct VideoCollector<F, S>
where
    F: Fetcher,
    S: ContentStore,
{
    fetcher: F,
    store: S,
    retry: RetryPolicy,
}

/// Subset of the oEmbed response we keep.
#[derive(Debug, Deserialize)]
struct OembedMeta {
    title: String,
    #[serde(default)]
    author_name: String,
    #[serde(default)]
    author_url: Option<String>,
}

impl<F, S> VideoCollector<F, S>
where
    F: Fetcher,
    S: ContentStore,
{
    pub fn new(fetcher: F, store: S, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            store,
            retry,
        }
    }
}

impl<F, S> UnitCollector for VideoCollector<F, S>
where
    F: Fetcher,
    S: ContentStore,
{
    async fn attempt(&self, source_id: &str) -> Result<(), AppError> {
        let video_id = parse_video_id(source_id).ok_or_else(|| {
            AppError::Validation(format!("Not a recognizable video URL: {source_id}"))
        })?;

        let endpoint = oembed_endpoint(&video_id);
        let raw = self
            .retry
            .execute("video metadata fetch", || self.fetcher.fetch(&endpoint))
            .await?;
        let meta: OembedMeta = serde_json::from_str(&raw)?;

        let content_hash = compute_hash(&format!("{video_id}:{}", meta.title));
        if self.store.find_by_hash(&content_hash).await?.is_some() {
            tracing::info!(%source_id, %video_id, "Video already collected, nothing to store");
            return Ok(());
        }

        let mut body = format!("{}\nby {}", meta.title, meta.author_name);
        if let Some(channel) = &meta.author_url {
            body.push('\n');
            body.push_str(channel);
        }

        let item = NewContentItem {
            source_id: source_id.to_string(),
            source_type: SourceType::VideoChannel,
            title: meta.title,
            body,
            url: source_id.to_string(),
            published_at: None,
            content_hash,
        };
        let id = self.store.save(&item).await?;
        tracing::info!(%source_id, %video_id, %id, "Stored video item");
        Ok(())
    }
}

/// Pull the 11-character video id out of the common URL shapes.
fn parse_video_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?.trim_start_matches("www.");

    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "m.youtube.com" => {
            if url.path() == "/watch" {
                url.query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned())
            } else {
                let mut segments = url.path_segments()?;
                match segments.next() {
                    Some("embed") | Some("shorts") | Some("live") => {
                        segments.next().map(str::to_string)
                    }
                    _ => None,
                }
            }
        }
        _ => None,
    }?;

    let valid = candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then_some(candidate)
}

fn oembed_endpoint(video_id: &str) -> String {
    // video_id charset is validated, so the nested URL needs no escaping
    // beyond the fixed prefix.
    format!(
        "https://www.youtube.com/oembed?url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3D{video_id}&format=json"
    )
}
