//! Content preparation and delivery for Newsdesk.
//!
//! Everything between a generated article and a published post lives
//! here: page fetching, content cleanup, excerpting, image search and
//! placement, slugs, and the CMS client.

mod cleanup;
mod cms;
mod error;
mod excerpt;
mod fetch;
mod images;
mod placement;
mod slug;
mod traits;

pub use cleanup::{clean_article_content, clean_title};
pub use cms::{ArticleDraft, CmsClient, PublishedPost};
pub use error::{PressError, Result};
pub use excerpt::{EXCERPT_MAX_CHARS, seo_excerpt};
pub use fetch::{HttpPageFetcher, ParsedPage};
pub use images::{UnsplashClient, collect_images, image_queries};
pub use placement::{PlacedImages, image_positions, place_inline_images, split_paragraphs};
pub use slug::generate_slug;
pub use traits::{ImageProvider, PageSource, PublishTarget};
