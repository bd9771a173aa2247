//! Session assembly
//!
//! Picks a random query image and a page of candidates from the image index.
//!
//! Candidate policy:
//! - corpus larger than the page: the pool is the corpus minus the query;
//!   `page_size` consecutive pool entries are taken from a random offset,
//!   wrapping around. The query never appears.
//! - corpus no larger than the page: the whole corpus, rotated to start at a
//!   random offset. The query is included; nothing repeats.
//!
//! Either way the page holds `min(page_size, corpus size)` distinct ids.

use labeler_common::models::Session;
use labeler_common::{Error, Result};
use rand::Rng;

use super::image_index::ImageIndex;

/// Build a session from the index's current snapshot
pub fn build_session(index: &ImageIndex, page_size: usize) -> Result<Session> {
    let snapshot = index.list();
    sample_session(&mut rand::thread_rng(), snapshot.images(), page_size)
        .ok_or_else(|| Error::EmptyCorpus(index.root().display().to_string()))
}

/// Sample a session from `images` with the given random source
///
/// Returns `None` when `images` is empty.
pub fn sample_session<R: Rng + ?Sized>(
    rng: &mut R,
    images: &[String],
    page_size: usize,
) -> Option<Session> {
    let total = images.len();
    if total == 0 {
        return None;
    }
    let page_size = page_size.max(1);

    let query = rng.gen_range(0..total);

    let candidates = if total > page_size {
        // Pool position p maps to corpus index p, skipping over the query
        let pool = total - 1;
        let offset = rng.gen_range(0..pool);
        (0..page_size)
            .map(|i| {
                let p = (offset + i) % pool;
                let idx = if p < query { p } else { p + 1 };
                images[idx].clone()
            })
            .collect()
    } else {
        let offset = rng.gen_range(0..total);
        (0..total)
            .map(|i| images[(offset + i) % total].clone())
            .collect()
    };

    Some(Session {
        query_image: images[query].clone(),
        candidates,
    })
}
