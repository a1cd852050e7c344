use std::cmp::Reverse;

use crate::details::VideoDetails;

/// Drops videos longer than `max_secs`. With a cutoff in place, videos of unknown length
/// are dropped too.
pub fn apply_duration_cutoff(videos: Vec<VideoDetails>, max_secs: Option<u64>) -> Vec<VideoDetails> {
    let Some(max_secs) = max_secs else {
        return videos;
    };

    videos
        .into_iter()
        .filter(|video| video.duration_secs.is_some_and(|secs| secs <= max_secs))
        .collect()
}

/// Stable sort, highest view count first; unknown counts go last.
pub fn sort_by_views<T>(items: &mut [T], views: impl Fn(&T) -> Option<u64>) {
    // `None < Some(_)`, so reversing puts unknown counts at the end
    items.sort_by_key(|item| Reverse(views(item)));
}

/// Stable sort, smallest value first; unknown values go last.
pub fn sort_ascending_known_first<T>(items: &mut [T], key: impl Fn(&T) -> Option<u64>) {
    items.sort_by_key(|item| match key(item) {
        Some(value) => (false, value),
        None => (true, 0),
    });
}
