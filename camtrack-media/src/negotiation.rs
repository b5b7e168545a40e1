//! Fallback capture configurations
//!
//! Given a desired configuration, [`build_fallbacks`] produces the ordered
//! queue of alternatives to try when the device rejects it. Generation is
//! deterministic and free of side effects.

use crate::constraints::{aspect_ratio, CaptureConfiguration, VideoConstraints};
use std::collections::VecDeque;
use tracing::debug;

/// Common capture resolutions, ascending
pub const STANDARD_RESOLUTIONS: [u32; 13] = [
    480, 576, 640, 648, 720, 768, 800, 960, 1080, 1152, 1280, 1366, 1920,
];

/// Slack applied to both ends of the accepted aspect-ratio band
pub const ASPECT_TOLERANCE: f64 = 0.1;

/// Near-resolution candidates per dimension
const NEAR_RESOLUTION_COUNT: usize = 3;

/// Accepted aspect ratios for near-resolution candidates, inclusive
pub fn aspect_band() -> (f64, f64) {
    (
        4.0 / 3.0 - ASPECT_TOLERANCE,
        16.0 / 9.0 - ASPECT_TOLERANCE,
    )
}

/// The `count` standard resolutions closest to `value`. Ties keep
/// ascending order.
pub fn closest_standard_resolutions(value: u32, count: usize) -> Vec<u32> {
    let mut sorted = STANDARD_RESOLUTIONS.to_vec();
    sorted.sort_by_key(|resolution| resolution.abs_diff(value));
    sorted.truncate(count);
    sorted
}

/// Ordered candidates, consumed front to back
///
/// A configuration is accepted only once, and never when it equals the
/// configuration the queue was built for.
#[derive(Debug, Clone, Default)]
pub struct CandidateQueue {
    candidates: VecDeque<CaptureConfiguration>,
    excluded: Option<CaptureConfiguration>,
}

impl CandidateQueue {
    /// Empty queue that will never accept `attempted`
    pub fn excluding(attempted: &CaptureConfiguration) -> Self {
        Self {
            candidates: VecDeque::new(),
            excluded: Some(attempted.clone()),
        }
    }

    /// Append unless already present. Returns whether it was added.
    pub fn push_unique(&mut self, candidate: CaptureConfiguration) -> bool {
        if self.excluded.as_ref() == Some(&candidate) || self.candidates.contains(&candidate) {
            return false;
        }
        self.candidates.push_back(candidate);
        true
    }

    /// Append as the last candidate, moving any equal entry to the back
    pub fn push_last(&mut self, candidate: CaptureConfiguration) -> bool {
        if self.excluded.as_ref() == Some(&candidate) {
            return false;
        }
        self.candidates.retain(|existing| existing != &candidate);
        self.candidates.push_back(candidate);
        true
    }

    /// Take the most preferred candidate
    pub fn pop_front(&mut self) -> Option<CaptureConfiguration> {
        self.candidates.pop_front()
    }

    /// Remaining candidates
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether no candidates remain
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Iterate in priority order
    pub fn iter(&self) -> impl Iterator<Item = &CaptureConfiguration> {
        self.candidates.iter()
    }

    /// Least preferred candidate
    pub fn back(&self) -> Option<&CaptureConfiguration> {
        self.candidates.back()
    }
}

impl IntoIterator for CandidateQueue {
    type Item = CaptureConfiguration;
    type IntoIter = std::collections::vec_deque::IntoIter<CaptureConfiguration>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

/// Build the fallback queue for `desired`
///
/// Candidates are appended in this order, skipping duplicates:
/// near-standard resolutions within the aspect band, width/height swapped,
/// ideal dimensions relaxed, dimensions removed, facing mode removed (and
/// swapped without facing mode), then "any video" last. The queue is empty
/// when `desired` requests no video or only "any video".
pub fn build_fallbacks(desired: &CaptureConfiguration) -> CandidateQueue {
    let mut queue = CandidateQueue::excluding(desired);

    let video = match desired.video_constraints() {
        Some(video) if !video.is_empty() => video,
        _ => return queue,
    };

    push_near_resolutions(&mut queue, desired, video);

    if video.has_dimensions() {
        queue.push_unique(desired.with_video_constraints(video.swapped()));
    }

    let has_ideal = video.width.and_then(|w| w.ideal()).is_some()
        || video.height.and_then(|h| h.ideal()).is_some();
    if has_ideal {
        queue.push_unique(desired.with_video_constraints(video.without_ideal_dimensions()));
    }

    if video.width.is_some() || video.height.is_some() {
        queue.push_unique(desired.with_video_constraints(video.without_dimensions()));
    }

    if video.facing_mode.is_some() {
        queue.push_unique(desired.with_video_constraints(video.without_facing_mode()));
        if video.has_dimensions() {
            queue.push_unique(
                desired.with_video_constraints(video.swapped().without_facing_mode()),
            );
        }
    }

    queue.push_last(CaptureConfiguration::any_video(desired.audio));

    debug!(
        "Built {} fallback candidates for {}",
        queue.len(),
        desired.label()
    );
    queue
}

fn push_near_resolutions(
    queue: &mut CandidateQueue,
    desired: &CaptureConfiguration,
    video: &VideoConstraints,
) {
    let (ideal_width, ideal_height) = match video.ideal_dimensions() {
        Some(ideal) => ideal,
        None => return,
    };
    let (Some(width), Some(height)) = (video.width, video.height) else {
        return;
    };
    let (low, high) = aspect_band();

    for candidate_width in closest_standard_resolutions(ideal_width, NEAR_RESOLUTION_COUNT) {
        for candidate_height in closest_standard_resolutions(ideal_height, NEAR_RESOLUTION_COUNT)
        {
            if (candidate_width, candidate_height) == (ideal_width, ideal_height) {
                continue;
            }
            let ratio = aspect_ratio(candidate_width, candidate_height);
            if ratio < low || ratio > high {
                continue;
            }

            queue.push_unique(desired.with_video_constraints(VideoConstraints {
                width: Some(width.with_ideal(candidate_width)),
                height: Some(height.with_ideal(candidate_height)),
                ..video.clone()
            }));
        }
    }
}
