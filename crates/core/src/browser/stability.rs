use std::time::Duration;

/// Delay between successive HTML-length samples while waiting for a page to
/// finish rendering.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Number of consecutive equal samples required before the page counts as
/// rendered.
pub(crate) const STABLE_POLLS: u32 = 3;

/// Tracks serialized-HTML length samples and reports when the page has
/// stopped changing.
///
/// A sample of zero never counts towards the streak; a length change resets
/// it. The tracker is deliberately free of any clock so the polling cadence
/// stays in the caller.
#[derive(Debug, Default)]
pub(crate) struct RenderStability {
    last_len: usize,
    streak: u32,
}

impl RenderStability {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records one sample and returns `true` once [`STABLE_POLLS`]
    /// consecutive equal non-zero lengths have been observed.
    pub(crate) fn observe(&mut self, html_len: usize) -> bool {
        if html_len != 0 && html_len == self.last_len {
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.last_len = html_len;
        self.streak >= STABLE_POLLS
    }
}
