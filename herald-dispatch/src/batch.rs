//! Recipient partitioning and the published completion estimate.

use std::time::Duration;

use herald_common::Recipient;

/// Split recipients into contiguous batches of at most `batch_size`.
///
/// Every batch but the last is full; the last holds `len % batch_size`
/// recipients, or a full batch when the division is exact. A `batch_size` of
/// zero is treated as one.
pub fn partition(recipients: &[Recipient], batch_size: usize) -> std::slice::Chunks<'_, Recipient> {
    recipients.chunks(batch_size.max(1))
}

/// `⌈recipients / batch_size⌉`
#[must_use]
pub const fn batch_count(recipients: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return recipients;
    }
    recipients.div_ceil(batch_size)
}

/// Static estimate of how long dispatch takes once it starts.
///
/// `(batches - 1) * delay + recipients * per_recipient`. Not recomputed as
/// sends fail or retry.
#[must_use]
pub fn estimate_duration(
    recipients: usize,
    batch_size: usize,
    delay_ms: u64,
    per_recipient_ms: u64,
) -> Duration {
    let batches = batch_count(recipients, batch_size) as u64;
    let delays = batches.saturating_sub(1).saturating_mul(delay_ms);
    let sending = (recipients as u64).saturating_mul(per_recipient_ms);
    Duration::from_millis(delays.saturating_add(sending))
}
