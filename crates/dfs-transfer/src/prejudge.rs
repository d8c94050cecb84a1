use std::time::Duration;

use crate::error::TransferError;

/// Pre-judgment (`SPEC_FULL.md` §5): before streaming starts, compares the
/// time a transfer of `size` bytes would need at `rate_bps` against the time
/// left before the deadline, failing fast rather than starting a transfer
/// that's already doomed to time out.
pub fn prejudge(size: i64, rate_bps: f64, remaining: Duration) -> Result<(), TransferError> {
    if size <= 0 || rate_bps <= 0.0 {
        return Ok(());
    }
    let required = Duration::from_secs_f64((size as f64 * 8.0) / rate_bps);
    if required > remaining {
        return Err(TransferError::DeadlineExceeded);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fails_fast_when_required_time_exceeds_remaining() {
        let err = prejudge(1_000_000, 1_000.0, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, TransferError::DeadlineExceeded));
    }

    #[test]
    fn passes_when_plenty_of_time_remains() {
        assert!(prejudge(1024, 1_000_000.0, Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn zero_or_unknown_rate_never_blocks_a_transfer() {
        assert!(prejudge(1_000_000, 0.0, Duration::from_millis(1)).is_ok());
        assert!(prejudge(0, 1_000.0, Duration::from_millis(1)).is_ok());
    }
}
