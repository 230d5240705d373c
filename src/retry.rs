//! Bounded retry for flaky peripheral transactions.
//!
//! The I²C remote shares a cable with an unshielded ISA riser, so the odd
//! failed transfer is expected. Register transactions get a fixed number
//! of attempts with a caller-supplied backoff; only after that does the
//! failure escalate (typically to a fatal blink).

/// Run `op` up to `attempts` times, invoking `backoff` between attempts.
/// Returns the first success, or the last error once attempts run out.
pub fn with_retry<T, E>(
    attempts: usize,
    mut backoff: impl FnMut(),
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    debug_assert!(attempts > 0);
    let mut last = op();
    for _ in 1..attempts {
        if last.is_ok() {
            break;
        }
        backoff();
        last = op();
    }
    last
}
