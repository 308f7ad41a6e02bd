use crate::pow::{count_leading_zero_bits, ProofOfWork};
use crate::Hash;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Searches nonces in parallel and returns the smallest one that satisfies
/// `pow`, which is the same nonce the sequential search finds.
/// Returns `None` if `cancel` is raised before a nonce is found.
pub fn mine_parallel(
    pow: &ProofOfWork,
    payload: &[u8],
    cancel: &AtomicBool,
) -> Option<(u64, Hash)> {
    // Rayon splits the range across threads; a raised flag short-circuits
    // every remaining candidate.
    let found = (0u64..u64::MAX).into_par_iter().find_first(|nonce| {
        cancel.load(Ordering::Relaxed) || pow.meets_target(&pow.digest(payload, *nonce))
    })?;

    let hash = pow.digest(payload, found);
    if !pow.meets_target(&hash) {
        debug!("parallel mining cancelled");
        return None;
    }

    debug!(
        "mined nonce {} with hash {} ({} leading zero bits, difficulty {})",
        found,
        hex::encode(hash),
        count_leading_zero_bits(&hash),
        pow.difficulty()
    );
    Some((found, hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_and_sequential_find_the_same_nonce() {
        let pow = ProofOfWork::new(10).unwrap();
        let cancel = AtomicBool::new(false);
        for payload in [&b"a"[..], &b"bb"[..], &b"some longer payload"[..]] {
            assert_eq!(
                mine_parallel(&pow, payload, &cancel),
                Some(pow.mine(payload))
            );
        }
    }

    #[test]
    fn cancelled_search_returns_none() {
        let pow = ProofOfWork::new(256).unwrap();
        let cancel = AtomicBool::new(true);
        assert_eq!(mine_parallel(&pow, b"payload", &cancel), None);
    }
}
