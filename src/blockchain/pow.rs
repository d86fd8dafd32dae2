use super::block::{Block, BlockHash};
use super::transaction::Transaction;

/// Largest meaningful difficulty: a SHA-256 digest has 64 hex digits
pub const MAX_DIFFICULTY: u8 = 64;

/// Checks whether `nonce` solves the puzzle for the given block contents.
///
/// The block is hashed with timestamp 0 so any node can re-check the proof
/// regardless of when the block was actually created.
pub fn validate_proof(nonce: u64, prev_hash: &BlockHash, transactions: &[Transaction], difficulty: u8) -> bool {
    if difficulty > MAX_DIFFICULTY {
        return false;
    }

    let hash = Block::hash_parts(prev_hash, 0, transactions, nonce);
    hash.leading_zero_digits() >= difficulty as usize
}

/// Searches nonces upward from zero until one satisfies [`validate_proof`].
///
/// `cancelled` is polled before every attempt; once it returns true the
/// search gives up and returns `None`.
pub fn proof_of_work<F>(prev_hash: &BlockHash, transactions: &[Transaction], difficulty: u8, cancelled: F) -> Option<u64>
where
    F: Fn() -> bool,
{
    if difficulty > MAX_DIFFICULTY {
        return None;
    }

    let mut nonce: u64 = 0;
    loop {
        if cancelled() {
            return None;
        }

        if validate_proof(nonce, prev_hash, transactions, difficulty) {
            return Some(nonce);
        }

        nonce = nonce.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Address;

    use std::cell::Cell;

    fn transactions() -> Vec<Transaction> {
        vec![
            Transaction::new(Address::from("alice"), Address::from("bob"), 10.0),
            Transaction::reward(Address::from("miner"), 1.0),
        ]
    }

    #[test]
    fn test_found_nonce_validates() {
        let prev_hash = Block::genesis().hash();
        let transactions = transactions();

        let nonce = proof_of_work(&prev_hash, &transactions, 2, || false).unwrap();

        assert!(validate_proof(nonce, &prev_hash, &transactions, 2));
        let hash = Block::hash_parts(&prev_hash, 0, &transactions, nonce);
        assert!(hash.to_string().starts_with("00"));
    }

    #[test]
    fn test_found_nonce_is_the_smallest() {
        let prev_hash = Block::genesis().hash();
        let transactions = transactions();

        let nonce = proof_of_work(&prev_hash, &transactions, 2, || false).unwrap();
        assert!((0..nonce).all(|n| !validate_proof(n, &prev_hash, &transactions, 2)));
    }

    #[test]
    fn test_zero_difficulty_accepts_first_nonce() {
        let prev_hash = Block::genesis().hash();
        assert_eq!(proof_of_work(&prev_hash, &[], 0, || false), Some(0));
        assert!(validate_proof(12345, &prev_hash, &[], 0));
    }

    #[test]
    fn test_proof_is_bound_to_contents() {
        let prev_hash = Block::genesis().hash();
        let transactions = transactions();
        let nonce = proof_of_work(&prev_hash, &transactions, 3, || false).unwrap();

        let mut tampered = transactions.clone();
        tampered[0].amount = 11.0;
        // A different payload hashes differently; at difficulty 3 it would
        // pass by chance only once in 4096 attempts.
        let other = Block::hash_parts(&prev_hash, 0, &tampered, nonce);
        assert_ne!(other, Block::hash_parts(&prev_hash, 0, &transactions, nonce));
    }

    #[test]
    fn test_search_can_be_cancelled() {
        let prev_hash = Block::genesis().hash();
        let attempts = Cell::new(0u32);

        let result = proof_of_work(&prev_hash, &transactions(), MAX_DIFFICULTY, || {
            attempts.set(attempts.get() + 1);
            attempts.get() > 100
        });

        assert_eq!(result, None);
        assert_eq!(attempts.get(), 101);
    }

    #[test]
    fn test_out_of_range_difficulty() {
        let prev_hash = Block::genesis().hash();
        assert!(!validate_proof(0, &prev_hash, &[], MAX_DIFFICULTY + 1));
        assert_eq!(proof_of_work(&prev_hash, &[], MAX_DIFFICULTY + 1, || false), None);
    }
}
