use super::transaction::Transaction;

/// Transactions admitted by this node but not yet sealed in a block.
///
/// The pool itself performs no validation; admission rules live in
/// [`Blockchain`](super::Blockchain). Callers provide the locking.
#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    transactions: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an admitted transaction
    pub fn push(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Returns an independent copy of the pending transactions, in admission order
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.transactions
            .iter()
            .map(|t| Transaction::new(t.sender_address.clone(), t.recipient_address.clone(), t.amount))
            .collect()
    }

    /// Removes every pending transaction
    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    /// Removes one pending entry for each transaction in `sealed`.
    ///
    /// Entries admitted after the snapshot that produced `sealed` are kept, and
    /// entries that vanished in the meantime (a concurrent clear) are ignored.
    pub fn remove_sealed(&mut self, sealed: &[Transaction]) {
        for transaction in sealed {
            if let Some(position) = self.transactions.iter().position(|t| t == transaction) {
                self.transactions.remove(position);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
