use crate::constants::{COINBASE_OUTPUT_INDEX, SUBSIDY};
use crate::error::{LedgerError, Result};
use crate::{sha256, Hash};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an output of an earlier transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Empty for coinbase inputs.
    pub source_tx_id: Vec<u8>,
    /// Index into the source's outputs, [`COINBASE_OUTPUT_INDEX`] when there is none.
    pub output_index: i64,
    pub unlock_data: String,
}

impl Input {
    pub fn can_unlock(&self, data: &str) -> bool {
        self.unlock_data == data
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Input: {} #{} unlocked by {}",
            hex::encode(&self.source_tx_id),
            self.output_index,
            self.unlock_data
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub value: u64,
    pub lock_key: String,
}

impl Output {
    pub fn can_be_unlocked(&self, data: &str) -> bool {
        self.lock_key == data
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Output: {} coins to {}", self.value, self.lock_key)
    }
}

/// A transfer record whose id is the digest of its inputs and outputs.
///
/// Fields are read-only once constructed so the id cannot drift from the
/// content it was derived from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: Hash,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
}

impl Transaction {
    pub fn new(inputs: Vec<Input>, outputs: Vec<Output>) -> Result<Self> {
        let id = Self::derive_id(&inputs, &outputs)?;
        Ok(Self {
            id,
            inputs,
            outputs,
        })
    }

    /// Sentinel reward transaction paying [`SUBSIDY`] to `beneficiary`.
    pub fn coinbase(beneficiary: &str, memo: &str) -> Result<Self> {
        let unlock_data = if memo.is_empty() {
            format!("Coins to {beneficiary}")
        } else {
            memo.to_string()
        };
        let input = Input {
            source_tx_id: Vec::new(),
            output_index: COINBASE_OUTPUT_INDEX,
            unlock_data,
        };
        let output = Output {
            value: SUBSIDY,
            lock_key: beneficiary.to_string(),
        };
        Self::new(vec![input], vec![output])
    }

    pub fn id(&self) -> &Hash {
        &self.id
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].source_tx_id.is_empty()
            && self.inputs[0].output_index == COINBASE_OUTPUT_INDEX
    }

    /// True when the stored id still matches the inputs and outputs.
    pub fn has_valid_id(&self) -> bool {
        Self::derive_id(&self.inputs, &self.outputs)
            .map(|id| id == self.id)
            .unwrap_or(false)
    }

    /// Order-sensitive: reordering inputs or outputs yields a different id.
    fn derive_id(inputs: &[Input], outputs: &[Output]) -> Result<Hash> {
        let encoded = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .serialize(&(inputs, outputs))
            .map_err(|e| LedgerError::Encode {
                what: "transaction",
                reason: e.to_string(),
            })?;
        Ok(sha256(&encoded))
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", hex::encode(self.id))?;
        if self.is_coinbase() {
            writeln!(f, "Coinbase transaction")?;
            for output in &self.outputs {
                writeln!(f, "{output}")?;
            }
            return Ok(());
        }
        for input in &self.inputs {
            writeln!(f, "{input}")?;
        }
        for output in &self.outputs {
            writeln!(f, "{output}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: &str, to: &str, value: u64) -> Transaction {
        Transaction::new(
            vec![Input {
                source_tx_id: vec![7u8; 32],
                output_index: 0,
                unlock_data: from.to_string(),
            }],
            vec![Output {
                value,
                lock_key: to.to_string(),
            }],
        )
        .unwrap()
    }

    #[test]
    fn coinbase_example() {
        let tx = Transaction::coinbase("alice", "").unwrap();
        assert!(tx.is_coinbase());
        assert_eq!(tx.inputs().len(), 1);
        assert_eq!(tx.inputs()[0].output_index, -1);
        assert!(tx.inputs()[0].source_tx_id.is_empty());
        assert_eq!(tx.inputs()[0].unlock_data, "Coins to alice");
        assert_eq!(tx.outputs()[0].value, SUBSIDY);
        assert!(tx.outputs()[0].can_be_unlocked("alice"));
        assert!(tx.has_valid_id());
    }

    #[test]
    fn coinbase_keeps_memo() {
        let tx = Transaction::coinbase("bob", "hello").unwrap();
        assert!(tx.inputs()[0].can_unlock("hello"));
    }

    #[test]
    fn id_is_deterministic() {
        assert_eq!(
            transfer("Alice", "Bob", 10).id(),
            transfer("Alice", "Bob", 10).id()
        );
        assert_ne!(
            transfer("Alice", "Bob", 10).id(),
            transfer("Alice", "Bob", 11).id()
        );
    }

    #[test]
    fn id_is_order_sensitive() {
        let a = Output {
            value: 1,
            lock_key: "a".into(),
        };
        let b = Output {
            value: 2,
            lock_key: "b".into(),
        };
        let tx1 = Transaction::new(vec![], vec![a.clone(), b.clone()]).unwrap();
        let tx2 = Transaction::new(vec![], vec![b, a]).unwrap();
        assert_ne!(tx1.id(), tx2.id());
    }

    #[test]
    fn near_coinbase_shapes_are_not_coinbase() {
        assert!(!transfer("Alice", "Bob", 10).is_coinbase());

        let wrong_index = Transaction::new(
            vec![Input {
                source_tx_id: vec![],
                output_index: 0,
                unlock_data: "x".into(),
            }],
            vec![],
        )
        .unwrap();
        assert!(!wrong_index.is_coinbase());

        let cb = Transaction::coinbase("alice", "").unwrap();
        let two_inputs = Transaction::new(
            vec![cb.inputs()[0].clone(), cb.inputs()[0].clone()],
            cb.outputs().to_vec(),
        )
        .unwrap();
        assert!(!two_inputs.is_coinbase());
    }

    #[test]
    fn display_marks_coinbase() {
        let rendered = Transaction::coinbase("alice", "").unwrap().to_string();
        assert!(rendered.contains("Coinbase transaction"));
        assert!(rendered.contains("Output: 100 coins to alice"));
    }
}
