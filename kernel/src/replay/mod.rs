// Operation Replay
//
// Replays a recorded sequence of client operations against a store and
// reports what each step observed. Compaction steps name the earlier step
// whose returned chain they use as their expected head.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chain::{Chain, ChainBuilder};
use crate::store::{Key, ReplaceOutcome, ServerStore, StoreError};

/// Payload as written in an operation script: text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Bytes(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Get {
        key: Key,
    },
    Append {
        key: Key,
        payload: Payload,
    },
    GetAndAppend {
        key: Key,
        payload: Payload,
    },
    ReplaceAtHead {
        key: Key,
        read_at: usize,
        replacement: Vec<Payload>,
    },
}

impl Operation {
    pub fn key(&self) -> Key {
        match self {
            Operation::Get { key }
            | Operation::Append { key, .. }
            | Operation::GetAndAppend { key, .. }
            | Operation::ReplaceAtHead { key, .. } => *key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    Read { chain: Chain },
    Appended,
    Compaction { outcome: ReplaceOutcome },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub step: usize,
    pub key: Key,
    pub outcome: StepOutcome,
}

/// Step results plus the final chain of every key the script touched.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub steps: Vec<StepResult>,
    pub chains: BTreeMap<Key, Chain>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("store error at step {step}: {source}")]
    Store { step: usize, source: StoreError },

    #[error("step {step} reads from step {read_at}, which did not return a chain")]
    NoChainAt { step: usize, read_at: usize },
}

/// Apply `ops` in order, stopping at the first failing step.
pub fn replay_operations(
    store: &dyn ServerStore,
    ops: &[Operation],
) -> Result<ReplayReport, ReplayError> {
    let mut steps: Vec<StepResult> = Vec::with_capacity(ops.len());

    for (step, op) in ops.iter().enumerate() {
        let at = |source| ReplayError::Store { step, source };

        let outcome = match op {
            Operation::Get { key } => StepOutcome::Read {
                chain: store.get(*key).map_err(at)?,
            },
            Operation::Append { key, payload } => {
                store.append(*key, payload.as_bytes()).map_err(at)?;
                StepOutcome::Appended
            }
            Operation::GetAndAppend { key, payload } => StepOutcome::Read {
                chain: store.get_and_append(*key, payload.as_bytes()).map_err(at)?,
            },
            Operation::ReplaceAtHead {
                key,
                read_at,
                replacement,
            } => {
                let expected = match steps.get(*read_at).map(|s| &s.outcome) {
                    Some(StepOutcome::Read { chain }) => chain.clone(),
                    _ => {
                        return Err(ReplayError::NoChainAt {
                            step,
                            read_at: *read_at,
                        })
                    }
                };
                let replacement =
                    ChainBuilder.from_payloads(replacement.iter().map(Payload::as_bytes));

                StepOutcome::Compaction {
                    outcome: store
                        .replace_at_head(*key, &expected, &replacement)
                        .map_err(at)?,
                }
            }
        };

        steps.push(StepResult {
            step,
            key: op.key(),
            outcome,
        });
    }

    let mut chains = BTreeMap::new();
    for op in ops {
        let key = op.key();
        if !chains.contains_key(&key) {
            let chain = store.get(key).map_err(|source| ReplayError::Store {
                step: ops.len(),
                source,
            })?;
            chains.insert(key, chain);
        }
    }

    Ok(ReplayReport { steps, chains })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ShardedServerStore;

    fn text(s: &str) -> Payload {
        Payload::Text(s.into())
    }

    #[test]
    fn script_parses_from_json() {
        let json = r#"
        [
          { "op": "append", "key": 1, "payload": "a" },
          { "op": "get", "key": 1 },
          { "op": "replace_at_head", "key": 1, "read_at": 1, "replacement": [[1, 2]] }
        ]
        "#;

        let ops: Vec<Operation> = serde_json::from_str(json).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(
            ops[2],
            Operation::ReplaceAtHead {
                key: 1,
                read_at: 1,
                replacement: vec![Payload::Bytes(vec![1, 2])],
            }
        );
    }

    #[test]
    fn compaction_after_concurrent_append_keeps_tail() {
        let store = ShardedServerStore::new();
        let ops = vec![
            Operation::Append { key: 3, payload: text("a") },
            Operation::Get { key: 3 },
            Operation::Append { key: 3, payload: text("b") },
            Operation::ReplaceAtHead {
                key: 3,
                read_at: 1,
                replacement: vec![text("A")],
            },
        ];

        let report = replay_operations(&store, &ops).unwrap();

        assert_eq!(
            report.steps[3].outcome,
            StepOutcome::Compaction {
                outcome: ReplaceOutcome::Replaced { preserved: 1 }
            }
        );
        let final_chain: Vec<_> = report.chains[&3].payloads().collect();
        assert_eq!(final_chain, vec![&b"A"[..], &b"b"[..]]);
    }

    #[test]
    fn compaction_reading_from_an_append_step_fails() {
        let store = ShardedServerStore::new();
        let ops = vec![
            Operation::Append { key: 1, payload: text("a") },
            Operation::ReplaceAtHead {
                key: 1,
                read_at: 0,
                replacement: vec![text("b")],
            },
        ];

        let err = replay_operations(&store, &ops).unwrap_err();
        assert!(matches!(err, ReplayError::NoChainAt { step: 1, read_at: 0 }));
    }

    #[test]
    fn negative_key_reports_failing_step() {
        let store = ShardedServerStore::new();
        let ops = vec![
            Operation::Get { key: 1 },
            Operation::Get { key: -4 },
        ];

        let err = replay_operations(&store, &ops).unwrap_err();
        assert!(err.to_string().contains("step 1"));
    }
}
