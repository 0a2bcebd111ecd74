// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `perform-files` batch engine (§4.12): a tree of sequential and
//! parallel groups bottoming out in PUT/DELETE leaves, executed against a
//! caller-supplied [`LeafExecutor`] that owns the auth/scope/driver work
//! for a single leaf.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use hub_core::filelog::FileLogRecord;
use hub_error::HubError;
use serde::Serialize;
use serde_json::Value;

/// Parallel interior nodes fan out to at most this many children at once.
pub const MAX_PARALLEL_FANOUT: usize = 10;

/// Maximum length, in characters, of a captured per-leaf error message.
pub const MAX_LEAF_ERROR_LEN: usize = 999;

/// One node of the batch tree.
#[derive(Debug, Clone)]
pub enum BatchNode {
    /// A group of children, either run in order with short-circuit on the
    /// first failure, or fanned out in windows of [`MAX_PARALLEL_FANOUT`].
    Interior {
        /// Child nodes.
        values: Vec<BatchNode>,
        /// Whether children run in order (short-circuiting) or in
        /// parallel windows.
        is_sequential: bool,
    },
    /// A single PUT or DELETE operation.
    Leaf(BatchLeaf),
}

/// A leaf operation: a single object mutation.
#[derive(Debug, Clone)]
pub struct BatchLeaf {
    /// Caller-supplied identifier echoed back in the result.
    pub id: String,
    /// The relative path within the bucket this leaf operates on.
    pub path: String,
    /// Which mutation to perform.
    pub op: LeafOp,
}

/// The mutation a leaf performs.
#[derive(Debug, Clone)]
pub enum LeafOp {
    /// Write `content` to `path`, without ETag preconditions.
    Put {
        /// The raw JSON value supplied by the caller; coerced with
        /// [`coerce_leaf_content`].
        content: Value,
        /// Caller-supplied content type, if any.
        content_type: Option<String>,
    },
    /// Delete the object at `path`.
    Delete {
        /// Swallow a `doesNotExist` error instead of failing the leaf.
        do_ignore_does_not_exist_error: bool,
    },
}

/// Coerce a leaf's raw JSON `content` into a body and content type.
///
/// Strings are written verbatim with `contentType` defaulting to
/// `text/plain`; JSON objects are re-serialized with `contentType`
/// defaulting to `application/json`. Any other JSON value (array, number,
/// bool, null) is rejected.
pub fn coerce_leaf_content(
    content: &Value,
    content_type: Option<&str>,
) -> Result<(Bytes, String), HubError> {
    match content {
        Value::String(s) => Ok((
            Bytes::from(s.clone().into_bytes()),
            content_type.unwrap_or("text/plain").to_string(),
        )),
        Value::Object(_) => Ok((
            Bytes::from(content.to_string().into_bytes()),
            content_type.unwrap_or("application/json").to_string(),
        )),
        _ => Err(HubError::validation(
            "leaf content must be a string or a JSON object",
        )),
    }
}

/// What a successful leaf execution produced.
#[derive(Debug, Clone, Default)]
pub struct LeafSuccess {
    /// The written object's public URL, for PUT leaves.
    pub public_url: Option<String>,
    /// The written object's ETag, for PUT leaves.
    pub etag: Option<String>,
    /// Backup paths produced by this leaf (e.g. an archival rename),
    /// accumulated and enqueued once for the whole batch.
    pub backup_paths: Vec<String>,
    /// File-log records produced by this leaf.
    pub file_logs: Vec<FileLogRecord>,
}

/// Executes the auth/scope/driver work for a single leaf. Implementations
/// own the blacklist check, scope enforcement, archival rename, and the
/// driver call itself; this crate only owns the tree's control flow.
#[async_trait]
pub trait LeafExecutor: Send + Sync {
    /// Run one leaf to completion. An `Err` here becomes a captured
    /// per-leaf failure (`success: false`), not a batch-aborting error.
    async fn execute(&self, leaf: &BatchLeaf) -> Result<LeafSuccess, String>;
}

/// One leaf's outcome as reported in the batch's JSON response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafResult {
    /// Echoes [`BatchLeaf::id`].
    pub id: String,
    /// Whether the leaf succeeded.
    pub success: bool,
    /// Present on a successful PUT.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// Present on a successful PUT.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Present on failure, truncated to [`MAX_LEAF_ERROR_LEN`] characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The whole batch's outcome: per-leaf results in tree order, plus every
/// backup path and file-log accumulated across the tree, to be enqueued
/// once by the caller.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Leaf results in execution order.
    pub results: Vec<LeafResult>,
    /// Every backup path accumulated across the tree.
    pub backup_paths: Vec<String>,
    /// Every file-log record accumulated across the tree.
    pub file_logs: Vec<FileLogRecord>,
}

struct LeafOutcome {
    result: LeafResult,
    backup_paths: Vec<String>,
    file_logs: Vec<FileLogRecord>,
}

/// Run the whole tree against `executor`, returning results in tree order
/// plus the accumulated side effects to enqueue.
pub async fn run_batch(node: &BatchNode, executor: &dyn LeafExecutor) -> BatchOutcome {
    let outcomes = execute_node(node, executor).await;
    let mut results = Vec::with_capacity(outcomes.len());
    let mut backup_paths = Vec::new();
    let mut file_logs = Vec::new();
    for outcome in outcomes {
        results.push(outcome.result);
        backup_paths.extend(outcome.backup_paths);
        file_logs.extend(outcome.file_logs);
    }
    BatchOutcome {
        results,
        backup_paths,
        file_logs,
    }
}

fn execute_node<'a>(
    node: &'a BatchNode,
    executor: &'a dyn LeafExecutor,
) -> BoxFuture<'a, Vec<LeafOutcome>> {
    Box::pin(async move {
        match node {
            BatchNode::Leaf(leaf) => vec![execute_leaf(leaf, executor).await],
            BatchNode::Interior {
                values,
                is_sequential: true,
            } => {
                let mut outcomes = Vec::new();
                for child in values {
                    let child_outcomes = execute_node(child, executor).await;
                    let failed = child_outcomes.iter().any(|o| !o.result.success);
                    outcomes.extend(child_outcomes);
                    if failed {
                        break;
                    }
                }
                outcomes
            }
            BatchNode::Interior {
                values,
                is_sequential: false,
            } => {
                let mut outcomes = Vec::new();
                for window in values.chunks(MAX_PARALLEL_FANOUT) {
                    let windowed = futures::future::join_all(
                        window.iter().map(|child| execute_node(child, executor)),
                    )
                    .await;
                    for group in windowed {
                        outcomes.extend(group);
                    }
                }
                outcomes
            }
        }
    })
}

async fn execute_leaf(leaf: &BatchLeaf, executor: &dyn LeafExecutor) -> LeafOutcome {
    match executor.execute(leaf).await {
        Ok(success) => LeafOutcome {
            result: LeafResult {
                id: leaf.id.clone(),
                success: true,
                public_url: success.public_url,
                etag: success.etag,
                error: None,
            },
            backup_paths: success.backup_paths,
            file_logs: success.file_logs,
        },
        Err(message) => LeafOutcome {
            result: LeafResult {
                id: leaf.id.clone(),
                success: false,
                public_url: None,
                etag: None,
                error: Some(message.chars().take(MAX_LEAF_ERROR_LEN).collect()),
            },
            backup_paths: Vec::new(),
            file_logs: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn put_leaf(id: &str) -> BatchNode {
        BatchNode::Leaf(BatchLeaf {
            id: id.to_string(),
            path: format!("{id}.txt"),
            op: LeafOp::Put {
                content: Value::String("hi".into()),
                content_type: None,
            },
        })
    }

    /// Executor whose leaves succeed unless their id is in `fail_ids`, and
    /// which records the order leaves started running.
    struct ScriptedExecutor {
        fail_ids: Vec<String>,
        started_order: Mutex<Vec<String>>,
        max_concurrent: AtomicUsize,
        in_flight: AtomicUsize,
    }

    impl ScriptedExecutor {
        fn new(fail_ids: &[&str]) -> Self {
            Self {
                fail_ids: fail_ids.iter().map(|s| s.to_string()).collect(),
                started_order: Mutex::new(Vec::new()),
                max_concurrent: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LeafExecutor for ScriptedExecutor {
        async fn execute(&self, leaf: &BatchLeaf) -> Result<LeafSuccess, String> {
            self.started_order.lock().unwrap().push(leaf.id.clone());
            let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now_in_flight, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_ids.contains(&leaf.id) {
                Err("boom".to_string())
            } else {
                Ok(LeafSuccess {
                    public_url: Some(format!("https://example/{}", leaf.id)),
                    etag: Some("\"etag\"".into()),
                    backup_paths: vec![format!("backup/{}", leaf.id)],
                    file_logs: vec![],
                })
            }
        }
    }

    #[test]
    fn coerces_string_content_to_text_plain() {
        let (body, ct) = coerce_leaf_content(&Value::String("hello".into()), None).unwrap();
        assert_eq!(&body[..], b"hello");
        assert_eq!(ct, "text/plain");
    }

    #[test]
    fn coerces_object_content_to_json() {
        let value = serde_json::json!({"a": 1});
        let (body, ct) = coerce_leaf_content(&value, None).unwrap();
        assert_eq!(body, Bytes::from(value.to_string()));
        assert_eq!(ct, "application/json");
    }

    #[test]
    fn rejects_array_and_scalar_content() {
        assert!(coerce_leaf_content(&serde_json::json!([1, 2]), None).is_err());
        assert!(coerce_leaf_content(&serde_json::json!(42), None).is_err());
        assert!(coerce_leaf_content(&Value::Null, None).is_err());
    }

    #[test]
    fn respects_explicit_content_type() {
        let (_, ct) = coerce_leaf_content(&Value::String("x".into()), Some("text/csv")).unwrap();
        assert_eq!(ct, "text/csv");
    }

    #[tokio::test]
    async fn sequential_group_runs_in_order() {
        let executor = ScriptedExecutor::new(&[]);
        let tree = BatchNode::Interior {
            values: vec![put_leaf("a"), put_leaf("b"), put_leaf("c")],
            is_sequential: true,
        };
        let outcome = run_batch(&tree, &executor).await;
        assert_eq!(
            *executor.started_order.lock().unwrap(),
            vec!["a", "b", "c"]
        );
        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.results.iter().all(|r| r.success));
        assert_eq!(outcome.backup_paths.len(), 3);
    }

    #[tokio::test]
    async fn sequential_group_stops_after_first_failure() {
        let executor = ScriptedExecutor::new(&["b"]);
        let tree = BatchNode::Interior {
            values: vec![put_leaf("a"), put_leaf("b"), put_leaf("c")],
            is_sequential: true,
        };
        let outcome = run_batch(&tree, &executor).await;
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results[0].success);
        assert!(!outcome.results[1].success);
        assert_eq!(outcome.results[1].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn parallel_group_runs_all_children_even_after_a_failure() {
        let executor = ScriptedExecutor::new(&["b"]);
        let tree = BatchNode::Interior {
            values: vec![put_leaf("a"), put_leaf("b"), put_leaf("c")],
            is_sequential: false,
        };
        let outcome = run_batch(&tree, &executor).await;
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(
            outcome.results.iter().filter(|r| r.success).count(),
            2
        );
    }

    #[tokio::test]
    async fn parallel_group_caps_fanout_at_ten() {
        let executor = ScriptedExecutor::new(&[]);
        let values: Vec<_> = (0..25).map(|i| put_leaf(&i.to_string())).collect();
        let tree = BatchNode::Interior {
            values,
            is_sequential: false,
        };
        let outcome = run_batch(&tree, &executor).await;
        assert_eq!(outcome.results.len(), 25);
        assert!(executor.max_concurrent.load(Ordering::SeqCst) <= MAX_PARALLEL_FANOUT);
    }

    #[tokio::test]
    async fn error_messages_are_truncated() {
        struct LongFailExecutor;
        #[async_trait]
        impl LeafExecutor for LongFailExecutor {
            async fn execute(&self, _leaf: &BatchLeaf) -> Result<LeafSuccess, String> {
                Err("x".repeat(2000))
            }
        }
        let tree = put_leaf("a");
        let outcome = run_batch(&tree, &LongFailExecutor).await;
        assert_eq!(outcome.results[0].error.as_ref().unwrap().len(), MAX_LEAF_ERROR_LEN);
    }

    #[tokio::test]
    async fn nested_tree_accumulates_results_depth_first() {
        let executor = ScriptedExecutor::new(&[]);
        let tree = BatchNode::Interior {
            values: vec![
                put_leaf("a"),
                BatchNode::Interior {
                    values: vec![put_leaf("b"), put_leaf("c")],
                    is_sequential: false,
                },
                put_leaf("d"),
            ],
            is_sequential: true,
        };
        let outcome = run_batch(&tree, &executor).await;
        let ids: Vec<_> = outcome.results.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }
}
