// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `perform-files` batch engine's leaf executor: owns the per-leaf
//! blacklist, scope, archival, and driver work; the tree's control flow
//! itself lives in `hub_batch`.

use hub_archive::{rename_for_overwrite, ArchiveOutcome};
use hub_auth::ScopeSets;
use hub_batch::{coerce_leaf_content, BatchLeaf, BatchNode, LeafExecutor, LeafOp, LeafSuccess};
use hub_cache::BlacklistCache;
use hub_core::blacklist::PerformType;
use hub_core::object::ObjectKey;
use hub_core::principal::Address;
use hub_driver::{Driver, DeleteRequest, RenameRequest, WriteRequest};
use hub_driver_mock::MockDriver;
use hub_error::HubErrorCode;
use serde_json::Value;

/// Executes a single batch leaf against the configured driver, reusing the
/// effective signer's scopes computed once for the whole batch.
pub struct HubLeafExecutor<'a> {
    pub driver: &'a MockDriver,
    pub bucket: Address,
    pub asso_iss_address: Address,
    pub scopes: ScopeSets,
    pub blacklist_cache: &'a BlacklistCache<MockDriver>,
    pub max_file_upload_size: u64,
    pub now_unix_millis: i64,
}

impl HubLeafExecutor<'_> {
    async fn archival_rename(&self, key: &ObjectKey) -> Result<Vec<String>, String> {
        let driver = self.driver;
        let storage_top_level = key.bucket().to_string();
        let asso_iss_address = self.asso_iss_address.clone();
        let outcome = rename_for_overwrite(key, self.now_unix_millis, move |new_path| {
            let path = key.relative_path().to_string();
            async move {
                driver
                    .perform_rename(RenameRequest {
                        storage_top_level,
                        path,
                        new_path,
                        if_match_tag: None,
                        asso_iss_address,
                    })
                    .await
            }
        })
        .await
        .map_err(|e| e.message)?;
        Ok(match outcome {
            ArchiveOutcome::Renamed(path) => vec![path],
            ArchiveOutcome::NoPriorObject => Vec::new(),
        })
    }

    async fn execute_put(&self, leaf: &BatchLeaf, content: &Value, content_type: &Option<String>) -> Result<LeafSuccess, String> {
        self.scopes.authorize_write(&leaf.path).map_err(|e| e.message)?;
        if self
            .blacklist_cache
            .is_blacklisted(&self.asso_iss_address, PerformType::Put)
            .await
            .map_err(|e| e.message)?
        {
            return Err("address is blacklisted for writes".to_string());
        }

        let (body, resolved_content_type) =
            coerce_leaf_content(content, content_type.as_deref()).map_err(|e| e.message)?;
        if body.len() as u64 > self.max_file_upload_size {
            return Err("leaf content exceeds the maximum upload size".to_string());
        }

        let key = ObjectKey::new(self.bucket.clone(), leaf.path.clone()).map_err(|_| "path contains '..'".to_string())?;

        let backup_paths = if self.scopes.is_archival_restricted() {
            self.archival_rename(&key).await?
        } else {
            Vec::new()
        };

        let write_result = self
            .driver
            .perform_write(WriteRequest {
                storage_top_level: key.bucket().to_string(),
                path: key.relative_path().to_string(),
                content: body,
                content_type: resolved_content_type,
                if_match_tag: None,
                if_none_match_tag: None,
                asso_iss_address: self.asso_iss_address.clone(),
            })
            .await
            .map_err(|e| e.message)?;

        Ok(LeafSuccess {
            public_url: Some(write_result.public_url),
            etag: Some(write_result.etag),
            backup_paths,
            file_logs: vec![write_result.file_log],
        })
    }

    async fn execute_delete(&self, leaf: &BatchLeaf, do_ignore_does_not_exist_error: bool) -> Result<LeafSuccess, String> {
        self.scopes.authorize_delete(&leaf.path).map_err(|e| e.message)?;
        if self
            .blacklist_cache
            .is_blacklisted(&self.asso_iss_address, PerformType::Delete)
            .await
            .map_err(|e| e.message)?
        {
            return Err("address is blacklisted for deletes".to_string());
        }

        let key = ObjectKey::new(self.bucket.clone(), leaf.path.clone()).map_err(|_| "path contains '..'".to_string())?;

        if self.scopes.is_archival_restricted() {
            let backup_paths = self.archival_rename(&key).await?;
            return Ok(LeafSuccess {
                backup_paths,
                ..Default::default()
            });
        }

        match self
            .driver
            .perform_delete(DeleteRequest {
                storage_top_level: key.bucket().to_string(),
                path: key.relative_path().to_string(),
                if_match_tag: None,
                asso_iss_address: self.asso_iss_address.clone(),
            })
            .await
        {
            Ok(()) => Ok(LeafSuccess::default()),
            Err(e) if e.code == HubErrorCode::DoesNotExist && do_ignore_does_not_exist_error => Ok(LeafSuccess::default()),
            Err(e) => Err(e.message),
        }
    }
}

#[async_trait::async_trait]
impl LeafExecutor for HubLeafExecutor<'_> {
    async fn execute(&self, leaf: &BatchLeaf) -> Result<LeafSuccess, String> {
        match &leaf.op {
            LeafOp::Put { content, content_type } => self.execute_put(leaf, content, content_type).await,
            LeafOp::Delete { do_ignore_does_not_exist_error } => {
                self.execute_delete(leaf, *do_ignore_does_not_exist_error).await
            }
        }
    }
}

/// Parse a `perform-files` JSON body into a [`BatchNode`] tree.
pub fn parse_batch_node(value: &Value) -> Result<BatchNode, String> {
    let obj = value.as_object().ok_or("batch node must be a JSON object")?;

    if let Some(values) = obj.get("values") {
        let values = values.as_array().ok_or("'values' must be an array")?;
        let is_sequential = obj
            .get("isSequential")
            .and_then(Value::as_bool)
            .ok_or("interior node missing boolean 'isSequential'")?;
        let children = values.iter().map(parse_batch_node).collect::<Result<Vec<_>, _>>()?;
        return Ok(BatchNode::Interior {
            values: children,
            is_sequential,
        });
    }

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .ok_or("leaf missing string 'id'")?
        .to_string();
    let path = obj
        .get("path")
        .and_then(Value::as_str)
        .ok_or("leaf missing string 'path'")?
        .to_string();
    let leaf_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or("leaf missing string 'type'")?;

    let op = match leaf_type {
        "PUT" => LeafOp::Put {
            content: obj.get("content").cloned().unwrap_or(Value::Null),
            content_type: obj.get("contentType").and_then(Value::as_str).map(str::to_string),
        },
        "DELETE" => LeafOp::Delete {
            do_ignore_does_not_exist_error: obj
                .get("doIgnoreDoesNotExistError")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        other => return Err(format!("unrecognized leaf type '{other}'")),
    };

    Ok(BatchNode::Leaf(BatchLeaf { id, path, op }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interior_and_leaf_nodes() {
        let value = serde_json::json!({
            "values": [
                {"id": "1", "type": "PUT", "path": "a.txt", "content": "hello"},
                {"id": "2", "type": "DELETE", "path": "b.txt", "doIgnoreDoesNotExistError": true},
            ],
            "isSequential": true,
        });
        let node = parse_batch_node(&value).unwrap();
        match node {
            BatchNode::Interior { values, is_sequential } => {
                assert!(is_sequential);
                assert_eq!(values.len(), 2);
            }
            _ => panic!("expected interior node"),
        }
    }

    #[test]
    fn rejects_unknown_leaf_type() {
        let value = serde_json::json!({"id": "1", "type": "PATCH", "path": "a.txt"});
        assert!(parse_batch_node(&value).is_err());
    }

    #[test]
    fn rejects_interior_missing_is_sequential() {
        let value = serde_json::json!({"values": []});
        assert!(parse_batch_node(&value).is_err());
    }
}
