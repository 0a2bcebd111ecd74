// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP handlers for the storage hub's seven-endpoint surface.

use crate::batch_executor::{parse_batch_node, HubLeafExecutor};
use crate::state::AppState;
use crate::validation::RequestValidator;
use axum::body::{Body, Bytes as AxumBytes};
use axum::extract::{Path as AxPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::TryStreamExt;
use hub_archive::{rename_for_overwrite, ArchiveOutcome};
use hub_auth::{verify, EffectiveSigner, ScopeSets, VerifyOptions};
use hub_batch::run_batch;
use hub_core::blacklist::PerformType;
use hub_core::object::ObjectKey;
use hub_core::principal::Address;
use hub_driver::{Driver, DeleteRequest, ListRequest, RenameRequest, WriteRequest};
use hub_error::{HubError, HubErrorCode};
use hub_stream::{compute_cap, race_upload, SizeMonitoredStream};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;

/// Wraps [`HubError`] so it can implement [`IntoResponse`] from this crate.
pub struct ApiError(pub HubError);

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut body = json!({
            "message": err.message,
            "error": err.code.as_str(),
        });
        if let Value::Object(map) = &mut body {
            for (key, value) in err.context {
                map.insert(key, value);
            }
        }
        (status, Json(body)).into_response()
    }
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn unix_now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn extract_auth_header(headers: &HeaderMap) -> Result<&str, HubError> {
    header_str(headers, "authorization").ok_or_else(|| HubError::validation("missing Authorization header"))
}

fn rewrite_public_url(public_url: &str, driver_prefix: &str, configured_read_url: &str) -> String {
    if configured_read_url.is_empty() || driver_prefix == configured_read_url {
        return public_url.to_string();
    }
    match public_url.strip_prefix(driver_prefix) {
        Some(suffix) => format!("{configured_read_url}{suffix}"),
        None => public_url.to_string(),
    }
}

async fn build_verify_opts<'a>(state: &'a AppState, bucket: &Address, no_floor: bool) -> Result<VerifyOptions<'a>, HubError> {
    let floor = if no_floor {
        0
    } else {
        state.revocation_cache.get_auth_timestamp(bucket).await?
    };
    Ok(VerifyOptions {
        challenges: &state.challenges,
        require_correct_hub_url: state.config.require_correct_hub_url,
        valid_hub_urls: &state.valid_hub_urls,
        oldest_valid_token_timestamp: floor,
        now: unix_now(),
    })
}

/// Rename the current object at `key` into a fresh historical name, for
/// archival-restricted writes/deletes/batch leaves. Returns the backup
/// paths to enqueue (empty when there was nothing to archive).
async fn archival_rename(
    driver: &Arc<impl Driver>,
    key: &ObjectKey,
    asso_iss_address: &Address,
) -> Result<Vec<String>, HubError> {
    let storage_top_level = key.bucket().to_string();
    let path = key.relative_path().to_string();
    let outcome = rename_for_overwrite(key, unix_now_millis(), |new_path| {
        let driver = driver.clone();
        let asso_iss_address = asso_iss_address.clone();
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
    .await?;
    Ok(match outcome {
        ArchiveOutcome::Renamed(path) => vec![path],
        ArchiveOutcome::NoPriorObject => Vec::new(),
    })
}

async fn authorize_signer(
    state: &AppState,
    bucket: &Address,
    headers: &HeaderMap,
    no_floor: bool,
) -> Result<(EffectiveSigner, ScopeSets), HubError> {
    let auth_header = extract_auth_header(headers)?;
    let opts = build_verify_opts(state, bucket, no_floor).await?;
    let (signer, payload) = verify(auth_header, bucket, &opts)?;
    hub_auth::check_whitelist(signer.address(), &state.whitelist)?;
    let scopes = ScopeSets::from_entries(payload.scopes.as_deref().unwrap_or(&[]));
    Ok((signer, scopes))
}

// ---------------------------------------------------------------------------
// Write handler: POST /store/{address}/{*rel_path}
// ---------------------------------------------------------------------------

/// `POST /store/{address}/{*rel_path}`
pub async fn handle_write(
    State(state): State<Arc<AppState>>,
    AxPath((address, rel_path)): AxPath<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let bucket = Address::parse(&address).map_err(|_| HubError::validation("malformed bucket address"))?;
    let key = RequestValidator::validate_path(bucket.clone(), rel_path)?;
    let mutex_key = key.full_key();

    let outcome = state
        .mutex_scope
        .try_acquire(mutex_key, || handle_write_inner(state.clone(), bucket, key, headers, body))
        .await;

    match outcome {
        Ok(inner) => Ok(inner?),
        Err(e) => Err(e.into()),
    }
}

async fn handle_write_inner(
    state: Arc<AppState>,
    bucket: Address,
    key: ObjectKey,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let (revocation_floor, blacklisted) = tokio::try_join!(
        state.revocation_cache.get_auth_timestamp(&bucket),
        state.blacklist_cache.is_blacklisted(&bucket, PerformType::Put),
    )?;
    if blacklisted {
        return Err(HubError::validation("address is blacklisted for writes").into());
    }

    let auth_header = extract_auth_header(&headers)?;
    let opts = VerifyOptions {
        challenges: &state.challenges,
        require_correct_hub_url: state.config.require_correct_hub_url,
        valid_hub_urls: &state.valid_hub_urls,
        oldest_valid_token_timestamp: revocation_floor,
        now: unix_now(),
    };
    let (signer, payload) = verify(auth_header, &bucket, &opts)?;
    hub_auth::check_whitelist(signer.address(), &state.whitelist)?;
    if state.config.check_association_blacklist && signer.association_issuer.is_some() {
        let assoc_blacklisted = state.blacklist_cache.is_blacklisted(signer.address(), PerformType::Put).await?;
        if assoc_blacklisted {
            return Err(HubError::validation("association issuer is blacklisted for writes").into());
        }
    }

    let scopes = ScopeSets::from_entries(payload.scopes.as_deref().unwrap_or(&[]));
    scopes.authorize_write(key.relative_path())?;

    let if_match = header_str(&headers, "if-match").map(str::to_string);
    let if_none_match = header_str(&headers, "if-none-match").map(str::to_string);
    if if_match.is_some() && if_none_match.is_some() {
        return Err(HubError::validation("cannot set both If-Match and If-None-Match").into());
    }
    if let Some(value) = &if_none_match {
        if value != "*" {
            return Err(HubError::validation("If-None-Match is only supported with value '*'").into());
        }
    }

    let content_type = RequestValidator::validate_content_type(header_str(&headers, "content-type"))?;

    let content_length: Option<u64> = header_str(&headers, "content-length").and_then(|v| v.parse().ok());
    let max = state.config.max_file_upload_size;
    if let Some(len) = content_length {
        if len > max {
            return Err(HubError::new(HubErrorCode::PayloadTooLarge, format!("body exceeds {max} bytes")).into());
        }
    }

    let backup_paths = if scopes.is_archival_restricted() {
        archival_rename(&state.driver, &key, signer.address()).await?
    } else {
        Vec::new()
    };

    let cap = compute_cap(content_length, max);
    let monitored = SizeMonitoredStream::new(
        body.into_data_stream().map_err(|e| HubError::new(HubErrorCode::ServerError, e.to_string())),
        cap,
    );

    let (tx, rx) = oneshot::channel();
    let collect_fut = async move {
        let mut buf = bytes::BytesMut::new();
        let mut monitored = std::pin::pin!(monitored);
        while let Some(chunk) = futures::StreamExt::next(&mut monitored).await {
            buf.extend_from_slice(&chunk?);
        }
        let _ = tx.send(buf.freeze());
        Ok::<(), HubError>(())
    };

    let driver = state.driver.clone();
    let storage_top_level = key.bucket().to_string();
    let path = key.relative_path().to_string();
    let asso_iss_address = signer.address().clone();
    let upload_fut = async move {
        let content = rx.await.map_err(|_| HubError::new(HubErrorCode::ServerError, "upload pipeline dropped"))?;
        driver
            .perform_write(WriteRequest {
                storage_top_level,
                path,
                content,
                content_type,
                if_match_tag: if_match,
                if_none_match_tag: if_none_match,
                asso_iss_address,
            })
            .await
    };

    let (write_result, ()) = race_upload(upload_fut, collect_fut).await?;

    state
        .driver
        .add_task_to_queue(backup_paths, vec![write_result.file_log])
        .await;

    let public_url = rewrite_public_url(&write_result.public_url, &state.driver.get_read_url_prefix(), &state.config.read_url);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "publicURL": public_url, "etag": write_result.etag })),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Delete handler: DELETE /delete/{address}/{*rel_path}
// ---------------------------------------------------------------------------

/// `DELETE /delete/{address}/{*rel_path}`
pub async fn handle_delete(
    State(state): State<Arc<AppState>>,
    AxPath((address, rel_path)): AxPath<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let bucket = Address::parse(&address).map_err(|_| HubError::validation("malformed bucket address"))?;
    let key = RequestValidator::validate_path(bucket.clone(), rel_path)?;
    let mutex_key = key.full_key();

    let outcome = state
        .mutex_scope
        .try_acquire(mutex_key, || handle_delete_inner(state.clone(), bucket, key, headers))
        .await;

    match outcome {
        Ok(inner) => Ok(inner?),
        Err(e) => Err(e.into()),
    }
}

async fn handle_delete_inner(
    state: Arc<AppState>,
    bucket: Address,
    key: ObjectKey,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (revocation_floor, blacklisted) = tokio::try_join!(
        state.revocation_cache.get_auth_timestamp(&bucket),
        state.blacklist_cache.is_blacklisted(&bucket, PerformType::Delete),
    )?;
    if blacklisted {
        return Err(HubError::validation("address is blacklisted for deletes").into());
    }

    let auth_header = extract_auth_header(&headers)?;
    let opts = VerifyOptions {
        challenges: &state.challenges,
        require_correct_hub_url: state.config.require_correct_hub_url,
        valid_hub_urls: &state.valid_hub_urls,
        oldest_valid_token_timestamp: revocation_floor,
        now: unix_now(),
    };
    let (signer, payload) = verify(auth_header, &bucket, &opts)?;
    hub_auth::check_whitelist(signer.address(), &state.whitelist)?;

    let scopes = ScopeSets::from_entries(payload.scopes.as_deref().unwrap_or(&[]));
    scopes.authorize_delete(key.relative_path())?;

    if header_str(&headers, "if-none-match").is_some() {
        return Err(HubError::validation("If-None-Match is not supported on delete").into());
    }
    let if_match = header_str(&headers, "if-match").map(str::to_string);

    if scopes.is_archival_restricted() {
        let backup_paths = archival_rename(&state.driver, &key, signer.address()).await?;
        state.driver.add_task_to_queue(backup_paths, vec![]).await;
    } else {
        state
            .driver
            .perform_delete(DeleteRequest {
                storage_top_level: key.bucket().to_string(),
                path: key.relative_path().to_string(),
                if_match_tag: if_match,
                asso_iss_address: signer.address().clone(),
            })
            .await?;
    }

    Ok(StatusCode::ACCEPTED.into_response())
}

// ---------------------------------------------------------------------------
// List handler: POST /list-files/{address}
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct StatEntry<'a> {
    name: &'a str,
    #[serde(flatten)]
    meta: &'a hub_core::object::ObjectMetadata,
}

/// `POST /list-files/{address}`
pub async fn handle_list_files(
    State(state): State<Arc<AppState>>,
    AxPath(address): AxPath<String>,
    headers: HeaderMap,
    body: AxumBytes,
) -> Result<Response, ApiError> {
    let bucket = Address::parse(&address).map_err(|_| HubError::validation("malformed bucket address"))?;
    let body = RequestValidator::validate_small_body(&body)?;

    let (signer, scopes) = authorize_signer(&state, &bucket, &headers, false).await?;
    let _ = &signer;

    let page = body.get("page").and_then(Value::as_str).map(str::to_string);
    let requested_page_size = body.get("pageSize").and_then(Value::as_u64).map(|v| v as u32);
    let page_size = requested_page_size
        .unwrap_or(state.config.page_size)
        .clamp(1, state.config.page_size);
    let stat = body.get("stat").and_then(Value::as_bool).unwrap_or(false);

    let req = ListRequest {
        path_prefix: format!("{}/", bucket.as_str()),
        page,
        page_size: Some(page_size),
    };

    let archival_restricted = scopes.is_archival_restricted();

    let (entries, next_page): (Vec<Value>, Option<String>) = if stat {
        let result = state.driver.list_files_stat(req).await?;
        let entries = result
            .entries
            .iter()
            .filter(|(name, _)| !archival_restricted || !hub_archive::is_historical_basename(basename(name)))
            .map(|(name, meta)| serde_json::to_value(StatEntry { name, meta }).expect("ObjectMetadata always serializes"))
            .collect();
        (entries, result.page)
    } else {
        let result = state.driver.list_files(req).await?;
        let entries = result
            .entries
            .iter()
            .filter(|name| !archival_restricted || !hub_archive::is_historical_basename(basename(name)))
            .map(|name| Value::String(name.clone()))
            .collect();
        (entries, result.page)
    };

    let mut entries = entries;
    if entries.is_empty() && next_page.is_some() {
        entries.push(Value::Null);
    }

    Ok((StatusCode::ACCEPTED, Json(json!({ "entries": entries, "page": next_page }))).into_response())
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

// ---------------------------------------------------------------------------
// Batch handler: POST /perform-files/{address}
// ---------------------------------------------------------------------------

/// `POST /perform-files/{address}`
pub async fn handle_perform_files(
    State(state): State<Arc<AppState>>,
    AxPath(address): AxPath<String>,
    headers: HeaderMap,
    body: AxumBytes,
) -> Result<Response, ApiError> {
    let bucket = Address::parse(&address).map_err(|_| HubError::validation("malformed bucket address"))?;

    if body.len() as u64 > state.config.max_file_upload_size {
        return Err(HubError::new(HubErrorCode::PayloadTooLarge, "batch body exceeds the maximum upload size").into());
    }
    let value: Value = serde_json::from_slice(&body).map_err(|_| HubError::new(HubErrorCode::InvalidInput, "body is not valid JSON"))?;

    let (revocation_floor, blacklisted) = tokio::try_join!(
        state.revocation_cache.get_auth_timestamp(&bucket),
        state.blacklist_cache.is_blacklisted(&bucket, PerformType::Perform),
    )?;
    if blacklisted {
        return Err(HubError::validation("address is blacklisted for batch operations").into());
    }

    let auth_header = extract_auth_header(&headers)?;
    let opts = VerifyOptions {
        challenges: &state.challenges,
        require_correct_hub_url: state.config.require_correct_hub_url,
        valid_hub_urls: &state.valid_hub_urls,
        oldest_valid_token_timestamp: revocation_floor,
        now: unix_now(),
    };
    let (signer, payload) = verify(auth_header, &bucket, &opts)?;
    hub_auth::check_whitelist(signer.address(), &state.whitelist)?;
    let scopes = ScopeSets::from_entries(payload.scopes.as_deref().unwrap_or(&[]));

    let node = parse_batch_node(&value).map_err(HubError::validation)?;

    let executor = HubLeafExecutor {
        driver: state.driver.as_ref(),
        bucket: bucket.clone(),
        asso_iss_address: signer.address().clone(),
        scopes,
        blacklist_cache: &state.blacklist_cache,
        max_file_upload_size: state.config.max_file_upload_size,
        now_unix_millis: unix_now_millis(),
    };

    let outcome = run_batch(&node, &executor).await;
    state.driver.add_task_to_queue(outcome.backup_paths, outcome.file_logs).await;

    Ok((StatusCode::ACCEPTED, Json(outcome.results)).into_response())
}

// ---------------------------------------------------------------------------
// Revoke handler: POST /revoke-all/{address}
// ---------------------------------------------------------------------------

/// `POST /revoke-all/{address}`
pub async fn handle_revoke_all(
    State(state): State<Arc<AppState>>,
    AxPath(address): AxPath<String>,
    headers: HeaderMap,
    body: AxumBytes,
) -> Result<Response, ApiError> {
    let bucket = Address::parse(&address).map_err(|_| HubError::validation("malformed bucket address"))?;
    let body = RequestValidator::validate_small_body(&body)?;

    // Verify with no revocation floor, to avoid a token locking itself out.
    authorize_signer(&state, &bucket, &headers, true).await?;

    let oldest_valid_timestamp = body
        .get("oldestValidTimestamp")
        .and_then(Value::as_i64)
        .ok_or_else(|| HubError::new(HubErrorCode::InvalidInput, "missing integer 'oldestValidTimestamp'"))?;

    state.revocation_cache.set_auth_timestamp(&bucket, oldest_valid_timestamp, unix_now()).await?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "success" }))).into_response())
}

// ---------------------------------------------------------------------------
// hub_info / welcome
// ---------------------------------------------------------------------------

/// `GET /hub_info/`
pub async fn hub_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "challenge_text": state.challenges.first().cloned().unwrap_or_default(),
        "latest_auth_version": "v1",
        "max_file_upload_size_megabytes": state.config.max_file_upload_size / (1024 * 1024),
        "read_url_prefix": state.config.read_url,
    }))
}

/// `GET /`
pub async fn welcome() -> impl IntoResponse {
    axum::response::Html("<html><body><h1>storage hub</h1></body></html>")
}
