//! REST handlers for the paste API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Extension, Path, Query, TypedHeader};
use axum::http::HeaderMap;
use axum::Json;
use headers::UserAgent;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::{instrument, warn};

use pastegate_common::api::{
    DeleteResponse, ListResponse, Pagination, PasteResponse, ViewResponse,
};
use pastegate_common::{language, CreatePasteRequest, Paste, UpdatePasteRequest};

use crate::config::Config;
use crate::error::ApiError;
use crate::gate::{self, Access};
use crate::short_code;
use crate::store::{ListFilter, PasteStore, StoreError, MAX_PAGE_LIMIT};

/// Upper bound on paste content, in bytes.
const MAX_CONTENT_SIZE: usize = 1_048_576;

/// Insert attempts before a create gives up on finding a free id.
const MAX_CREATE_ATTEMPTS: usize = 3;

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub language: Option<String>,
    pub user_id: Option<String>,
}

#[instrument(skip_all, err)]
pub async fn create_paste(
    Extension(store): Extension<Arc<PasteStore>>,
    Json(mut req): Json<CreatePasteRequest>,
) -> Result<Json<PasteResponse>, ApiError> {
    req.validate()
        .map_err(|details| ApiError::Validation { details })?;
    if req.content.len() > MAX_CONTENT_SIZE {
        return Err(ApiError::PayloadTooLarge);
    }

    if req.language.is_none() {
        req.language = Some(language::detect(&req.content, None).to_owned());
    }
    let base = paste_from_request(req);

    let mut rng = StdRng::from_entropy();
    for attempt in 1..=MAX_CREATE_ATTEMPTS {
        let id = short_code::generate_unique(&mut rng, |id| {
            let store = Arc::clone(&store);
            async move { store.exists(&id).await }
        })
        .await?;

        let mut paste = base.clone();
        paste.id = id;
        match store.create(paste).await {
            Ok(stored) => return Ok(Json(PasteResponse::new(stored.sanitized()))),
            Err(StoreError::Conflict) => {
                warn!("short code collided at insert (attempt {})", attempt);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::Unavailable)
}

#[instrument(skip_all, err)]
pub async fn fetch_paste(
    Extension(store): Extension<Arc<PasteStore>>,
    Extension(config): Extension<Arc<Config>>,
    Path(id): Path<String>,
    Query(query): Query<FetchQuery>,
    user_agent: Option<TypedHeader<UserAgent>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Json<PasteResponse>, ApiError> {
    let paste = store.get(&id).await?;
    let access = gate::evaluate(paste.as_ref(), query.password.as_deref());

    match (access, paste) {
        (Access::Granted, Some(paste)) => {
            if config.count_on_fetch {
                let fingerprint = request_fingerprint(&headers, peer, user_agent.as_ref());
                let store = Arc::clone(&store);
                let id = paste.id.clone();
                // A counting failure degrades to "view not counted"; the
                // response never waits on it.
                tokio::spawn(async move {
                    if let Err(e) = store.record_view_if_absent(&id, &fingerprint).await {
                        warn!("view counting failed for {}: {}", id, e);
                    }
                });
            }
            Ok(Json(PasteResponse::new(paste.sanitized())))
        }
        (Access::PasswordRequired, _) => Err(ApiError::PasswordRequired),
        _ => Err(ApiError::NotFound),
    }
}

#[instrument(skip_all, err)]
pub async fn update_paste(
    Extension(store): Extension<Arc<PasteStore>>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePasteRequest>,
) -> Result<Json<PasteResponse>, ApiError> {
    req.validate()
        .map_err(|details| ApiError::Validation { details })?;
    if req.content.len() > MAX_CONTENT_SIZE {
        return Err(ApiError::PayloadTooLarge);
    }

    let updated = store.update(&id, req).await?;
    Ok(Json(PasteResponse::new(updated.sanitized())))
}

#[instrument(skip_all, err)]
pub async fn delete_paste(
    Extension(store): Extension<Arc<PasteStore>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    store.delete(&id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: Some("Paste deleted successfully".to_owned()),
    }))
}

#[instrument(skip_all, err)]
pub async fn list_pastes(
    Extension(store): Extension<Arc<PasteStore>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, MAX_PAGE_LIMIT);

    let (pastes, total) = store
        .list(ListFilter {
            page,
            limit,
            search: query.search.filter(|s| !s.is_empty()),
            language: query.language.filter(|s| !s.is_empty()),
            owner: query.user_id.filter(|s| !s.is_empty()),
        })
        .await?;

    Ok(Json(ListResponse {
        success: true,
        data: pastes.into_iter().map(Paste::sanitized).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}

/// Counts a view for the requesting viewer. Idempotent per viewer from
/// the caller's point of view: the response reports the current total
/// whether or not this call incremented it. Password protection is not
/// re-checked here; clients invoke this only after disclosure.
#[instrument(skip_all, err)]
pub async fn record_view(
    Extension(store): Extension<Arc<PasteStore>>,
    Path(id): Path<String>,
    user_agent: Option<TypedHeader<UserAgent>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Json<ViewResponse>, ApiError> {
    let paste = store.get(&id).await?;
    if matches!(
        gate::evaluate(paste.as_ref(), None),
        Access::NotFound | Access::Expired
    ) {
        return Err(ApiError::NotFound);
    }

    let fingerprint = request_fingerprint(&headers, peer, user_agent.as_ref());
    let outcome = store.record_view_if_absent(&id, &fingerprint).await?;

    Ok(Json(ViewResponse {
        success: true,
        views: outcome.views,
        message: (!outcome.counted).then(|| "View already recorded for this viewer".to_owned()),
    }))
}

fn request_fingerprint(
    headers: &HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    user_agent: Option<&TypedHeader<UserAgent>>,
) -> String {
    let ip = gate::client_ip(headers, peer.map(|ConnectInfo(addr)| addr));
    gate::fingerprint(&ip, user_agent.map(|TypedHeader(ua)| ua.as_str()))
}

fn paste_from_request(req: CreatePasteRequest) -> Paste {
    let now = chrono::Utc::now();
    Paste {
        // Placeholder until the create loop assigns a generated id.
        id: String::new(),
        title: req.title,
        content: req.content,
        language: req.language,
        visibility: req.visibility,
        protection: req.protection,
        password: req.password,
        expires_at: req.expires_at,
        views: 0,
        owner_id: req.owner_id,
        created_at: now,
        updated_at: now,
    }
}
