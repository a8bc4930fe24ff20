//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use flashread_core::domain::{Document, DocumentSource, ExportBundle, ReuploadRequest};
use flashread_core::fingerprint;
use flashread_core::parser::parse_text;
use flashread_core::ports::{Clock, LocalStore, PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        upload_document_handler,
        paste_document_handler,
        list_documents_handler,
        get_document_handler,
        delete_document_handler,
        update_progress_handler,
        stats_handler,
        streak_freeze_handler,
        sync_handler,
        export_handler,
        import_handler,
    ),
    components(
        schemas(
            DocumentResponse,
            DocumentDetailResponse,
            PastePayload,
            ProgressPayload,
            StatsResponse,
            ReuploadEntry,
            SyncResponse,
        )
    ),
    tags(
        (name = "FlashRead API", description = "Local-first RSVP reading service.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Document metadata, without its content.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub total_words: u32,
    pub bookmark_index: u32,
    pub source: String,
    pub is_ghost: bool,
    pub created_at: DateTime<Utc>,
    pub last_read_at: DateTime<Utc>,
}

impl From<&Document> for DocumentResponse {
    fn from(doc: &Document) -> Self {
        let source = match doc.source {
            DocumentSource::Upload => "upload",
            DocumentSource::Paste => "paste",
            DocumentSource::Sync => "sync",
        };
        Self {
            id: doc.id,
            title: doc.title.clone(),
            total_words: doc.total_words,
            bookmark_index: doc.bookmark_index,
            source: source.to_string(),
            is_ghost: doc.is_ghost,
            created_at: doc.created_at,
            last_read_at: doc.last_read_at,
        }
    }
}

/// A full document, content included.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetailResponse {
    #[serde(flatten)]
    pub meta: DocumentResponse,
    pub content: String,
}

/// Pasted-text document creation payload.
#[derive(Deserialize, ToSchema)]
pub struct PastePayload {
    pub title: Option<String>,
    pub text: String,
}

/// Immediate bookmark update payload (the application-hide path).
#[derive(Deserialize, ToSchema)]
pub struct ProgressPayload {
    pub index: u32,
}

/// Dashboard statistics.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub current_streak: u32,
    pub streak_freeze_active: bool,
    pub total_words_read: u64,
    pub words_read_today: u64,
    pub documents_completed: u32,
    pub average_wpm: u32,
}

/// A synced document whose content must be re-supplied on this device.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReuploadEntry {
    pub remote_id: String,
    pub title: String,
    pub bookmark_index: u32,
    pub total_words: u32,
}

impl From<ReuploadRequest> for ReuploadEntry {
    fn from(request: ReuploadRequest) -> Self {
        Self {
            remote_id: request.remote_id,
            title: request.title,
            bookmark_index: request.bookmark_index,
            total_words: request.total_words,
        }
    }
}

/// The result of a full sync run.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub needs_reupload: Vec<ReuploadEntry>,
}

fn port_error_response(e: PortError) -> (StatusCode, String) {
    let status = match &e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PortError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

//=========================================================================================
// Document creation (shared by upload and paste)
//=========================================================================================

/// Creates a document from raw text, or merges into an existing record with
/// the same fingerprint: a content-less record (a ghost from sync) gets the
/// content attached and its ghost flag cleared while its bookmark (the
/// higher of the two) is preserved; a complete duplicate is simply
/// returned.
pub(crate) async fn upsert_document_from_content(
    store: &Arc<dyn LocalStore>,
    clock: &Arc<dyn Clock>,
    title: &str,
    content: String,
    source: DocumentSource,
) -> PortResult<Document> {
    let words = parse_text(&content);
    if words.is_empty() {
        return Err(PortError::InvalidInput(
            "No valid words found in the text".to_string(),
        ));
    }

    let fp = fingerprint::fingerprint_words(&words);
    match store.get_document_by_fingerprint(&fp).await? {
        Some(mut existing) => {
            if existing.content.is_empty() {
                existing.supply_content(&content, words.len() as u32);
                existing.last_read_at = clock.now();
                store.save_document(&existing).await?;
            }
            Ok(existing)
        }
        None => {
            let doc = Document::from_content(title, &content, source, clock.now());
            store.save_document(&doc).await?;
            Ok(doc)
        }
    }
}

/// Pushes a freshly created document to the remote store, best-effort.
async fn sync_new_document(app_state: &Arc<AppState>, doc: &Document) {
    if let Err(e) = app_state.sync.sync_document(doc).await {
        warn!("Best-effort document sync failed: {e}");
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a document by uploading a file.
///
/// Accepts a multipart/form-data request with a single file part (.txt or
/// .pdf, at most 10 MB).
#[utoipa::path(
    post,
    path = "/documents",
    request_body(content_type = "multipart/form-data", description = "The document to upload."),
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 422, description = "Unsupported, oversized, or unreadable file"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_document_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {e}"),
        )
    })?
    else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Multipart form must include a file".to_string(),
        ));
    };

    let file_name = field.file_name().unwrap_or("untitled.txt").to_string();
    let bytes = field.bytes().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read file bytes: {e}"),
        )
    })?;

    let words = app_state
        .parser
        .parse(&file_name, &bytes)
        .await
        .map_err(port_error_response)?;
    let title = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&file_name)
        .to_string();

    let doc = upsert_document_from_content(
        &app_state.store,
        &app_state.clock,
        &title,
        words.join(" "),
        DocumentSource::Upload,
    )
    .await
    .map_err(port_error_response)?;

    sync_new_document(&app_state, &doc).await;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(&doc))))
}

/// Create a document from pasted text.
#[utoipa::path(
    post,
    path = "/documents/paste",
    request_body = PastePayload,
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 422, description = "No readable words in the text")
    )
)]
pub async fn paste_document_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<PastePayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let title = payload.title.unwrap_or_else(|| "Untitled".to_string());
    let doc = upsert_document_from_content(
        &app_state.store,
        &app_state.clock,
        &title,
        payload.text,
        DocumentSource::Paste,
    )
    .await
    .map_err(port_error_response)?;

    sync_new_document(&app_state, &doc).await;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(&doc))))
}

/// List all documents, most recently read first.
#[utoipa::path(
    get,
    path = "/documents",
    responses((status = 200, description = "Document metadata list", body = [DocumentResponse]))
)]
pub async fn list_documents_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let docs = app_state
        .store
        .all_documents()
        .await
        .map_err(port_error_response)?;
    let list: Vec<DocumentResponse> = docs.iter().map(DocumentResponse::from).collect();
    Ok(Json(list))
}

/// Fetch one document, content included.
#[utoipa::path(
    get,
    path = "/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "The document", body = DocumentDetailResponse),
        (status = 404, description = "Unknown document")
    )
)]
pub async fn get_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let doc = app_state
        .store
        .get_document(id)
        .await
        .map_err(port_error_response)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Document {id} not found")))?;
    Ok(Json(DocumentDetailResponse {
        meta: DocumentResponse::from(&doc),
        content: doc.content,
    }))
}

/// Delete a document, cascading to its remote record when linked.
#[utoipa::path(
    delete,
    path = "/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Unknown document")
    )
)]
pub async fn delete_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let doc = app_state
        .store
        .get_document(id)
        .await
        .map_err(port_error_response)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Document {id} not found")))?;

    if let Some(remote_id) = &doc.remote_id {
        if app_state.remote.is_available() {
            if let Err(e) = app_state.remote.delete_document(remote_id).await {
                warn!("Failed to delete remote record {remote_id}: {e}");
            }
        }
    }

    app_state
        .store
        .delete_document(id)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Persist a bookmark immediately, bypassing the debounce.
///
/// The browser calls this when the page is hidden, so an abrupt close
/// cannot lose more than the debounce window.
#[utoipa::path(
    post,
    path = "/documents/{id}/progress",
    params(("id" = Uuid, Path, description = "Document id")),
    request_body = ProgressPayload,
    responses(
        (status = 204, description = "Bookmark saved"),
        (status = 404, description = "Unknown document")
    )
)]
pub async fn update_progress_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProgressPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let doc = app_state
        .store
        .get_document(id)
        .await
        .map_err(port_error_response)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Document {id} not found")))?;

    let index = payload.index.min(doc.total_words);
    app_state.saver.save_now(id, index, doc.total_words).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Dashboard statistics.
#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Display statistics", body = StatsResponse))
)]
pub async fn stats_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let display = app_state.stats.lock().await.display_stats().await;
    Json(StatsResponse {
        current_streak: display.current_streak,
        streak_freeze_active: display.streak_freeze_active,
        total_words_read: display.total_words_read,
        words_read_today: display.words_read_today,
        documents_completed: display.documents_completed,
        average_wpm: display.average_wpm,
    })
}

/// Arm the one-time streak freeze.
#[utoipa::path(
    post,
    path = "/stats/freeze",
    responses((status = 200, description = "Freeze armed"))
)]
pub async fn streak_freeze_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let streak = app_state
        .store
        .activate_streak_freeze(app_state.clock.now())
        .await
        .map_err(port_error_response)?;
    Ok(Json(streak))
}

/// Run a full local/remote sync.
#[utoipa::path(
    post,
    path = "/sync",
    responses((status = 200, description = "Sync finished", body = SyncResponse))
)]
pub async fn sync_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let needs_reupload = app_state.sync.sync_all().await;
    Json(SyncResponse {
        needs_reupload: needs_reupload.into_iter().map(ReuploadEntry::from).collect(),
    })
}

/// Export the full local state as a versioned backup document.
#[utoipa::path(
    get,
    path = "/export",
    responses((status = 200, description = "Backup bundle"))
)]
pub async fn export_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bundle = app_state
        .store
        .export_all()
        .await
        .map_err(port_error_response)?;
    Ok(Json(bundle))
}

/// Merge-import a backup document.
#[utoipa::path(
    post,
    path = "/import",
    responses(
        (status = 204, description = "Backup merged"),
        (status = 422, description = "Unsupported backup version")
    )
)]
pub async fn import_handler(
    State(app_state): State<Arc<AppState>>,
    Json(bundle): Json<ExportBundle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .store
        .import_all(&bundle)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}
