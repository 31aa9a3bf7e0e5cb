//! HTTP API server for the Sigil node.
//!
//! Successful responses are wrapped as `{ "success": true, "data": ... }`;
//! failures as `{ "success": false, "error": "..." }`.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use sigil_credentials::{
    IssuerApplication, Profile, StoredCredential, VerifiablePresentation, VerificationReport,
};
use sigil_identity::{DidDocument, DidRecord, LedgerReceipt, VerificationRecord};

use crate::admin::{ApplicationRequest, ReviewRequest, RoleRequest};
use crate::anchoring::submit_operation;
use crate::auth::CurrentUser;
use crate::error::ServiceError;
use crate::explorer::{DidDetails, DidSummary, GlobalStats, UserStats};
use crate::issuance::{GenerateDidRequest, GenerateDidResponse};
use crate::state::AppState;
use crate::wallet::{IssueCredentialRequest, PresentationRequest, VerifyRequest};

// --- Response types ---

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ServiceError>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data,
    }))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Deserialize)]
pub struct SubmitOperationRequest {
    #[serde(default, rename = "operationId")]
    pub operation_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
}

// --- Handlers ---

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

async fn handle_generate_did(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(req): Json<GenerateDidRequest>,
) -> ApiResult<GenerateDidResponse> {
    ok(state.issuance.generate(&user.id, req).await?)
}

async fn handle_submit_operation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitOperationRequest>,
) -> ApiResult<LedgerReceipt> {
    let operation_id = req.operation_id.unwrap_or_default();
    ok(submit_operation(&state.store, state.ledger.as_ref(), &operation_id).await?)
}

async fn handle_my_did(State(state): State<Arc<AppState>>, user: CurrentUser) -> ApiResult<DidDetails> {
    ok(state.explorer.my_did(&user)?)
}

async fn handle_retire_did(State(state): State<Arc<AppState>>, user: CurrentUser) -> ApiResult<DidRecord> {
    ok(state.explorer.retire(&user)?)
}

async fn handle_reverify(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<VerificationRecord> {
    ok(state.explorer.reverify(&user)?)
}

async fn handle_resolve(
    State(state): State<Arc<AppState>>,
    Path(did): Path<String>,
) -> ApiResult<DidDocument> {
    ok(state.explorer.resolve(&did)?)
}

async fn handle_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<DidSummary>> {
    ok(state.explorer.search(params.q.as_deref())?)
}

async fn handle_global_stats(State(state): State<Arc<AppState>>) -> ApiResult<GlobalStats> {
    ok(state.explorer.global_stats()?)
}

async fn handle_my_stats(State(state): State<Arc<AppState>>, user: CurrentUser) -> ApiResult<UserStats> {
    ok(state.explorer.user_stats(&user)?)
}

async fn handle_submit_application(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(req): Json<ApplicationRequest>,
) -> ApiResult<IssuerApplication> {
    ok(state.admin.submit_application(&user, req)?)
}

async fn handle_my_application(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<IssuerApplication> {
    ok(state.admin.my_application(&user)?)
}

async fn handle_withdraw_application(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<IssuerApplication> {
    ok(state.admin.withdraw_application(&user)?)
}

async fn handle_list_applications(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Vec<IssuerApplication>> {
    ok(state.admin.list_applications(&user)?)
}

async fn handle_review_application(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> ApiResult<IssuerApplication> {
    ok(state.admin.review(&user, id, req.decision)?)
}

async fn handle_list_profiles(State(state): State<Arc<AppState>>, user: CurrentUser) -> ApiResult<Vec<Profile>> {
    ok(state.admin.list_profiles(&user)?)
}

async fn handle_set_role(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<RoleRequest>,
) -> ApiResult<Profile> {
    ok(state.admin.set_role(&user, &id, req.role)?)
}

async fn handle_profile(State(state): State<Arc<AppState>>, user: CurrentUser) -> ApiResult<Profile> {
    let profile = state
        .store
        .get_profile(&user.id)?
        .ok_or_else(|| ServiceError::NotFound("Profile not found".into()))?;
    ok(profile)
}

async fn handle_issue_credential(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(req): Json<IssueCredentialRequest>,
) -> ApiResult<StoredCredential> {
    ok(state.wallet.issue(&user, req)?)
}

async fn handle_list_credentials(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Vec<StoredCredential>> {
    ok(state.wallet.holder_credentials(&user)?)
}

async fn handle_issued_credentials(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> ApiResult<Vec<StoredCredential>> {
    ok(state.wallet.issued_credentials(&user)?)
}

async fn handle_revoke_credential(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StoredCredential> {
    ok(state.wallet.revoke(&user, id)?)
}

async fn handle_build_presentation(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(req): Json<PresentationRequest>,
) -> ApiResult<VerifiablePresentation> {
    ok(state.wallet.present(&user, &req.indices)?)
}

async fn handle_verify_presentation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<VerificationReport> {
    ok(state.wallet.verify(&req.input())?)
}

// --- Router ---

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/functions/generate-did", post(handle_generate_did))
        .route("/functions/submit-ion-operation", post(handle_submit_operation))
        .route("/api/v1/dids/me", get(handle_my_did).delete(handle_retire_did))
        .route("/api/v1/dids/me/verify", post(handle_reverify))
        .route("/api/v1/dids/resolve/{did}", get(handle_resolve))
        .route("/api/v1/dids/search", get(handle_search))
        .route("/api/v1/stats/global", get(handle_global_stats))
        .route("/api/v1/stats/me", get(handle_my_stats))
        .route(
            "/api/v1/applications/me",
            post(handle_submit_application)
                .get(handle_my_application)
                .delete(handle_withdraw_application),
        )
        .route("/api/v1/admin/applications", get(handle_list_applications))
        .route(
            "/api/v1/admin/applications/{id}/review",
            post(handle_review_application),
        )
        .route("/api/v1/admin/profiles", get(handle_list_profiles))
        .route("/api/v1/admin/profiles/{id}/role", put(handle_set_role))
        .route("/api/v1/profile", get(handle_profile))
        .route("/api/v1/credentials", get(handle_list_credentials))
        .route("/api/v1/credentials/issue", post(handle_issue_credential))
        .route("/api/v1/credentials/issued", get(handle_issued_credentials))
        .route("/api/v1/credentials/{id}/revoke", post(handle_revoke_credential))
        .route("/api/v1/presentations", post(handle_build_presentation))
        .route("/api/v1/presentations/verify", post(handle_verify_presentation))
        .with_state(state)
}

/// Bind `listen_addr` and serve the API in a background task; returns the
/// bound address.
pub async fn start_api_server(
    listen_addr: SocketAddr,
    state: Arc<AppState>,
) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, "HTTP API server started");

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP API server error");
        }
    });
    Ok((local_addr, handle))
}
