use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::NetworkProfile;
use crate::credential::Secret;
use crate::orchestrator::{IssuanceOrchestrator, IssuanceRequest};
use crate::report::CreateTokenResponse;
use crate::IssuanceError;

pub fn issuance_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/create-token", post(create_token))
        .route("/api/create-token-mainnet", post(create_token_mainnet))
        .route("/api/create-token-testnet", post(create_token_testnet))
        .route("/api/xrp-balance", post(xrp_balance))
        .with_state(state)
}

/// Running API server. Dropping the handle leaves the server running;
/// call [`ApiServer::shutdown`] to stop it.
pub struct ApiServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ApiServer {
    /// Bind `addr` (port 0 picks a free port) and serve in the background.
    pub async fn start(addr: SocketAddr, state: ApiState) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let app = issuance_router(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        info!(addr = %local_addr, "issuance http api listening");
        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.task.await??;
        info!(addr = %self.local_addr, "issuance http api stopped");
        Ok(())
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: IssuanceOrchestrator,
    pub auth_token: Option<String>,
}

impl ApiState {
    pub fn new(orchestrator: IssuanceOrchestrator, auth_token: Option<String>) -> Self {
        Self {
            orchestrator,
            auth_token,
        }
    }
}

/// Token amounts arrive as JSON strings or numbers.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum TokenAmount {
    Text(String),
    Number(serde_json::Number),
}

impl TokenAmount {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    #[serde(default, alias = "issuerSecret")]
    pub issuer_seed: Option<String>,
    #[serde(default, alias = "receiverSecret")]
    pub receiver_seed: Option<String>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub token_amount: Option<TokenAmount>,
    #[serde(default)]
    pub network_profile: Option<NetworkProfile>,
}

impl CreateTokenRequest {
    /// Missing fields become empty values and are rejected by the orchestrator.
    pub fn into_request(self, network: NetworkProfile) -> IssuanceRequest {
        IssuanceRequest {
            issuer_secret: Secret::new(self.issuer_seed.unwrap_or_default()),
            receiver_secret: Secret::new(self.receiver_seed.unwrap_or_default()),
            token_symbol: self.token_symbol.unwrap_or_default(),
            token_amount: self
                .token_amount
                .map(TokenAmount::into_text)
                .unwrap_or_default(),
            network,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XrpBalanceRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub network_profile: Option<NetworkProfile>,
}

#[derive(Serialize)]
pub struct XrpBalanceResponse {
    pub address: String,
    /// Balance in XRP.
    pub balance: String,
    pub drops: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<IssuanceError> for ApiError {
    fn from(err: IssuanceError) -> Self {
        let status = match &err {
            _ if err.is_invalid_input() => StatusCode::BAD_REQUEST,
            IssuanceError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            IssuanceError::Connection(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(ErrorResponse {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

type TokenBody = Result<Json<CreateTokenRequest>, JsonRejection>;

async fn create_token(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: TokenBody,
) -> Result<(StatusCode, Json<CreateTokenResponse>), ApiError> {
    require_auth(&headers, &state.auth_token)?;
    let Json(payload) = payload?;
    let network = payload.network_profile.unwrap_or(NetworkProfile::Testnet);
    issue(state, payload, network).await
}

async fn create_token_mainnet(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: TokenBody,
) -> Result<(StatusCode, Json<CreateTokenResponse>), ApiError> {
    require_auth(&headers, &state.auth_token)?;
    let Json(payload) = payload?;
    issue(state, payload, NetworkProfile::Mainnet).await
}

async fn create_token_testnet(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: TokenBody,
) -> Result<(StatusCode, Json<CreateTokenResponse>), ApiError> {
    require_auth(&headers, &state.auth_token)?;
    let Json(payload) = payload?;
    issue(state, payload, NetworkProfile::Testnet).await
}

async fn issue(
    state: ApiState,
    payload: CreateTokenRequest,
    network: NetworkProfile,
) -> Result<(StatusCode, Json<CreateTokenResponse>), ApiError> {
    let result = state.orchestrator.issue(payload.into_request(network)).await;
    let status = StatusCode::from_u16(result.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(result.to_response())))
}

async fn xrp_balance(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<XrpBalanceRequest>, JsonRejection>,
) -> Result<Json<XrpBalanceResponse>, ApiError> {
    require_auth(&headers, &state.auth_token)?;
    let Json(payload) = payload?;
    let network = payload.network_profile.unwrap_or(NetworkProfile::Testnet);
    let address = payload.address.trim().to_string();
    let balance = state
        .orchestrator
        .xrp_balance(network, &address)
        .await?
        .ok_or_else(|| IssuanceError::AccountNotFound(address.clone()))?;
    Ok(Json(XrpBalanceResponse {
        address,
        balance: balance.as_xrp().to_string(),
        drops: balance.0.to_string(),
    }))
}

fn require_auth(headers: &HeaderMap, token: &Option<String>) -> Result<(), ApiError> {
    let Some(expected) = token else {
        return Ok(());
    };
    let direct = headers
        .get("x-auth-token")
        .is_some_and(|value| value == expected);
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|as_str| as_str.strip_prefix("Bearer "))
        .is_some_and(|auth_token| auth_token == expected);
    if direct || bearer {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "missing or invalid api auth token",
        ))
    }
}
