//! API Server Module
//!
//! This module implements a JSON-RPC server for the bridge participants:
//! - users submit and cancel transfers
//! - relayers query fees and outstanding batches
//! - the oracle reports executions and observed heights
//!
//! Every mutating call runs as one transition on the shared chain state.

use crate::{
    config::ApiConfig,
    error::BatchError,
    registry::Registry,
    state::{ChainState, Committed},
    types::Erc20Token,
};
use axum::{extract::State, routing::post, Json, Router};
use ethers::types::{Address, U256};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

/// Shared application state that is accessible across all request handlers
#[derive(Clone)]
pub struct AppState {
    chain: ChainState,
    registry: Option<Registry>,
}

/// The main API server struct
pub struct Server {
    config: ApiConfig,
    state: AppState,
}

impl Server {
    /// Creates a new API server instance
    ///
    /// # Arguments
    /// * `config` - Listen address
    /// * `chain` - Shared chain state
    /// * `registry` - Where notifications emitted by API calls are recorded
    pub fn new(config: ApiConfig, chain: ChainState, registry: Option<Registry>) -> Self {
        Self {
            config,
            state: AppState { chain, registry },
        }
    }

    /// Router with a single POST endpoint at "/"
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(handle_rpc))
            .with_state(self.state.clone())
    }

    /// Starts the API server and begins listening for incoming requests
    pub async fn start(self) -> anyhow::Result<()> {
        let app = self.router();

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// JSON-RPC 2.0 request structure
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

/// JSON-RPC 2.0 response structure
///
/// Either `result` or `error` is populated, never both.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// JSON-RPC error object
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;
const REJECTED: i32 = -32000;

impl JsonRpcError {
    fn invalid_params(e: impl std::fmt::Display) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: format!("Invalid params: {}", e),
        }
    }

    fn internal(e: impl std::fmt::Display) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: e.to_string(),
        }
    }
}

impl From<BatchError> for JsonRpcError {
    fn from(e: BatchError) -> Self {
        if e.is_invariant_violation() {
            error!("Invariant violation: {}", e);
            Self::internal(e)
        } else {
            Self {
                code: REJECTED,
                message: e.to_string(),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendToForeignParams {
    sender: String,
    foreign_recipient: Address,
    amount: Erc20Token,
    fee: Erc20Token,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelSendToForeignParams {
    id: u64,
    sender: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenParams {
    token_contract: Option<Address>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchParams {
    token_contract: Address,
    nonce: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObserveHeightsParams {
    foreign_height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlashCandidatesParams {
    max_height: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchFees {
    token_contract: Address,
    fees: U256,
}

/// Main RPC request handler
async fn handle_rpc(State(state): State<AppState>, Json(request): Json<JsonRpcRequest>) -> Json<JsonRpcResponse> {
    info!("Received RPC request: {}", request.method);

    let outcome = dispatch(&state, &request.method, request.params).await;
    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(e) => {
            warn!("RPC {} failed: {}", request.method, e.message);
            (None, Some(e))
        }
    };

    Json(JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        result,
        error,
        id: request.id,
    })
}

async fn dispatch(state: &AppState, method: &str, params: Value) -> Result<Value, JsonRpcError> {
    let chain = &state.chain;
    match method {
        "sendToForeign" => {
            let p: SendToForeignParams = parse(params)?;
            let committed = chain
                .transition(|_, ctx| {
                    crate::pool::UnbatchedPool::add_transfer(ctx, p.sender, p.foreign_recipient, p.amount, p.fee)
                })
                .await?;
            state.record(&committed).await;
            to_value(&committed.value)
        }
        "cancelSendToForeign" => {
            let p: CancelSendToForeignParams = parse(params)?;
            let committed = chain
                .transition(|_, ctx| crate::pool::UnbatchedPool::cancel_transfer(ctx, p.id, &p.sender))
                .await?;
            state.record(&committed).await;
            to_value(&committed.value)
        }
        "batchFees" => {
            let p: TokenParams = parse_or_default(params)?;
            let fees = chain
                .query(|keeper, store, _| match p.token_contract {
                    Some(token) => keeper.batch_fees(store, token).map(|fees| vec![(token, fees)]),
                    None => keeper.all_batch_fees(store),
                })
                .await?;
            let fees: Vec<BatchFees> = fees
                .into_iter()
                .map(|(token_contract, fees)| BatchFees { token_contract, fees })
                .collect();
            to_value(&fees)
        }
        "currentBatch" => {
            let p: TokenParams = parse(params)?;
            let token = p
                .token_contract
                .ok_or_else(|| JsonRpcError::invalid_params("missing tokenContract"))?;
            let batch = chain
                .query(|keeper, store, _| keeper.lifecycle().get_current_batch(store, token))
                .await?;
            to_value(&batch)
        }
        "outstandingBatches" => {
            let batches = chain
                .query(|keeper, store, _| keeper.lifecycle().outstanding_batches(store))
                .await?;
            to_value(&batches)
        }
        "batchExecuted" => {
            let p: BatchParams = parse(params)?;
            let committed = chain
                .transition(|keeper, ctx| keeper.lifecycle().execute_batch(ctx, p.token_contract, p.nonce))
                .await?;
            state.record(&committed).await;
            to_value(&committed.value)
        }
        "cancelBatch" => {
            let p: BatchParams = parse(params)?;
            let committed = chain
                .transition(|keeper, ctx| keeper.lifecycle().cancel_batch(ctx, p.token_contract, p.nonce))
                .await?;
            state.record(&committed).await;
            to_value(&committed.value)
        }
        "observeHeights" => {
            let p: ObserveHeightsParams = parse(params)?;
            let heights = chain
                .transition(|keeper, ctx| {
                    keeper.set_observed_heights(ctx, p.foreign_height);
                    crate::batch::timeout::get_observed_heights(ctx.store())
                })
                .await?
                .value;
            to_value(&heights)
        }
        "slashCandidates" => {
            let p: SlashCandidatesParams = parse(params)?;
            let batches = chain
                .query(|keeper, store, _| keeper.lifecycle().get_slash_candidates(store, p.max_height))
                .await?;
            to_value(&batches)
        }
        "lastBatchNonce" => {
            let nonce = chain
                .query(|_, store, _| crate::batch::NonceAllocator::last_nonce(store))
                .await?;
            Ok(json!(nonce))
        }
        _ => Err(JsonRpcError {
            code: METHOD_NOT_FOUND,
            message: "Method not found".to_string(),
        }),
    }
}

impl AppState {
    async fn record<T>(&self, committed: &Committed<T>) {
        if committed.events.is_empty() {
            return;
        }
        if let Some(registry) = &self.registry {
            if let Err(e) = registry.store(committed.height, &committed.events).await {
                warn!("Failed to record batch events: {:?}", e);
            }
        }
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params).map_err(JsonRpcError::invalid_params)
}

fn parse_or_default<T: DeserializeOwned + Default>(params: Value) -> Result<T, JsonRpcError> {
    if params.is_null() {
        return Ok(T::default());
    }
    parse(params)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(JsonRpcError::internal)
}
