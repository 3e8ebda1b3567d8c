pub mod client;
pub mod config;

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use suggest_core::{PaginatedResponse, PagingParams, SuggestResponse};
use tokio::task::JoinSet;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use url::Url;

use crate::client::{ShardAnswer, SuggestClient};
use crate::config::Config;

#[derive(Clone)]
struct MergerState {
    client: SuggestClient,
    shard_urls: Arc<Vec<Url>>,
}

pub fn build_app(config: &Config) -> Result<Router> {
    let state = MergerState {
        client: SuggestClient::new()?,
        shard_urls: Arc::new(config.parsed_urls()?),
    };
    Ok(Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/suggest", get(merger_suggest_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http()))
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn merger_suggest_handler(
    State(state): State<MergerState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let paging = match PagingRequest::parse(&pairs) {
        Ok(paging) => paging,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };
    let answers = query_shards(&state, &pairs).await;
    let winner = arbitrate(&answers);
    match paging.page {
        Some(page) => {
            // the shards paginate themselves, so the winner's page
            // metadata can be relayed as-is
            let body = match winner {
                Some(answer) => PaginatedResponse {
                    suggestions: answer.payload.suggestions.clone(),
                    page_number: answer.payload.page_number,
                    total_pages_count: answer.payload.total_pages_count,
                    total_items_count: answer.payload.total_items_count,
                },
                None => PagingParams {
                    count: paging.count,
                    page,
                }
                .apply(Vec::new()),
            };
            Json(body).into_response()
        }
        None => {
            let body = match winner {
                Some(answer) => SuggestResponse {
                    suggestions: answer.payload.suggestions.clone(),
                },
                None => SuggestResponse::default(),
            };
            Json(body).into_response()
        }
    }
}

/// Queries every shard concurrently. A shard that cannot be reached or
/// answers garbage leaves its slot empty instead of failing the request.
async fn query_shards(state: &MergerState, pairs: &[(String, String)]) -> Vec<Option<ShardAnswer>> {
    let mut tasks = JoinSet::new();
    for (slot, shard_url) in state.shard_urls.iter().enumerate() {
        let url = shard_request_url(shard_url, pairs);
        let client = state.client.clone();
        tasks.spawn(async move { (slot, client.get_suggest(&url).await) });
    }
    let mut answers: Vec<Option<ShardAnswer>> = Vec::new();
    answers.resize_with(state.shard_urls.len(), || None);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slot, Ok(answer))) => answers[slot] = Some(answer),
            Ok((slot, Err(error))) => warn!(slot, "shard request failed: {error:#}"),
            Err(error) => warn!("shard task failed: {error}"),
        }
    }
    answers
}

/// Builds the request url for one shard: the client's query is forwarded
/// as-is, except that `api-version` is pinned to 2 so every shard answers
/// the same shape.
fn shard_request_url(shard_url: &Url, pairs: &[(String, String)]) -> Url {
    let mut url = shard_url.clone();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (key, value) in pairs {
            if key != "api-version" {
                query.append_pair(key, value);
            }
        }
        query.append_pair("api-version", "2");
    }
    url
}

/// Picks the answer to serve: the freshest index version among the shards
/// that actually found something. Empty answers never win, so a stale
/// shard with results beats a fresh shard without any.
fn arbitrate(answers: &[Option<ShardAnswer>]) -> Option<&ShardAnswer> {
    let mut winner: Option<&ShardAnswer> = None;
    for answer in answers.iter().flatten() {
        if answer.payload.suggestions.is_empty() {
            continue;
        }
        match winner {
            Some(current) if answer.version <= current.version => {}
            _ => winner = Some(answer),
        }
    }
    winner
}

/// Pagination subset of the client's query. The merger parses only these
/// two parameters; everything else is the shards' business.
#[derive(Debug, Default)]
struct PagingRequest {
    count: usize,
    page: Option<usize>,
}

impl PagingRequest {
    fn parse(pairs: &[(String, String)]) -> Result<PagingRequest, String> {
        let mut request = PagingRequest::default();
        for (key, value) in pairs {
            match key.as_str() {
                "count" => request.count = parse_index(value, "count")?,
                "page" => request.page = Some(parse_index(value, "page")?),
                _ => {}
            }
        }
        Ok(request)
    }
}

/// Malformed numbers fall back to 0; negative ones are a client error.
fn parse_index(value: &str, name: &str) -> Result<usize, String> {
    match value.parse::<i64>() {
        Ok(number) if number < 0 => Err(format!("{name} must not be negative")),
        Ok(number) => Ok(number as usize),
        Err(_) => Ok(0),
    }
}
