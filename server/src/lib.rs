use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use suggest_core::normalize::{equal_shaped_normalize, normalize};
use suggest_core::{get_suggestions, PagingParams, SuggestData, SuggestResponse};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub data: Arc<SuggestData>,
    pub equal_shaped: bool,
}

/// Decoded `/suggest` query. `class` and `exclude-class` are repeatable,
/// so the raw pair list is walked instead of a serde struct.
#[derive(Debug)]
pub struct SuggestParams {
    pub part: String,
    pub classes: Vec<String>,
    pub exclude_classes: Vec<String>,
    pub count: usize,
    pub page: Option<usize>,
    pub api_version: u64,
}

impl Default for SuggestParams {
    fn default() -> Self {
        SuggestParams {
            part: String::new(),
            classes: Vec::new(),
            exclude_classes: Vec::new(),
            count: 0,
            page: None,
            api_version: 1,
        }
    }
}

impl SuggestParams {
    /// Unknown keys are ignored and malformed numbers fall back to their
    /// defaults; only an explicitly negative `count` or `page` is refused.
    pub fn parse(pairs: &[(String, String)]) -> Result<SuggestParams, String> {
        let mut params = SuggestParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "part" => params.part = value.clone(),
                "class" => push_class(&mut params.classes, value),
                "exclude-class" => push_class(&mut params.exclude_classes, value),
                "count" => params.count = parse_index(value, "count")?,
                "page" => params.page = Some(parse_index(value, "page")?),
                "api-version" => params.api_version = value.parse().unwrap_or(1),
                _ => {}
            }
        }
        Ok(params)
    }
}

fn push_class(classes: &mut Vec<String>, value: &str) {
    if !value.is_empty() {
        classes.push(value.to_lowercase());
    }
}

fn parse_index(value: &str, name: &str) -> Result<usize, String> {
    match value.parse::<i64>() {
        Ok(n) if n < 0 => Err(format!("{name} must not be negative")),
        Ok(n) => Ok(n as usize),
        Err(_) => Ok(0),
    }
}

pub fn build_app(data: SuggestData, equal_shaped: bool) -> Router {
    let state = AppState {
        data: Arc::new(data),
        equal_shaped,
    };
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/suggest", get(suggest_handler))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> &'static str {
    "OK"
}

pub async fn suggest_handler(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let params = match SuggestParams::parse(&pairs) {
        Ok(params) => params,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    let normalized = if state.equal_shaped {
        equal_shaped_normalize(&params.part)
    } else {
        normalize(&params.part)
    };
    let mut suggestions = get_suggestions(
        &state.data,
        &params.part,
        &normalized,
        &params.classes,
        &params.exclude_classes,
    );

    let headers = answer_headers(state.data.version, params.api_version);
    if let Some(page) = params.page {
        let paginated = PagingParams {
            count: params.count,
            page,
        }
        .apply(suggestions);
        return (headers, Json(paginated)).into_response();
    }

    if params.count != 0 && suggestions.len() > params.count {
        suggestions.truncate(params.count);
    }
    if params.api_version >= 2 {
        (headers, Json(SuggestResponse { suggestions })).into_response()
    } else {
        // version 1 answered with the bare array; kept for old clients
        (headers, Json(suggestions)).into_response()
    }
}

fn answer_headers(version: u64, api_version: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Suggest-Version", HeaderValue::from(version));
    headers.insert("Api-Version", HeaderValue::from(api_version));
    headers
}

fn cors_layer() -> CorsLayer {
    let permissive = || {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };
    let Ok(configured) = std::env::var("CORS_ALLOW_ORIGIN") else {
        return permissive();
    };
    let origins: Vec<_> = configured
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();
    if origins.is_empty() {
        permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
