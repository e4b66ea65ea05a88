// Sales KPI - API Server
// JSON API over the clean dataset; KPIs recomputed per request with the caller's filter

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use sales_kpi::logging::init_logging;
use sales_kpi::{
    category_breakdown, compute_kpis, daily_totals, latest_transactions, payment_breakdown,
    summarize, CategoryBreakdown, CleaningReport, Config, DailyTotal, KpiFilter,
    PaymentBreakdown, Pipeline, SchemaIncomplete, Transaction,
};

/// Clean dataset, read-only for the lifetime of the server
struct Dataset {
    transactions: Vec<Transaction>,
    report: CleaningReport,
    schema_warning: Option<SchemaIncomplete>,
    categories: Vec<String>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    data: Arc<Dataset>,
    latest_limit: usize,
}

/// API Response wrapper
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message.into()),
        }
    }
}

type ApiError = (StatusCode, Json<ApiResponse<()>>);

/// Query string shared by the filtered endpoints
#[derive(Debug, Default, Deserialize)]
struct FilterParams {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    category: Option<String>,
    limit: Option<usize>,
}

/// Malformed query strings (bad dates, non-numeric limit) answer 400 in the usual envelope
fn filter_params(
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<FilterParams, ApiError> {
    params.map(|Query(params)| params).map_err(|rejection| {
        let message = rejection.body_text();
        warn!(error = %message, "rejected query string");
        (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message)))
    })
}

impl FilterParams {
    fn to_filter(&self) -> KpiFilter {
        KpiFilter {
            start: self.start,
            end: self.end,
            category: self.category.clone(),
        }
    }
}

#[derive(Serialize)]
struct ReportResponse {
    report: CleaningReport,
    schema_warning: Option<SchemaIncomplete>,
}

#[derive(Serialize)]
struct BreakdownResponse {
    daily: Vec<DailyTotal>,
    categories: Vec<CategoryBreakdown>,
    payment_methods: Vec<PaymentBreakdown>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/kpis?start&end&category
async fn get_kpis(
    State(state): State<AppState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let params = filter_params(params)?;
    let filtered = params.to_filter().apply(&state.data.transactions);
    Ok(Json(ApiResponse::ok(compute_kpis(&filtered))))
}

/// GET /api/report - Cleaning report of the startup run
async fn get_report(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(ReportResponse {
        report: state.data.report.clone(),
        schema_warning: state.data.schema_warning.clone(),
    }))
}

/// GET /api/summary - Descriptive statistics over the whole dataset
async fn get_summary(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(summarize(&state.data.transactions)))
}

/// GET /api/categories - Values for the category filter, "ALL" first
async fn get_categories(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.data.categories.clone()))
}

/// GET /api/breakdowns?start&end&category
async fn get_breakdowns(
    State(state): State<AppState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let params = filter_params(params)?;
    let filtered = params.to_filter().apply(&state.data.transactions);
    Ok(Json(ApiResponse::ok(BreakdownResponse {
        daily: daily_totals(&filtered),
        categories: category_breakdown(&filtered),
        payment_methods: payment_breakdown(&filtered),
    })))
}

/// GET /api/transactions?start&end&category&limit - Most recent first
async fn get_transactions(
    State(state): State<AppState>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let params = filter_params(params)?;
    let filtered = params.to_filter().apply(&state.data.transactions);
    let limit = params.limit.unwrap_or(state.latest_limit);
    Ok(Json(ApiResponse::ok(latest_transactions(&filtered, limit))))
}

fn category_options(transactions: &[Transaction]) -> Vec<String> {
    let mut categories: Vec<String> = transactions
        .iter()
        .filter_map(|t| t.category.clone())
        .collect();
    categories.sort();
    categories.dedup();
    categories.insert(0, sales_kpi::kpi::ALL_CATEGORIES.to_string());
    categories
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&config.log_filter);

    println!("🌐 Sales KPI - API Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // The listener is only bound once the data is clean
    let output = match Pipeline::from_config(&config).run() {
        Ok(output) => output,
        Err(e) => {
            error!(error = %e, "pipeline failed at startup");
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    println!("✓ {}", output.report.summary());

    let dataset = Dataset {
        categories: category_options(&output.transactions),
        transactions: output.transactions,
        report: output.report,
        schema_warning: output.schema_warning,
    };

    let state = AppState {
        data: Arc::new(dataset),
        latest_limit: config.server.latest_limit,
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/kpis", get(get_kpis))
        .route("/report", get(get_report))
        .route("/summary", get(get_summary))
        .route("/categories", get(get_categories))
        .route("/breakdowns", get(get_breakdowns))
        .route("/transactions", get(get_transactions))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = config.bind_address();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("❌ Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!(%addr, "listening");
    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/kpis", addr);
    println!("\n   Press Ctrl+C to stop\n");

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("❌ Server error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;

    fn parse(uri: &str) -> Result<FilterParams, ApiError> {
        let uri: Uri = uri.parse().unwrap();
        filter_params(Query::try_from_uri(&uri))
    }

    #[test]
    fn test_valid_query_string() {
        let params = parse("/api/kpis?start=2024-01-01&category=Books&limit=5").unwrap();
        assert_eq!(params.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(params.category.as_deref(), Some("Books"));
        assert_eq!(params.limit, Some(5));
    }

    #[test]
    fn test_malformed_query_string_is_error_envelope() {
        let (status, Json(body)) = parse("/api/kpis?start=01-2024").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
        assert!(body.error.is_some());

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().is_some());
    }
}
