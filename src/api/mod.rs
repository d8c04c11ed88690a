use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    Parameters, PercentileRow, SimulationRun, Trajectory, aggregate_percentiles, run_simulation,
};

/// JSON payload accepted by `/api/simulate`. Every field is optional and
/// falls back to the CLI defaults, so the web client only sends what the
/// user actually edited.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    current_age: Option<u32>,
    current_income: Option<f64>,
    savings_to_retirement: Option<f64>,
    savings_to_investment: Option<f64>,
    home_value: Option<f64>,
    home_appreciation_rate: Option<f64>,
    market_return: Option<f64>,
    inflation_rate: Option<f64>,
    retirement_age: Option<u32>,
    retirement_income_percent: Option<f64>,
    simulations: Option<u32>,
    seed: Option<u64>,
    start_year: Option<i32>,
    include_runs: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Monte Carlo retirement wealth projections with Alberta tax deductions"
)]
struct Cli {
    #[arg(long, default_value_t = 35)]
    current_age: u32,
    #[arg(long, default_value_t = 75_000.0, help = "Gross annual income today")]
    current_income: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Share of gross income saved to the retirement account, in percent"
    )]
    savings_to_retirement: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Share of gross income saved to the investment account, in percent"
    )]
    savings_to_investment: f64,
    #[arg(long, default_value_t = 400_000.0)]
    home_value: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Expected annual home appreciation in percent"
    )]
    home_appreciation_rate: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Expected annual market return in percent"
    )]
    market_return: f64,
    #[arg(
        long,
        default_value_t = 2.5,
        help = "Expected annual inflation in percent"
    )]
    inflation_rate: f64,
    #[arg(long, default_value_t = 65)]
    retirement_age: u32,
    #[arg(
        long,
        default_value_t = 70.0,
        help = "Retirement spending as a percent of the final pre-retirement income"
    )]
    retirement_income_percent: f64,
    #[arg(long, default_value_t = 100, help = "Number of Monte Carlo runs")]
    simulations: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(
        long,
        default_value_t = 2025,
        help = "Calendar year corresponding to the current age"
    )]
    start_year: i32,
}

#[derive(Debug)]
struct ApiRequest {
    params: Parameters,
    include_runs: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryStats {
    base_case_at_retirement: f64,
    base_case_at_95: f64,
    median_at_retirement: f64,
    median_at_95: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    current_age: u32,
    retirement_age: u32,
    start_year: i32,
    simulations: u32,
    seed: u64,
    base_case: Trajectory,
    percentiles: Vec<PercentileRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SummaryStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    runs: Option<Vec<Trajectory>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_parameters(cli: Cli) -> Result<Parameters, String> {
    if cli.current_age == 0 || cli.current_age > 95 {
        return Err("--current-age must be between 1 and 95".to_string());
    }

    if cli.retirement_age <= cli.current_age {
        return Err("--retirement-age must be > --current-age".to_string());
    }

    if cli.simulations == 0 {
        return Err("--simulations must be > 0".to_string());
    }

    if !cli.current_income.is_finite() || cli.current_income < 0.0 {
        return Err("--current-income must be >= 0".to_string());
    }

    if cli.home_value < 0.0 {
        return Err("--home-value must be >= 0".to_string());
    }

    for (name, rate) in [
        ("--savings-to-retirement", cli.savings_to_retirement),
        ("--savings-to-investment", cli.savings_to_investment),
    ] {
        if !(0.0..=100.0).contains(&rate) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }

    if !cli.retirement_income_percent.is_finite() || cli.retirement_income_percent < 0.0 {
        return Err("--retirement-income-percent must be >= 0".to_string());
    }

    for (name, rate) in [
        ("--home-appreciation-rate", cli.home_appreciation_rate),
        ("--market-return", cli.market_return),
        ("--inflation-rate", cli.inflation_rate),
    ] {
        if !rate.is_finite() {
            return Err(format!("{name} must be a finite percentage"));
        }
    }

    Ok(Parameters {
        current_age: cli.current_age,
        current_income: cli.current_income,
        savings_to_retirement_pct: cli.savings_to_retirement,
        savings_to_investment_pct: cli.savings_to_investment,
        home_value: cli.home_value,
        home_appreciation_rate_pct: cli.home_appreciation_rate,
        market_return_pct: cli.market_return,
        inflation_rate_pct: cli.inflation_rate,
        retirement_age: cli.retirement_age,
        retirement_income_percent: cli.retirement_income_percent,
        num_simulations: cli.simulations,
        seed: cli.seed,
        start_year: cli.start_year,
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("nestegg HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let run = match run_simulation(&request.params) {
        Ok(run) => run,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let percentiles = match aggregate_percentiles(&run) {
        Ok(rows) => rows,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let response = build_simulate_response(&request.params, run, percentiles, request.include_runs);
    json_response(StatusCode::OK, response)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.current_income {
        cli.current_income = v;
    }
    if let Some(v) = payload.savings_to_retirement {
        cli.savings_to_retirement = v;
    }
    if let Some(v) = payload.savings_to_investment {
        cli.savings_to_investment = v;
    }
    if let Some(v) = payload.home_value {
        cli.home_value = v;
    }
    if let Some(v) = payload.home_appreciation_rate {
        cli.home_appreciation_rate = v;
    }
    if let Some(v) = payload.market_return {
        cli.market_return = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.retirement_income_percent {
        cli.retirement_income_percent = v;
    }
    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = v;
    }
    if let Some(v) = payload.start_year {
        cli.start_year = v;
    }

    let params = build_parameters(cli)?;
    Ok(ApiRequest {
        params,
        include_runs: payload.include_runs.unwrap_or(false),
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 35,
        current_income: 75_000.0,
        savings_to_retirement: 10.0,
        savings_to_investment: 5.0,
        home_value: 400_000.0,
        home_appreciation_rate: 3.0,
        market_return: 7.0,
        inflation_rate: 2.5,
        retirement_age: 65,
        retirement_income_percent: 70.0,
        simulations: 100,
        seed: 42,
        start_year: 2025,
    }
}

fn build_simulate_response(
    params: &Parameters,
    run: SimulationRun,
    percentiles: Vec<PercentileRow>,
    include_runs: bool,
) -> SimulateResponse {
    let retirement_index = (params.retirement_age - params.current_age) as usize;
    let summary = match (percentiles.get(retirement_index), percentiles.last()) {
        (Some(at_retirement), Some(at_95)) => Some(SummaryStats {
            base_case_at_retirement: at_retirement.base_case,
            base_case_at_95: at_95.base_case,
            median_at_retirement: at_retirement.p50,
            median_at_95: at_95.p50,
        }),
        _ => None,
    };

    SimulateResponse {
        current_age: params.current_age,
        retirement_age: params.retirement_age,
        start_year: params.start_year,
        simulations: params.num_simulations,
        seed: params.seed,
        base_case: run.base,
        percentiles,
        summary,
        runs: include_runs.then_some(run.stochastic),
    }
}
