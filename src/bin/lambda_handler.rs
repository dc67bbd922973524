//! AWS Lambda handler for chain-ladder valuations
//!
//! Accepts a batch of payment records and valuation settings as JSON and
//! returns the reserve estimate. Invalid input and failed valuations come back
//! as 400 with an `{"error": ...}` body.
//!
//! Supports Lambda Function URLs (API Gateway v2 payload) for direct HTTP access.

use aws_lambda_events::apigw::{ApiGatewayV2httpRequest, ApiGatewayV2httpResponse};
use aws_lambda_events::encodings::Body;
use claims_reserving::reserving::DEFAULT_TAIL_FACTOR;
use claims_reserving::{
    Grain, PaymentRecord, Period, ReserveEstimate, ReservingError, ValuationConfig,
    ValuationRunner,
};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Input for one valuation
#[derive(Debug, Deserialize)]
pub struct ValuationRequest {
    /// Payment records to aggregate
    pub records: Vec<PaymentRecord>,

    /// Line of business (default: 1)
    #[serde(default = "default_line_of_business")]
    pub line_of_business: u32,

    /// month, quarter or year (default: year)
    #[serde(default)]
    pub grain: Grain,

    /// Valuation cutoff, e.g. "2021" (year-end) or "2021-06"
    #[serde(deserialize_with = "claims_reserving::period::deserialize_cutoff")]
    pub cutoff: Period,

    /// Development beyond the last observed lag (default: 1.0)
    #[serde(default = "default_tail_factor")]
    pub tail_factor: f64,

    /// Include Mack standard errors
    #[serde(default)]
    pub std_err: bool,
}

fn default_line_of_business() -> u32 { 1 }
fn default_tail_factor() -> f64 { DEFAULT_TAIL_FACTOR }

/// Output from the valuation
#[derive(Debug, Serialize)]
pub struct ValuationResponse {
    pub record_count: usize,
    pub origin_count: usize,
    pub estimate: ReserveEstimate,
    pub execution_time_ms: u64,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
}

fn response(status: i64, body: Option<String>) -> Result<ApiGatewayV2httpResponse, Error> {
    let mut response = ApiGatewayV2httpResponse {
        status_code: status,
        body: body.map(Body::Text),
        ..Default::default()
    };
    response.headers.insert("content-type", "application/json".try_into()?);
    response.headers.insert("access-control-allow-origin", "*".try_into()?);
    response
        .headers
        .insert("access-control-allow-methods", "POST, OPTIONS".try_into()?);
    response
        .headers
        .insert("access-control-allow-headers", "Content-Type".try_into()?);
    Ok(response)
}

fn error_response(message: &str, cause: Option<&ReservingError>) -> Result<ApiGatewayV2httpResponse, Error> {
    let body = ErrorBody {
        error: message,
        kind: cause.map(|e| format!("{:?}", e.kind())),
    };
    response(400, Some(serde_json::to_string(&body)?))
}

/// Lambda handler function
async fn handler(event: LambdaEvent<ApiGatewayV2httpRequest>) -> Result<ApiGatewayV2httpResponse, Error> {
    let start = std::time::Instant::now();
    let request = event.payload;

    // Handle CORS preflight
    if request.request_context.http.method.as_str() == "OPTIONS" {
        return response(200, None);
    }

    if request.is_base64_encoded {
        return error_response("Binary request bodies are not supported", None);
    }
    let body = request.body.as_deref().unwrap_or("{}");

    let request: ValuationRequest = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => return error_response(&format!("Invalid JSON: {}", e), None),
    };

    let mut config = ValuationConfig::new(request.line_of_business, request.grain, request.cutoff)
        .with_tail_factor(request.tail_factor);
    if request.std_err {
        config = config.with_std_err();
    }

    let record_count = request.records.len();
    let runner = ValuationRunner::new(request.records);
    let valuation = match runner.run(&config) {
        Ok(v) => v,
        Err(e) => {
            warn!("Valuation failed: {}", e);
            return error_response(&e.to_string(), Some(&e));
        }
    };

    let result = ValuationResponse {
        record_count,
        origin_count: valuation.triangle.n_origins(),
        estimate: valuation.estimate,
        execution_time_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Valued {} records in {} ms",
        record_count, result.execution_time_ms
    );

    response(200, Some(serde_json::to_string(&result)?))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    run(service_fn(handler)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use lambda_runtime::Context;

    fn event(method: &str, body: Option<&str>) -> LambdaEvent<ApiGatewayV2httpRequest> {
        let mut payload = ApiGatewayV2httpRequest::default();
        payload.request_context.http.method = method.parse().unwrap();
        payload.body = body.map(str::to_string);
        LambdaEvent::new(payload, Context::default())
    }

    fn json_body(response: &ApiGatewayV2httpResponse) -> serde_json::Value {
        match &response.body {
            Some(Body::Text(text)) => serde_json::from_str(text).unwrap(),
            other => panic!("expected a text body, got {:?}", other),
        }
    }

    #[test]
    fn test_request_defaults() {
        let json = r#"{
            "records": [
                {"claim_id": 1, "line_of_business": 1, "origin_period": "2020-01",
                 "event_period": "2020-03", "amount": 100.0}
            ],
            "cutoff": "2021"
        }"#;
        let request: ValuationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.line_of_business, 1);
        assert_eq!(request.grain, Grain::Year);
        assert_eq!(request.cutoff, Period::year_end(2021));
        assert_eq!(request.tail_factor, DEFAULT_TAIL_FACTOR);
        assert!(!request.std_err);
        assert_eq!(request.records.len(), 1);
    }

    #[test]
    fn test_request_rejects_bad_grain() {
        let json = r#"{"records": [], "cutoff": "2021", "grain": "week"}"#;
        assert!(serde_json::from_str::<ValuationRequest>(json).is_err());
    }

    #[tokio::test]
    async fn test_handler_returns_estimate() {
        let body = r#"{
            "records": [
                {"claim_id": 1, "line_of_business": 1, "origin_period": "2019",
                 "event_period": "2019", "amount": 100.0},
                {"claim_id": 1, "line_of_business": 1, "origin_period": "2019",
                 "event_period": "2020", "amount": 20.0},
                {"claim_id": 2, "line_of_business": 1, "origin_period": "2020",
                 "event_period": "2020", "amount": 150.0}
            ],
            "cutoff": "2021"
        }"#;
        let response = handler(event("POST", Some(body))).await.unwrap();

        assert_eq!(response.status_code, 200);
        let json = json_body(&response);
        assert_eq!(json["record_count"], 3);
        assert_eq!(json["origin_count"], 2);
        assert_abs_diff_eq!(json["estimate"]["ibnr_total"].as_f64().unwrap(), 30.0, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_handler_maps_valuation_error_to_400() {
        let body = r#"{
            "records": [
                {"claim_id": 7, "line_of_business": 1, "origin_period": "2020-05",
                 "event_period": "2020-04", "amount": 10.0}
            ],
            "cutoff": "2021"
        }"#;
        let response = handler(event("POST", Some(body))).await.unwrap();

        assert_eq!(response.status_code, 400);
        let json = json_body(&response);
        assert_eq!(json["kind"], "DataIntegrity");
        assert!(json["error"].as_str().unwrap().contains("claim 7"));
    }

    #[tokio::test]
    async fn test_handler_rejects_bad_json_and_binary_bodies() {
        let response = handler(event("POST", Some("not json"))).await.unwrap();
        assert_eq!(response.status_code, 400);
        assert!(json_body(&response)["error"].as_str().unwrap().starts_with("Invalid JSON"));
        assert!(json_body(&response).get("kind").is_none());

        let mut binary = event("POST", Some("e30="));
        binary.payload.is_base64_encoded = true;
        let response = handler(binary).await.unwrap();
        assert_eq!(response.status_code, 400);
    }

    #[tokio::test]
    async fn test_handler_answers_preflight() {
        let response = handler(event("OPTIONS", None)).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert!(response.body.is_none());
        assert_eq!(response.headers["access-control-allow-origin"], "*");
    }
}
