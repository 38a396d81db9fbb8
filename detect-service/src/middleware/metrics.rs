use crate::services::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION};
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), path.as_str(), status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method.as_str(), path.as_str()])
        .observe(duration.as_secs_f64());

    response
}
