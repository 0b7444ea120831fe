use axum::{body::Body, extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id attached to every request, echoed back in the response
/// headers and recorded on the request's tracing span.
#[derive(Clone, Copy, Debug)]
pub struct RequestId(Uuid);

impl RequestId {
    fn from_headers(request: &Request) -> Self {
        // Honor a caller-supplied id when it parses as a UUID.
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(Self)
            .unwrap_or_else(|| Self(Uuid::new_v4()))
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

pub async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = RequestId::from_headers(&request);
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Span factory for the trace layer. Runs after `assign_request_id`, so the
/// extension is always present except on routes mounted outside it.
pub fn trace_span_for(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.to_string())
        .unwrap_or_default();

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        %request_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    fn request_with(headers: HeaderMap) -> Request {
        let mut request = Request::new(axum::body::Body::empty());
        *request.headers_mut() = headers;
        request
    }

    #[test]
    fn reuses_well_formed_caller_id() {
        let supplied = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, supplied.to_string().parse().unwrap());

        let id = RequestId::from_headers(&request_with(headers));
        assert_eq!(id.to_string(), supplied.to_string());
    }

    #[test]
    fn replaces_malformed_caller_id() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "not-a-uuid".parse().unwrap());

        let id = RequestId::from_headers(&request_with(headers));
        assert!(Uuid::parse_str(&id.to_string()).is_ok());
    }
}
