//! Every 404 leaving the server carries the same JSON body, whatever produced it.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const NOT_FOUND_BODY: &str = r#"{"error": "year or page not found"}"#;

/// The canonical not-found response.
pub fn not_found_response() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        Body::from(NOT_FOUND_BODY),
    )
        .into_response()
}

/// Handler for paths that exist only as prefixes (`/api/movies`,
/// `/api/movies/{year}`) and for the router fallback.
pub async fn not_found() -> Response {
    not_found_response()
}

/// Axum middleware that discards the inner body of any 404 and substitutes
/// [`NOT_FOUND_BODY`]. Other responses pass through untouched.
pub async fn normalize_not_found(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response.status() != StatusCode::NOT_FOUND {
        return response;
    }

    let (mut parts, _discarded) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(NOT_FOUND_BODY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn plain_404() -> Response {
        (StatusCode::NOT_FOUND, "404 page not found\n").into_response()
    }

    async fn chatty_404() -> Response {
        let chunks: Vec<Result<&'static str, std::io::Error>> =
            vec![Ok("404 "), Ok("page "), Ok("not "), Ok("found\n")];
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from_stream(futures::stream::iter(chunks)))
            .unwrap()
    }

    async fn ok() -> &'static str {
        "[]"
    }

    fn app() -> Router {
        Router::new()
            .route("/plain", get(plain_404))
            .route("/chatty", get(chatty_404))
            .route("/ok", get(ok))
            .fallback(not_found)
            .layer(middleware::from_fn(normalize_not_found))
    }

    async fn call(uri: &str) -> (StatusCode, Option<String>, String) {
        let res = app()
            .oneshot(http::Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let ct = res
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_owned());
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, ct, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn plain_404_is_rewritten() {
        let (status, ct, body) = call("/plain").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(ct.as_deref(), Some("application/json"));
        assert_eq!(body, NOT_FOUND_BODY);
    }

    #[tokio::test]
    async fn multi_chunk_404_yields_one_body() {
        let (_, _, body) = call("/chatty").await;
        assert_eq!(body, NOT_FOUND_BODY);
    }

    #[tokio::test]
    async fn unmatched_route_gets_canonical_body() {
        let (status, _, body) = call("/nowhere/at/all").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, NOT_FOUND_BODY);
    }

    #[tokio::test]
    async fn other_statuses_pass_through() {
        let (status, _, body) = call("/ok").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[]");
    }
}
