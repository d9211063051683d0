//! Cross-origin access for exchange endpoints.
//! 交换端点的跨域访问支持。

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};

use crate::Result;

const ALLOW_METHOD: HeaderName = HeaderName::from_static("access-control-allow-method");

/// Wrap `router` to accept CORS requests from `origin`.
///
/// Preflight `OPTIONS` requests are answered directly with `OK`; every other
/// request is passed through and `access-control-allow-origin` is set on the
/// response unless the inner handler already set it.
pub fn cors<S>(origin: &str, router: Router<S>) -> Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let origin = HeaderValue::from_str(origin)?;
    Ok(router.layer(middleware::from_fn_with_state(origin, allow_origin)))
}

async fn allow_origin(State(origin): State<HeaderValue>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = "OK".into_response();
        let headers = response.headers_mut();
        headers.append(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.append(ALLOW_METHOD, HeaderValue::from_static("POST"));
        headers.append(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("content-type"),
        );
        return response;
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .or_insert(origin);
    response
}
