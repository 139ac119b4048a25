//! Reserved `/__apimock/*` endpoints: the served document, its viewer, health.

use std::path::Path;

use bytes::Bytes;
use hyper::StatusCode;
use scalar_api_reference::scalar_html_default;

use apimock_spec::Document;

use crate::server::{body_response, handler, json_response, Dispatcher, RouteRequest};

pub const OPENAPI_PATH: &str = "/__apimock/openapi.json";
pub const DOCS_PATH: &str = "/__apimock/docs";
pub const ASSETS_PREFIX: &str = "/__apimock/docs/assets";
pub const HEALTH_PATH: &str = "/__apimock/health";

/// Register the reserved endpoints.
///
/// `routes` is the number of document operations being served.
pub fn register(
    dispatcher: &mut Dispatcher,
    document: &Document,
    routes: usize,
    assets_dir: Option<&Path>,
) {
    let openapi = Bytes::from(document.as_value().to_string());
    let viewer = Bytes::from(viewer_page(document.title()));
    let health = Bytes::from(
        serde_json::json!({
            "status": "healthy",
            "routes": routes,
        })
        .to_string(),
    );

    let reserved = [
        (
            OPENAPI_PATH,
            handler(move |_req: RouteRequest| {
                let body = openapi.clone();
                async move { Ok(json_response(StatusCode::OK, body)) }
            }),
        ),
        (
            DOCS_PATH,
            handler(move |_req: RouteRequest| {
                let body = viewer.clone();
                async move {
                    Ok(body_response(
                        StatusCode::OK,
                        "text/html; charset=utf-8",
                        body,
                    ))
                }
            }),
        ),
        (
            HEALTH_PATH,
            handler(move |_req: RouteRequest| {
                let body = health.clone();
                async move { Ok(json_response(StatusCode::OK, body)) }
            }),
        ),
    ];

    for (path, endpoint) in reserved {
        if dispatcher.route("GET", path, endpoint).is_some() {
            tracing::warn!(path, "document operation shadowed by reserved endpoint");
        }
    }

    if let Some(dir) = assets_dir {
        if dispatcher.mount_static(ASSETS_PREFIX, dir).is_some() {
            tracing::warn!(path = ASSETS_PREFIX, "document operation shadowed by asset mount");
        }
        tracing::debug!(dir = %dir.display(), prefix = ASSETS_PREFIX, "serving documentation assets");
    }
}

/// The Scalar viewer, pointed at the JSON document endpoint.
fn viewer_page(title: Option<&str>) -> String {
    let config = serde_json::json!({
        "spec": {
            "url": OPENAPI_PATH
        },
        "metaData": {
            "title": title.unwrap_or("API mock")
        },
        "hideDownloadButton": false
    });

    scalar_html_default(&config)
}
