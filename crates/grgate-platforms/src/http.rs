//! Shared HTTP plumbing for the platform clients.

use grgate_core::{PlatformError, PlatformResult};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

/// Items requested per page on list endpoints.
pub(crate) const PER_PAGE: usize = 100;

pub(crate) fn client() -> PlatformResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("grgate/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| PlatformError::Request(e.to_string()))
}

/// Send a request and turn non-success responses into errors.
/// `what` describes the call for error messages.
pub(crate) async fn send(builder: RequestBuilder, what: &str) -> PlatformResult<Response> {
    let response = builder
        .send()
        .await
        .map_err(|e| PlatformError::Request(format!("{}: {}", what, e)))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(PlatformError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(PlatformError::Api {
            status: status.as_u16(),
            message: format!("{}: {}", what, text),
        });
    }

    Ok(response)
}

pub(crate) async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> PlatformResult<T> {
    response
        .json()
        .await
        .map_err(|e| PlatformError::Parse(format!("{}: {}", what, e)))
}

/// Percent-encode each segment of a repository file path.
pub(crate) fn encode_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::Router;

    /// Serve `router` on an ephemeral local port and return its base URL.
    pub(crate) async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }
}
