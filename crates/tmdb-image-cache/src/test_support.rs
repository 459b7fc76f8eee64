//! Local stand-in for the TMDB image origin

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const BIG_BODY_LEN: usize = 64 * 1024;

/// Body served for an ordinary image request
pub fn body_for(size: &str, path: &str) -> Vec<u8> {
    format!("image:{size}/{path}").into_bytes()
}

#[derive(Clone, Default)]
struct OriginState {
    hits: Arc<AtomicUsize>,
}

/// Origin server on an ephemeral port.
///
/// Path prefixes pick the behavior: `missing*` is a 404, `error.jpg` a 500,
/// `empty.jpg` a 204, `blank.jpg` a 200 with no body,
/// `big.jpg` a large body with a content length, `stream-big.jpg` a large
/// chunked body, `truncated.jpg` a body that dies mid-stream and `slow*` waits
/// before answering.
pub struct TestOrigin {
    pub base_url: String,
    state: OriginState,
}

impl TestOrigin {
    pub async fn start() -> Self {
        let state = OriginState::default();
        let router = Router::new()
            .route("/t/p/{size}/{*path}", get(serve_image))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/t/p"),
            state,
        }
    }

    /// Requests received so far
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

/// Base URL of a port nothing listens on
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/t/p")
}

async fn serve_image(
    State(state): State<OriginState>,
    Path((size, path)): Path<(String, String)>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    if path.starts_with("slow") {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    match path.as_str() {
        p if p.starts_with("missing") => StatusCode::NOT_FOUND.into_response(),
        "error.jpg" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "empty.jpg" => StatusCode::NO_CONTENT.into_response(),
        "blank.jpg" => Vec::<u8>::new().into_response(),
        "big.jpg" => vec![7u8; BIG_BODY_LEN].into_response(),
        "stream-big.jpg" => {
            let chunks = (0..8).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![1u8; 32 * 1024])));
            Body::from_stream(futures::stream::iter(chunks)).into_response()
        }
        "truncated.jpg" => {
            let chunks = vec![
                Ok(Bytes::from_static(b"partial")),
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "origin went away",
                )),
            ];
            Body::from_stream(futures::stream::iter(chunks)).into_response()
        }
        _ => body_for(&size, &path).into_response(),
    }
}
