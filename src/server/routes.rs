use std::io;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::{error, warn};

use crate::feed;
use crate::render::{Snapshot, ViewQuery, ViewState};
use crate::server::convert_errors;
use crate::state::State as AppState;
use crate::template::Template;

const NO_STORE: [(header::HeaderName, &str); 1] = [(header::CACHE_CONTROL, "no-store")];

#[derive(Deserialize, Debug, Default)]
pub struct PageParams {
    q: Option<String>,
    sort: Option<String>,
    limit: Option<String>,
}

pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse> {
    convert_errors(async move {
        let snapshot = match feed::load(&state.feed_path).await {
            Ok(feed) => Snapshot::Loaded(feed),

            Err(e) => {
                warn!("{e:#}");
                Snapshot::Failed(format!("{e:#}"))
            }
        };

        let view = ViewState {
            snapshot,
            query: ViewQuery::from_params(
                params.q.as_deref(),
                params.sort.as_deref(),
                params.limit.as_deref(),
            ),
        };
        let html = state
            .template
            .render(Template::Index.as_str(), &view.page())
            .context("could not render the HTML template")?;

        Ok((NO_STORE, Html(html)))
    })
    .await
}

pub async fn latest_json(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let contents = match fs::read(&*state.feed_path).await {
        Ok(contents) => contents,

        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StatusCode::NOT_FOUND.into());
        }

        Err(e) => {
            error!("could not read `{}`: {e}", state.feed_path.display());

            return Err(StatusCode::INTERNAL_SERVER_ERROR.into());
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        contents,
    ))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::feed::fixtures::{feed, item};
    use crate::server::router;
    use crate::state::State as AppState;

    async fn get(state: AppState, uri: &str) -> (u16, Option<String>, String) {
        let response = router(state)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status().as_u16();
        let cache = response
            .headers()
            .get("cache-control")
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, cache, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn state_with_feed(dir: &tempfile::TempDir) -> AppState {
        let mut cfg = Config::default();
        cfg.output = dir.path().join("latest.json");

        let f = feed(vec![
            item("a", "Alpha", Some(100), Some(60)),
            item("b", "Bravo", Some(500), Some(7200)),
            item("c", "Charlie", Some(300), None),
        ]);
        crate::feed::write(&f, &cfg.output).await.unwrap();

        AppState::new(cfg).unwrap()
    }

    #[tokio::test]
    async fn index_applies_the_query() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_feed(&dir).await;

        let position = |html: &str, title: &str| html.find(&format!(">{title}<")).unwrap();

        let (status, cache, html) = get(state.clone(), "/?limit=10&sort=views").await;
        assert_eq!(status, 200);
        assert_eq!(cache.as_deref(), Some("no-store"));
        assert!(position(&html, "Bravo") < position(&html, "Charlie"));
        assert!(position(&html, "Charlie") < position(&html, "Alpha"));

        let (_, _, html) = get(state.clone(), "/?sort=recent").await;
        assert!(position(&html, "Alpha") < position(&html, "Bravo"));
        assert!(position(&html, "Bravo") < position(&html, "Charlie"));

        let (_, _, html) = get(state, "/?q=alp&_=123").await;
        assert!(html.contains("Alpha"));
        assert!(!html.contains("Bravo"));
    }

    #[tokio::test]
    async fn index_reports_a_missing_feed_inline() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.output = dir.path().join("nowhere.json");

        let (status, _, html) = get(AppState::new(cfg).unwrap(), "/").await;

        assert_eq!(status, 200);
        assert!(html.contains("class=\"error\""));
    }

    #[tokio::test]
    async fn serves_the_raw_feed_uncached() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_feed(&dir).await;

        let (status, cache, body) = get(state, "/latest.json").await;
        let parsed = crate::feed::parse(&body).unwrap();

        assert_eq!(status, 200);
        assert_eq!(cache.as_deref(), Some("no-store"));
        assert_eq!(parsed.items.len(), 3);
    }

    #[tokio::test]
    async fn missing_raw_feed_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.output = dir.path().join("nowhere.json");

        let (status, _, _) = get(AppState::new(cfg).unwrap(), "/latest.json").await;

        assert_eq!(status, 404);
    }
}
