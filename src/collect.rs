use std::collections::HashSet;

use anyhow::{anyhow, bail, Context, Result};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, info_span, Instrument};

use crate::api::{SearchQuery, VideoApi};

#[derive(Debug, Clone)]
pub struct CollectParams {
    /// Search terms in priority order.
    pub queries: Vec<String>,
    pub lookback: time::Duration,
    pub per_query: u32,
    pub target: usize,
    pub region: String,
}

/// Accumulates unique IDs in discovery order.
#[derive(Debug, Default)]
struct Candidates {
    seen: HashSet<String>,
    ids: Vec<String>,
}

impl Candidates {
    /// Adds unseen IDs until `target` is reached. Returns how many were new.
    fn extend(&mut self, ids: Vec<String>, target: usize) -> usize {
        let before = self.ids.len();

        for id in ids {
            if self.ids.len() >= target {
                break;
            }

            if self.seen.insert(id.clone()) {
                self.ids.push(id);
            }
        }

        self.ids.len() - before
    }
}

/// Runs the configured searches and returns at most `params.target` unique video IDs.
///
/// Any failed search aborts collection. An empty result is an error as well.
pub async fn collect_candidates(
    api: &dyn VideoApi,
    params: &CollectParams,
    now: OffsetDateTime,
) -> Result<Vec<String>> {
    let published_after = (now - params.lookback)
        .format(&Rfc3339)
        .context("could not format the start of the lookback window")?;
    let search = |q: Option<String>| SearchQuery {
        q,
        published_after: published_after.clone(),
        max_results: params.per_query,
        region: params.region.clone(),
    };

    let mut candidates = Candidates::default();

    for q in &params.queries {
        if candidates.ids.len() >= params.target {
            break;
        }

        let ids = api
            .search(&search(Some(q.clone())))
            .instrument(info_span!("search", %q))
            .await
            .with_context(|| anyhow!("the search for `{q}` failed"))?;
        let found = ids.len();
        let added = candidates.extend(ids, params.target);
        debug!(%q, found, added, total = candidates.ids.len(), "Search done");
    }

    if candidates.ids.len() < params.target {
        info!(
            "Only {} of {} candidates after all queries; running an unscoped search",
            candidates.ids.len(),
            params.target
        );

        let ids = api
            .search(&search(None))
            .instrument(info_span!("search", q = "<unscoped>"))
            .await
            .context("the unscoped fallback search failed")?;
        candidates.extend(ids, params.target);
    }

    if candidates.ids.is_empty() {
        bail!("no candidate videos were found");
    }

    info!("Collected {} candidate videos", candidates.ids.len());

    Ok(candidates.ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;

    fn params(queries: &[&str], target: usize) -> CollectParams {
        CollectParams {
            queries: queries.iter().map(|q| q.to_string()).collect(),
            lookback: time::Duration::hours(24),
            per_query: 50,
            target,
            region: "JP".into(),
        }
    }

    fn now() -> OffsetDateTime {
        time::macros::datetime!(2026-10-19 12:00 UTC)
    }

    #[tokio::test]
    async fn deduplicates_across_queries_in_priority_order() {
        let api = FakeApi::default()
            .with_page(Some("a"), &["1", "2", "3"])
            .with_page(Some("b"), &["3", "4", "1"])
            .with_page(None, &["5"]);

        let ids = collect_candidates(&api, &params(&["a", "b"], 4), now())
            .await
            .unwrap();

        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(api.searched(), vec![Some("a".to_string()), Some("b".to_string())]);
    }

    #[tokio::test]
    async fn stops_at_the_target_mid_page() {
        let api = FakeApi::default()
            .with_page(Some("a"), &["1", "2", "3", "4", "5"])
            .with_page(Some("b"), &["6"]);

        let ids = collect_candidates(&api, &params(&["a", "b"], 3), now())
            .await
            .unwrap();

        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(api.searched(), vec![Some("a".to_string())]);
    }

    #[tokio::test]
    async fn falls_back_to_an_unscoped_search() {
        let api = FakeApi::default()
            .with_page(Some("a"), &["1"])
            .with_page(None, &["1", "9", "8"]);

        let ids = collect_candidates(&api, &params(&["a"], 10), now())
            .await
            .unwrap();

        assert_eq!(ids, vec!["1", "9", "8"]);
        assert_eq!(api.searched(), vec![Some("a".to_string()), None]);
    }

    #[tokio::test]
    async fn passes_the_lookback_window_and_caps() {
        let api = FakeApi::default().with_page(Some("a"), &["1"]);
        let mut p = params(&["a"], 1);
        p.per_query = 7;

        collect_candidates(&api, &p, now()).await.unwrap();
        let searches = api.searches.lock().unwrap();

        assert_eq!(searches[0].published_after, "2026-10-18T12:00:00Z");
        assert_eq!(searches[0].max_results, 7);
        assert_eq!(searches[0].region, "JP");
    }

    #[tokio::test]
    async fn nothing_found_is_fatal() {
        let api = FakeApi::default();

        let err = collect_candidates(&api, &params(&["a"], 5), now())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no candidate videos"));
    }

    #[tokio::test]
    async fn a_failed_search_aborts() {
        let mut api = FakeApi::default().with_page(Some("a"), &["1"]);
        api.failing_query = Some("b".into());

        let err = collect_candidates(&api, &params(&["a", "b"], 5), now())
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("quota exceeded"));
    }

    #[test]
    fn never_exceeds_the_target() {
        let mut c = Candidates::default();

        for round in 0..5 {
            c.extend((0..20).map(|i| format!("{}", i * round)).collect(), 12);
            assert!(c.ids.len() <= 12);
        }

        let unique: HashSet<_> = c.ids.iter().collect();
        assert_eq!(unique.len(), c.ids.len());
    }
}
