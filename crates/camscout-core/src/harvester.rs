//! Paginated harvest of per-camera HLS sources from the camera-views listing.

use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::config::ViewsQueryConfig;
use crate::error::AppError;
use crate::graphql::{
    GraphQlPayload, GraphQlRequest, ensure_no_errors, ensure_no_query_error, query_result,
};
use crate::models::{Endpoint, HLS_MIME_TYPE, MediaSource, Region, SourceMap};
use crate::report::{CrawlEvent, CrawlReporter};
use crate::retry::ResilientClient;
use crate::traits::Transport;
use crate::util::{ensure_not_cancelled, sleep_or_cancel};

const VIEWS_QUERY: &str = r#"
query ($input: ListArgs!) {
  listCameraViewsQuery(input: $input) {
    cameraViews {
      category
      sources { type src }
      parentCollection { uri title }
      lastUpdated { timestamp timezone }
    }
    totalRecords
    error { message type }
  }
}
"#;

const VIEWS_FIELD: &str = "listCameraViewsQuery";

/// One row of the views listing, reduced to what the harvest needs.
///
/// Rows are read field by field: a value of the wrong type is treated as
/// absent instead of failing the whole page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraView {
    pub parent_uri: Option<String>,
    /// `(type, src)` pairs whose fields are both strings.
    pub sources: Vec<(String, String)>,
}

impl CameraView {
    pub fn from_value(row: &Value) -> Self {
        let parent_uri = row
            .get("parentCollection")
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let sources = row
            .get("sources")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|s| {
                        let media_type = s.get("type")?.as_str()?;
                        let src = s.get("src")?.as_str()?;
                        Some((media_type.to_string(), src.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            parent_uri,
            sources,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewsResult {
    camera_views: Option<Vec<Value>>,
    total_records: Option<u64>,
}

/// A single page of the listing.
#[derive(Debug, Clone)]
pub struct ViewsPage {
    pub records: Vec<CameraView>,
    pub offset: u64,
    pub total_records: Option<u64>,
}

/// Walks the views listing end to end, collecting HLS sources per camera.
pub struct ViewHarvester<T> {
    client: ResilientClient<T>,
    endpoint: Endpoint,
    region: Region,
    config: ViewsQueryConfig,
}

impl<T: Transport> ViewHarvester<T> {
    pub fn new(
        client: ResilientClient<T>,
        endpoint: Endpoint,
        region: Region,
        config: ViewsQueryConfig,
    ) -> Self {
        Self {
            client,
            endpoint,
            region,
            config,
        }
    }

    fn page_request(&self, offset: u64) -> GraphQlPayload {
        let variables = json!({
            "input": {
                "west": self.region.west(),
                "south": self.region.south(),
                "east": self.region.east(),
                "north": self.region.north(),
                "sortDirection": self.config.sort_direction,
                "sortType": self.config.sort_type,
                "freeSearchTerm": self.config.free_search_term,
                "classificationsOrSlugs": self.config.classification_filter,
                "recordLimit": self.config.page_size,
                "recordOffset": offset,
            }
        });
        GraphQlPayload::Single(GraphQlRequest::new(VIEWS_QUERY, variables))
    }

    /// Fetch the page starting at `offset`.
    pub async fn fetch_page(
        &self,
        offset: u64,
        cancel: &CancellationToken,
    ) -> Result<ViewsPage, AppError> {
        let response = self
            .client
            .send(&self.endpoint, &self.page_request(offset), cancel)
            .await?;

        ensure_no_errors(&response)?;
        let result = query_result(&response, VIEWS_FIELD)?;
        ensure_no_query_error(result)?;

        let parsed: ViewsResult = serde_json::from_value(result.clone())
            .map_err(|e| AppError::ProtocolError(format!("unexpected views result: {e}")))?;

        Ok(ViewsPage {
            records: parsed
                .camera_views
                .unwrap_or_default()
                .iter()
                .map(CameraView::from_value)
                .collect(),
            offset,
            total_records: parsed.total_records,
        })
    }

    /// Harvest every page and return camera id -> unique HLS sources.
    ///
    /// The total reported by the first page is authoritative for termination.
    /// Any fatal error aborts the whole harvest.
    pub async fn harvest_sources<R: CrawlReporter>(
        &self,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<SourceMap, AppError> {
        let page_size = u64::from(self.config.page_size);
        let mut sources = SourceMap::new();
        let mut offset = 0u64;
        let mut total: Option<u64> = None;
        let mut pages = 0u32;

        loop {
            ensure_not_cancelled(cancel)?;

            let page = self.fetch_page(offset, cancel).await?;
            pages += 1;

            let total_records = match total {
                Some(t) => t,
                None => {
                    let t = page.total_records.ok_or_else(|| {
                        AppError::ProtocolError("first views page has no totalRecords".into())
                    })?;
                    reporter.report(CrawlEvent::ViewsTotal { total_records: t });
                    total = Some(t);
                    t
                }
            };

            reporter.report(CrawlEvent::ViewsPage {
                offset,
                received: page.records.len(),
            });

            for view in &page.records {
                collect_hls_sources(view, &mut sources);
            }

            if page.records.is_empty() || offset + page_size >= total_records {
                break;
            }

            offset += page_size;
            sleep_or_cancel(self.config.page_delay, cancel).await?;
        }

        reporter.report(CrawlEvent::ViewsDone {
            cameras_with_sources: sources.len(),
            pages,
        });
        Ok(sources)
    }
}

/// Append the HLS sources of `view` to its parent camera's list, skipping
/// rows without a parent and sources whose URL is already present.
pub fn collect_hls_sources(view: &CameraView, sources: &mut SourceMap) {
    let Some(camera_id) = view.parent_uri.as_deref().filter(|uri| !uri.is_empty()) else {
        return;
    };

    for (media_type, src) in &view.sources {
        if media_type != HLS_MIME_TYPE || src.is_empty() {
            continue;
        }

        let list = sources.entry(camera_id.to_string()).or_default();
        if !list.iter().any(|existing| &existing.src == src) {
            list.push(MediaSource::hls(src.as_str()));
        }
    }
}
