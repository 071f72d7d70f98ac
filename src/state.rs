use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::enrich::replicate::ReplicateClient;
use crate::error::AppError;
use crate::ingest::IngestPipeline;
use crate::scrapers::HttpFetcher;
use crate::search::{DiscoveryRequest, GoogleSearch, ProxyPool, SearchBackend, discover};
use crate::sites::{Platform, SiteTable, TimeWindow};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub sites: Arc<SiteTable>,
    pub search: Arc<dyn SearchBackend>,
    pub ingest: IngestPipeline,
}

impl AppState {
    pub fn from_config(config: &Config, pool: PgPool) -> Result<Self, AppError> {
        let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout_secs)?);
        let generator = Arc::new(ReplicateClient::new(config.replicate_api_token.clone())?);
        let ingest = IngestPipeline::new(
            Arc::new(pool.clone()),
            fetcher,
            generator,
            config.ingest_workers,
        );
        Ok(Self {
            pool,
            sites: Arc::new(SiteTable::new()?),
            search: Arc::new(GoogleSearch),
            ingest,
        })
    }

    /// One full refresh round: discover candidate postings across every
    /// platform, then ingest each platform's batch.
    pub async fn refresh(
        &self,
        query: &str,
        window: TimeWindow,
        max: usize,
    ) -> Result<usize, AppError> {
        if max == 0 {
            return Err(AppError::BadRequest("max must be at least 1".to_string()));
        }

        let request = DiscoveryRequest {
            query: query.to_string(),
            platforms: Platform::ALL.to_vec(),
            window,
            max_results: max,
        };
        let proxies = ProxyPool::load().await;
        let mut batches =
            discover(self.search.as_ref(), &self.sites, &proxies, &request).await?;

        let mut refreshed = 0;
        for platform in Platform::ALL {
            let urls = batches.remove(&platform).unwrap_or_default();
            if urls.is_empty() {
                continue;
            }
            let processed = self.ingest.run(platform, urls).await;
            info!("{platform}: {processed} postings processed");
            refreshed += processed;
        }
        info!("Refresh round complete: {refreshed} postings processed");
        Ok(refreshed)
    }
}
