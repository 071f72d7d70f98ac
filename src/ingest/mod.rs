use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::enrich::{TextGenerator, extract_requirements};
use crate::error::AppError;
use crate::models::job::{CreateJob, Job, JobStore};
use crate::scrapers::{PageFetcher, scrape};
use crate::sites::Platform;

/// What happened to one posting URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored,
    AlreadyStored,
}

/// Scrape, enrich, and store a batch of canonical posting URLs.
///
/// Each URL is handled independently; one bad posting never sinks the rest
/// of the batch. A bounded worker count keeps us polite toward the boards.
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn JobStore>,
    fetcher: Arc<dyn PageFetcher>,
    generator: Arc<dyn TextGenerator>,
    workers: usize,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        fetcher: Arc<dyn PageFetcher>,
        generator: Arc<dyn TextGenerator>,
        workers: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            generator,
            workers: workers.max(1),
        }
    }

    /// Process a batch, returning how many URLs were handled to completion
    /// (stored or recognized as already stored).
    pub async fn run(&self, platform: Platform, urls: Vec<String>) -> usize {
        let limiter = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        for url in urls {
            let pipeline = self.clone();
            let limiter = Arc::clone(&limiter);
            tasks.spawn(async move {
                let Ok(_permit) = limiter.acquire_owned().await else {
                    return false;
                };
                match pipeline.process_url(platform, &url).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!("Failed to process {url}: {e}");
                        false
                    }
                }
            });
        }

        let mut processed = 0;
        while let Some(joined) = tasks.join_next().await {
            if matches!(joined, Ok(true)) {
                processed += 1;
            }
        }
        processed
    }

    /// Scrape one posting, then either skip it (already stored under the
    /// same identity) or enrich and upsert it. Nothing is written unless
    /// every earlier step succeeded.
    async fn process_url(
        &self,
        platform: Platform,
        url: &str,
    ) -> Result<IngestOutcome, AppError> {
        let details = scrape(self.fetcher.as_ref(), platform, url).await?;
        let unique_id = Job::unique_id(url, &details.freshness);

        if self.store.exists(&unique_id).await? {
            info!("Skipping {unique_id} (already exists)");
            return Ok(IngestOutcome::AlreadyStored);
        }

        let requirements =
            extract_requirements(self.generator.as_ref(), &details.description).await?;

        let job = CreateJob {
            unique_id: unique_id.clone(),
            company: details.company,
            job_title: details.title,
            image: details.image,
            description: details.description,
            location: details.location,
            years: requirements.years,
            skills: requirements.skills,
            job_url: url.to_string(),
            job_board: platform.as_str().to_string(),
        };
        self.store.upsert(job).await?;
        info!("Upsert succeeded for {unique_id}");
        Ok(IngestOutcome::Stored)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::scrapers::testutil::{
        GREENHOUSE_EMBED_PAGE, LEVER_APPLY_PAGE, LEVER_POSTING_PAGE, StubFetcher,
    };

    const LEVER_URL: &str = "https://jobs.lever.co/acme/123/apply";

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<String, CreateJob>>,
        upserts: AtomicUsize,
        broken_ids: Mutex<HashSet<String>>,
    }

    impl MemoryStore {
        /// Make every store call touching this id fail.
        fn break_id(&self, unique_id: &str) {
            self.broken_ids.lock().unwrap().insert(unique_id.to_string());
        }
    }

    #[async_trait]
    impl JobStore for MemoryStore {
        async fn exists(&self, unique_id: &str) -> Result<bool, AppError> {
            if self.broken_ids.lock().unwrap().contains(unique_id) {
                return Err(AppError::Database(sqlx::Error::PoolClosed));
            }
            Ok(self.rows.lock().unwrap().contains_key(unique_id))
        }

        async fn upsert(&self, job: CreateJob) -> Result<(), AppError> {
            if self.broken_ids.lock().unwrap().contains(&job.unique_id) {
                return Err(AppError::Database(sqlx::Error::PoolClosed));
            }
            self.upserts.fetch_add(1, Ordering::SeqCst);
            self.rows.lock().unwrap().insert(job.unique_id.clone(), job);
            Ok(())
        }
    }

    struct CountingGenerator {
        calls: AtomicUsize,
        response: String,
    }

    impl CountingGenerator {
        fn new(response: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: response.to_string(),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn lever_fetcher() -> StubFetcher {
        StubFetcher::new()
            .with_page("https://jobs.lever.co/acme/123", LEVER_POSTING_PAGE)
            .with_page(LEVER_URL, LEVER_APPLY_PAGE)
    }

    fn pipeline(
        store: Arc<MemoryStore>,
        generator: Arc<CountingGenerator>,
    ) -> IngestPipeline {
        IngestPipeline::new(store, Arc::new(lever_fetcher()), generator, 2)
    }

    #[tokio::test]
    async fn stores_a_new_posting_with_extracted_requirements() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(CountingGenerator::new(
            r#"{"years": 3, "skills": ["Rust", "PostgreSQL"]}"#,
        ));
        let pipeline = pipeline(Arc::clone(&store), Arc::clone(&generator));

        let outcome = pipeline.process_url(Platform::Lever, LEVER_URL).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Stored);

        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        let job = rows.values().next().unwrap();
        assert_eq!(job.company, "Acme");
        assert_eq!(job.job_title, "Senior Backend Engineer");
        assert_eq!(job.years, 3);
        assert_eq!(job.skills, vec!["Rust", "PostgreSQL"]);
        assert_eq!(job.job_url, LEVER_URL);
        assert_eq!(job.job_board, "lever");
    }

    #[tokio::test]
    async fn reingesting_an_unchanged_posting_skips_enrichment_and_write() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(CountingGenerator::new(r#"{"years": 2, "skills": []}"#));
        let pipeline = pipeline(Arc::clone(&store), Arc::clone(&generator));

        let first = pipeline.process_url(Platform::Lever, LEVER_URL).await.unwrap();
        let second = pipeline.process_url(Platform::Lever, LEVER_URL).await.unwrap();

        assert_eq!(first, IngestOutcome::Stored);
        assert_eq!(second, IngestOutcome::AlreadyStored);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.upserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn extraction_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(CountingGenerator::new("I could not find anything."));
        let pipeline = pipeline(Arc::clone(&store), Arc::clone(&generator));

        let err = pipeline
            .process_url(Platform::Lever, LEVER_URL)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
        assert!(store.rows.lock().unwrap().is_empty());
        assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_bad_url_does_not_sink_the_batch() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(CountingGenerator::new(r#"{"years": 1, "skills": ["Go"]}"#));
        let pipeline = pipeline(Arc::clone(&store), Arc::clone(&generator));

        let processed = pipeline
            .run(
                Platform::Lever,
                vec![
                    LEVER_URL.to_string(),
                    "https://jobs.lever.co/ghost/void/apply".to_string(),
                ],
            )
            .await;

        assert_eq!(processed, 1);
        assert_eq!(store.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn greenhouse_rerun_on_a_later_day_stores_nothing_new() {
        let url = "https://boards.greenhouse.io/embed/job_app?for=initech&token=456";
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(CountingGenerator::new(
            r#"{"years": 5, "skills": ["Kubernetes"]}"#,
        ));

        // Same posting, fetched a day apart: only the render date moves.
        let first_day = StubFetcher::new().with_page(url, GREENHOUSE_EMBED_PAGE);
        let next_day = StubFetcher::new().with_page(
            url,
            &GREENHOUSE_EMBED_PAGE
                .replace("2024-06-02 10:15:00 -0400", "2024-06-03 09:00:00 -0400"),
        );

        let first = IngestPipeline::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::new(first_day),
            Arc::clone(&generator) as Arc<dyn TextGenerator>,
            2,
        );
        let second = IngestPipeline::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::new(next_day),
            Arc::clone(&generator) as Arc<dyn TextGenerator>,
            2,
        );

        let stored = first.process_url(Platform::Greenhouse, url).await.unwrap();
        let rerun = second.process_url(Platform::Greenhouse, url).await.unwrap();

        assert_eq!(stored, IngestOutcome::Stored);
        assert_eq!(rerun, IngestOutcome::AlreadyStored);
        assert_eq!(store.rows.lock().unwrap().len(), 1);
        assert_eq!(store.upserts.load(Ordering::SeqCst), 1);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_failure_on_one_item_leaves_the_rest_of_the_batch_intact() {
        let broken_url = "https://jobs.lever.co/acme/456/apply";
        let store = Arc::new(MemoryStore::default());
        store.break_id(&Job::unique_id(broken_url, "2024-05-30T20:57:57Z"));

        let generator = Arc::new(CountingGenerator::new(r#"{"years": 1, "skills": ["Go"]}"#));
        let fetcher = StubFetcher::new()
            .with_page("https://jobs.lever.co/acme/123", LEVER_POSTING_PAGE)
            .with_page(LEVER_URL, LEVER_APPLY_PAGE)
            .with_page("https://jobs.lever.co/acme/456", LEVER_POSTING_PAGE)
            .with_page(broken_url, LEVER_APPLY_PAGE);
        let pipeline = IngestPipeline::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::new(fetcher),
            generator,
            2,
        );

        let processed = pipeline
            .run(
                Platform::Lever,
                vec![LEVER_URL.to_string(), broken_url.to_string()],
            )
            .await;

        assert_eq!(processed, 1);
        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.values().next().unwrap().job_url, LEVER_URL);
    }

    #[tokio::test]
    async fn run_counts_already_stored_postings_as_processed() {
        let store = Arc::new(MemoryStore::default());
        let generator = Arc::new(CountingGenerator::new(r#"{"years": 0, "skills": []}"#));
        let pipeline = pipeline(Arc::clone(&store), Arc::clone(&generator));

        pipeline.process_url(Platform::Lever, LEVER_URL).await.unwrap();
        let processed = pipeline.run(Platform::Lever, vec![LEVER_URL.to_string()]).await;

        assert_eq!(processed, 1);
        assert_eq!(store.upserts.load(Ordering::SeqCst), 1);
    }
}
