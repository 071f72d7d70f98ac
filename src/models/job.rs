use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::AppError;

/// A stored posting. Rows are never mutated by the pipeline; a reposted or
/// re-dated posting arrives under a new unique_id.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Job {
    pub unique_id: String,
    pub company: String,
    pub job_title: String,
    pub image: Option<String>,
    pub description: String,
    pub location: String,
    pub years: i32,
    pub skills: Vec<String>,
    pub job_url: String,
    pub job_board: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateJob {
    pub unique_id: String,
    pub company: String,
    pub job_title: String,
    pub image: Option<String>,
    pub description: String,
    pub location: String,
    pub years: i32,
    pub skills: Vec<String>,
    pub job_url: String,
    pub job_board: String,
}

impl Job {
    /// Deterministic identity for a posting: the canonical URL concatenated
    /// with the platform's freshness signal, so the same posting hashes the
    /// same across runs and a re-dated posting gets a new id.
    pub fn unique_id(job_url: &str, freshness: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(job_url.as_bytes());
        hasher.update(freshness.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<Job>, AppError> {
        let jobs = sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs ORDER BY years ASC, created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(jobs)
    }

    pub async fn exists(pool: &PgPool, unique_id: &str) -> Result<bool, AppError> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM jobs WHERE unique_id = $1)")
            .bind(unique_id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    pub async fn upsert(pool: &PgPool, input: CreateJob) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO jobs (unique_id, company, job_title, image, description, location, years, skills, job_url, job_board) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (unique_id) DO UPDATE SET \
             company = EXCLUDED.company, job_title = EXCLUDED.job_title, image = EXCLUDED.image, \
             description = EXCLUDED.description, location = EXCLUDED.location, years = EXCLUDED.years, \
             skills = EXCLUDED.skills, job_url = EXCLUDED.job_url, job_board = EXCLUDED.job_board",
        )
        .bind(&input.unique_id)
        .bind(&input.company)
        .bind(&input.job_title)
        .bind(&input.image)
        .bind(&input.description)
        .bind(&input.location)
        .bind(input.years)
        .bind(&input.skills)
        .bind(&input.job_url)
        .bind(&input.job_board)
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// Store capability consumed by the ingest pipeline.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn exists(&self, unique_id: &str) -> Result<bool, AppError>;
    async fn upsert(&self, job: CreateJob) -> Result<(), AppError>;
}

#[async_trait]
impl JobStore for PgPool {
    async fn exists(&self, unique_id: &str) -> Result<bool, AppError> {
        Job::exists(self, unique_id).await
    }

    async fn upsert(&self, job: CreateJob) -> Result<(), AppError> {
        Job::upsert(self, job).await
    }
}
