//! Configuration module
//!
//! This module provides configuration structures for the thumbnail service,
//! including storage, signing, rate-limit, coalescing, and job-queue settings.
//! Everything is read once at startup; business logic never touches the
//! environment directly.

use std::env;
use std::str::FromStr;

use crate::models::Variant;
use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 4000;
const SIGNED_URL_TTL_MINUTES: u64 = 15;
const URL_CACHE_TTL_MARGIN_SECS: u64 = 30;
const RATE_LIMIT_CAPACITY: f64 = 10.0;
const RATE_LIMIT_REFILL_PER_SEC: f64 = 2.0;
const COALESCING_CEILING_SECS: u64 = 120;
const JOB_QUEUE_SIZE: usize = 1000;
const JOB_MAX_CONCURRENT: usize = 4;

/// Base configuration shared by every binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

/// Thumbnail service configuration
#[derive(Clone, Debug)]
pub struct ThumbnailServiceConfig {
    pub base: BaseConfig,
    // Storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    /// HMAC key for local-backend signed URLs.
    pub url_signing_secret: Option<String>,
    // Signed URL / cache configuration
    pub signed_url_ttl_minutes: u64,
    /// Safety margin subtracted from the provider TTL before caching, so a
    /// cached URL never outlives the grant it was issued under.
    pub url_cache_ttl_margin_secs: u64,
    // Rate limiter configuration
    pub rate_limit_capacity: f64,
    pub rate_limit_refill_per_sec: f64,
    // Coalescing configuration
    pub coalescing_ceiling_secs: u64,
    // Job queue configuration
    pub job_queue_size: usize,
    pub job_max_concurrent: usize,
    /// Variants rendered on warming and accepted on request.
    pub thumbnail_variants: Vec<Variant>,
}

/// Application configuration (thumbnail service).
#[derive(Clone, Debug)]
pub struct Config(pub Box<ThumbnailServiceConfig>);

impl Config {
    fn inner(&self) -> &ThumbnailServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ThumbnailServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn url_signing_secret(&self) -> Option<&str> {
        self.inner().url_signing_secret.as_deref()
    }

    pub fn signed_url_ttl_minutes(&self) -> u64 {
        self.inner().signed_url_ttl_minutes
    }

    pub fn signed_url_ttl_secs(&self) -> u64 {
        self.inner().signed_url_ttl_minutes * 60
    }

    pub fn url_cache_ttl_margin_secs(&self) -> u64 {
        self.inner().url_cache_ttl_margin_secs
    }

    pub fn rate_limit_capacity(&self) -> f64 {
        self.inner().rate_limit_capacity
    }

    pub fn rate_limit_refill_per_sec(&self) -> f64 {
        self.inner().rate_limit_refill_per_sec
    }

    pub fn coalescing_ceiling_secs(&self) -> u64 {
        self.inner().coalescing_ceiling_secs
    }

    pub fn job_queue_size(&self) -> usize {
        self.inner().job_queue_size
    }

    pub fn job_max_concurrent(&self) -> usize {
        self.inner().job_max_concurrent
    }

    pub fn thumbnail_variants(&self) -> &[Variant] {
        &self.inner().thumbnail_variants
    }
}

impl ThumbnailServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
        };

        let storage_backend = env::var("STORAGE_BACKEND")
            .ok()
            .and_then(|s| StorageBackend::from_str(&s).ok());

        let thumbnail_variants = env::var("THUMBNAIL_VARIANTS")
            .unwrap_or_else(|_| "96,240,480".to_string())
            .split(',')
            .map(|s| {
                s.trim()
                    .parse::<Variant>()
                    .map_err(|e| anyhow::anyhow!("THUMBNAIL_VARIANTS: {}", e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let config = ThumbnailServiceConfig {
            base,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").or_else(|_| env::var("AWS_REGION")).ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            url_signing_secret: env::var("URL_SIGNING_SECRET").ok(),
            signed_url_ttl_minutes: env::var("SIGNED_URL_TTL_MINUTES")
                .unwrap_or_else(|_| SIGNED_URL_TTL_MINUTES.to_string())
                .parse()
                .unwrap_or(SIGNED_URL_TTL_MINUTES),
            url_cache_ttl_margin_secs: env::var("URL_CACHE_TTL_MARGIN_SECS")
                .unwrap_or_else(|_| URL_CACHE_TTL_MARGIN_SECS.to_string())
                .parse()
                .unwrap_or(URL_CACHE_TTL_MARGIN_SECS),
            rate_limit_capacity: env::var("RATE_LIMIT_CAPACITY")
                .unwrap_or_else(|_| RATE_LIMIT_CAPACITY.to_string())
                .parse()
                .unwrap_or(RATE_LIMIT_CAPACITY),
            rate_limit_refill_per_sec: env::var("RATE_LIMIT_REFILL_PER_SEC")
                .unwrap_or_else(|_| RATE_LIMIT_REFILL_PER_SEC.to_string())
                .parse()
                .unwrap_or(RATE_LIMIT_REFILL_PER_SEC),
            coalescing_ceiling_secs: env::var("COALESCING_CEILING_SECS")
                .unwrap_or_else(|_| COALESCING_CEILING_SECS.to_string())
                .parse()
                .unwrap_or(COALESCING_CEILING_SECS),
            job_queue_size: env::var("JOB_QUEUE_SIZE")
                .unwrap_or_else(|_| JOB_QUEUE_SIZE.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_SIZE),
            job_max_concurrent: env::var("JOB_MAX_CONCURRENT")
                .unwrap_or_else(|_| JOB_MAX_CONCURRENT.to_string())
                .parse()
                .unwrap_or(JOB_MAX_CONCURRENT),
            thumbnail_variants,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        // Validate storage backend configuration
        let backend = self.storage_backend.unwrap_or(StorageBackend::S3);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
                match self.url_signing_secret.as_deref() {
                    None => {
                        return Err(anyhow::anyhow!(
                            "URL_SIGNING_SECRET must be set when using local storage backend"
                        ));
                    }
                    Some(secret) if secret.len() < 32 => {
                        return Err(anyhow::anyhow!(
                            "URL_SIGNING_SECRET must be at least 32 characters long"
                        ));
                    }
                    Some(_) => {}
                }
            }
        }

        if self.signed_url_ttl_minutes == 0 {
            return Err(anyhow::anyhow!("SIGNED_URL_TTL_MINUTES must be positive"));
        }

        if self.url_cache_ttl_margin_secs >= self.signed_url_ttl_minutes * 60 {
            return Err(anyhow::anyhow!(
                "URL_CACHE_TTL_MARGIN_SECS must be smaller than the signed URL TTL"
            ));
        }

        if self.rate_limit_capacity <= 0.0 || self.rate_limit_refill_per_sec <= 0.0 {
            return Err(anyhow::anyhow!(
                "RATE_LIMIT_CAPACITY and RATE_LIMIT_REFILL_PER_SEC must be positive"
            ));
        }

        if self.coalescing_ceiling_secs == 0 {
            return Err(anyhow::anyhow!("COALESCING_CEILING_SECS must be positive"));
        }

        if self.job_queue_size == 0 || self.job_max_concurrent == 0 {
            return Err(anyhow::anyhow!(
                "JOB_QUEUE_SIZE and JOB_MAX_CONCURRENT must be positive"
            ));
        }

        if self.thumbnail_variants.is_empty() {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_VARIANTS must list at least one variant"
            ));
        }

        Ok(())
    }
}
