//! Environment-variable driven configuration.
//!
//! There is no file-based config layer in this system (see DESIGN.md for
//! why the reference crate's `prefer`-based loader wasn't carried over);
//! every setting has a single source of truth, `std::env::var`, read once
//! at startup and validated before any binary does real work.

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn optional(key: &'static str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn optional_parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        None => Ok(default),
        Some(v) => v.parse::<T>().map_err(|_| ConfigError::Invalid {
            key,
            value: v,
            reason: "could not parse".to_string(),
        }),
    }
}

/// AWS object-store and queue endpoints.
#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub ingest_bucket: String,
    pub thumbnail_bucket: String,
    pub queue_url: String,
    pub dlq_queue_url: Option<String>,
    pub preview_queue_url: Option<String>,
    pub dlq_archive_bucket: String,
    pub opensearch_endpoint: String,
    pub opensearch_index: String,
    /// Exact-match comparison for "is this the landing bucket" — replaces
    /// the substring heuristic the source system used.
    pub ingest_bucket_name: String,
    pub sqs_wait_time_seconds: u32,
    pub sqs_visibility_timeout: u32,
}

/// Per-message processing limits.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub max_workers: usize,
    pub temp_dir: std::path::PathBuf,
    pub embedding_timeout: Duration,
    pub converter_timeout: Duration,
    pub resource_memory_high_water_percent: u8,
    pub resource_sample_interval_messages: u64,
}

/// Embedding generation.
#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    pub enable_image_embedding: bool,
    pub image_embedding_lambda: Option<String>,
}

/// Preview-rendering knobs.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub dpi: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
    pub max_pages: u32,
}

/// DLQ triage tunables.
#[derive(Debug, Clone)]
pub struct DlqConfig {
    pub min_age_seconds: u64,
    pub max_retries: u32,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

/// The fully assembled, validated configuration for any binary in this crate.
#[derive(Debug, Clone)]
pub struct Config {
    pub aws: AwsConfig,
    pub processing: ProcessingConfig,
    pub thumbnail: ThumbnailConfig,
    pub preview: PreviewConfig,
    pub dlq: DlqConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::from_env_unchecked()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration without the fail-fast [`Config::validate`] pass,
    /// for callers that want to defer or skip it (e.g. `--skip-validation`).
    pub fn from_env_unchecked() -> Result<Self, ConfigError> {
        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1).max(1))
            .unwrap_or(1);

        let aws = AwsConfig {
            region: required("AWS_REGION")?,
            ingest_bucket: required("S3_BUCKET")?,
            thumbnail_bucket: required("S3_THUMBNAIL_BUCKET")?,
            queue_url: required("SQS_QUEUE_URL")?,
            dlq_queue_url: optional("DLQ_QUEUE_URL"),
            preview_queue_url: optional("PREVIEW_QUEUE_URL"),
            dlq_archive_bucket: optional("DLQ_ARCHIVE_BUCKET")
                .unwrap_or_else(|| optional("S3_BUCKET").unwrap_or_default()),
            opensearch_endpoint: required("OPENSEARCH_ENDPOINT")?,
            opensearch_index: optional("OPENSEARCH_INDEX").unwrap_or_else(|| "file-index".to_string()),
            ingest_bucket_name: optional("INGEST_BUCKET_NAME")
                .unwrap_or_else(|| required("S3_BUCKET").unwrap_or_default()),
            sqs_wait_time_seconds: optional_parsed("SQS_WAIT_TIME_SECONDS", 20)?,
            sqs_visibility_timeout: optional_parsed("SQS_VISIBILITY_TIMEOUT", 300)?,
        };

        let processing = ProcessingConfig {
            max_workers: optional_parsed("MAX_WORKERS", default_workers)?,
            temp_dir: optional("TEMP_DIR")
                .map(std::path::PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            embedding_timeout: Duration::from_secs(optional_parsed("EMBEDDING_TIMEOUT_SECONDS", 30)?),
            converter_timeout: Duration::from_secs(optional_parsed("CONVERTER_TIMEOUT_SECONDS", 180)?),
            resource_memory_high_water_percent: optional_parsed(
                "RESOURCE_MEMORY_HIGH_WATER_PERCENT",
                80,
            )?,
            resource_sample_interval_messages: optional_parsed(
                "RESOURCE_SAMPLE_INTERVAL_MESSAGES",
                50,
            )?,
        };

        let thumbnail = ThumbnailConfig {
            enable_image_embedding: optional_parsed("ENABLE_IMAGE_EMBEDDING", false)?,
            image_embedding_lambda: optional("IMAGE_EMBEDDING_LAMBDA"),
        };

        let preview = PreviewConfig {
            dpi: optional_parsed("PREVIEW_DPI", 150)?,
            max_width: optional_parsed("PREVIEW_MAX_WIDTH", 1600)?,
            max_height: optional_parsed("PREVIEW_MAX_HEIGHT", 1600)?,
            quality: optional_parsed("PREVIEW_QUALITY", 80)?,
            max_pages: optional_parsed("PREVIEW_MAX_PAGES", 50)?,
        };

        let dlq = DlqConfig {
            min_age_seconds: optional_parsed("DLQ_MIN_AGE_SECONDS", 300)?,
            max_retries: optional_parsed("DLQ_MAX_RETRIES", 3)?,
        };

        let logging = LoggingConfig {
            level: optional("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        Ok(Config {
            aws,
            processing,
            thumbnail,
            preview,
            dlq,
            logging,
        })
    }

    /// Fail-fast sanity checks beyond "did the env var parse".
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aws.opensearch_endpoint.is_empty() {
            return Err(ConfigError::Invalid {
                key: "OPENSEARCH_ENDPOINT",
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.processing.max_workers == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_WORKERS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.preview.quality == 0 || self.preview.quality > 100 {
            return Err(ConfigError::Invalid {
                key: "PREVIEW_QUALITY",
                value: self.preview.quality.to_string(),
                reason: "must be in 1..=100".to_string(),
            });
        }
        Ok(())
    }

    /// Human-readable configuration dump for `--validate-only` style startup.
    pub fn print_summary(&self) {
        println!("Configuration summary:");
        println!("  AWS region:            {}", self.aws.region);
        println!("  Ingest bucket:         {}", self.aws.ingest_bucket);
        println!("  Thumbnail bucket:      {}", self.aws.thumbnail_bucket);
        println!("  Primary queue:         {}", self.aws.queue_url);
        println!(
            "  DLQ queue:             {}",
            self.aws.dlq_queue_url.as_deref().unwrap_or("<derived>")
        );
        println!("  OpenSearch endpoint:   {}", self.aws.opensearch_endpoint);
        println!("  OpenSearch index:      {}", self.aws.opensearch_index);
        println!("  Max workers:           {}", self.processing.max_workers);
        println!("  Temp dir:              {}", self.processing.temp_dir.display());
        println!("  Image embedding:       {}", self.thumbnail.enable_image_embedding);
        println!("  Log level:             {}", self.logging.level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for key in [
            "AWS_REGION",
            "S3_BUCKET",
            "S3_THUMBNAIL_BUCKET",
            "SQS_QUEUE_URL",
            "OPENSEARCH_ENDPOINT",
            "OPENSEARCH_INDEX",
            "INGEST_BUCKET_NAME",
            "MAX_WORKERS",
            "PREVIEW_QUALITY",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn missing_required_var_is_reported() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("AWS_REGION")));
    }

    #[test]
    fn defaults_apply_when_optional_vars_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("AWS_REGION", "ap-northeast-1");
        env::set_var("S3_BUCKET", "ingest-bucket");
        env::set_var("S3_THUMBNAIL_BUCKET", "thumb-bucket");
        env::set_var("SQS_QUEUE_URL", "https://sqs.example/queue");
        env::set_var("OPENSEARCH_ENDPOINT", "https://search.example");

        let config = Config::from_env().unwrap();
        assert_eq!(config.aws.opensearch_index, "file-index");
        assert_eq!(config.aws.sqs_wait_time_seconds, 20);
        assert_eq!(config.dlq.max_retries, 3);
        clear_all();
    }

    #[test]
    fn invalid_preview_quality_fails_validation() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        env::set_var("AWS_REGION", "ap-northeast-1");
        env::set_var("S3_BUCKET", "ingest-bucket");
        env::set_var("S3_THUMBNAIL_BUCKET", "thumb-bucket");
        env::set_var("SQS_QUEUE_URL", "https://sqs.example/queue");
        env::set_var("OPENSEARCH_ENDPOINT", "https://search.example");
        env::set_var("PREVIEW_QUALITY", "0");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PREVIEW_QUALITY", .. }));
        clear_all();
    }
}
