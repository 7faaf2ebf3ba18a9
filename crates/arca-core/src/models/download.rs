use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Maximum delay in seconds before retrying a deferred download. Caps the
/// exponential backoff so high attempt counts do not produce absurd delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Backoff in seconds for a given attempt count (exponential with cap).
#[inline]
pub fn retry_backoff_seconds(attempts: i32) -> u64 {
    (2_u64.saturating_pow(attempts.max(0) as u32)).min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    New,
    Pending,
    Complete,
    Failed,
    Deferred,
}

impl DownloadStatus {
    /// Terminal rows never run again; the per-URL uniqueness rule only
    /// applies to non-terminal rows.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Complete | DownloadStatus::Failed)
    }
}

impl Display for DownloadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DownloadStatus::New => write!(f, "new"),
            DownloadStatus::Pending => write!(f, "pending"),
            DownloadStatus::Complete => write!(f, "complete"),
            DownloadStatus::Failed => write!(f, "failed"),
            DownloadStatus::Deferred => write!(f, "deferred"),
        }
    }
}

impl FromStr for DownloadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(DownloadStatus::New),
            "pending" => Ok(DownloadStatus::Pending),
            "complete" => Ok(DownloadStatus::Complete),
            "failed" => Ok(DownloadStatus::Failed),
            "deferred" => Ok(DownloadStatus::Deferred),
            _ => Err(anyhow::anyhow!("Invalid download status: {}", s)),
        }
    }
}

/// A durable download job. One-shot when `frequency_seconds` is NULL,
/// recurring otherwise (rescheduled after each success).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub id: Uuid,
    pub url: String,
    /// Hostname of `url`, used by the per-domain throttle.
    pub domain: Option<String>,
    /// Name of the downloader plugin that claimed this URL.
    pub downloader: String,
    /// Secondary downloader for feed-style downloads (e.g. each video of a
    /// channel feed).
    pub sub_downloader: Option<String>,
    /// Absolute destination directory, when the caller restricted it.
    pub destination: Option<String>,
    pub frequency_seconds: Option<i64>,
    pub status: DownloadStatus,
    /// Where the completed content can be viewed (e.g. `/archive/<id>`).
    pub location: Option<String>,
    pub error: Option<String>,
    pub attempts: i32,
    pub last_successful_download: Option<DateTime<Utc>>,
    pub next_download: Option<DateTime<Utc>>,
    pub settings: serde_json::Value,
    pub tag_names: Vec<String>,
    pub collection_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Download {
    pub fn is_recurring(&self) -> bool {
        self.frequency_seconds.is_some()
    }

    /// Extract the hostname used for domain throttling. Returns `None` for
    /// URLs without a host (which are rejected at creation anyway).
    pub fn domain_of(url: &str) -> Option<String> {
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Download {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Download {
            id: row.get("id"),
            url: row.get("url"),
            domain: row.get("domain"),
            downloader: row.get("downloader"),
            sub_downloader: row.get("sub_downloader"),
            destination: row.get("destination"),
            frequency_seconds: row.get("frequency_seconds"),
            status: row.get::<String, _>("status").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse download status: {}", e).into())
            })?,
            location: row.get("location"),
            error: row.get("error"),
            attempts: row.get("attempts"),
            last_successful_download: row.get("last_successful_download"),
            next_download: row.get("next_download"),
            settings: row.get("settings"),
            tag_names: row.get::<Json<Vec<String>>, _>("tag_names").0,
            collection_id: row.get("collection_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_round_trip() {
        for status in [
            DownloadStatus::New,
            DownloadStatus::Pending,
            DownloadStatus::Complete,
            DownloadStatus::Failed,
            DownloadStatus::Deferred,
        ] {
            assert_eq!(
                status.to_string().parse::<DownloadStatus>().unwrap(),
                status
            );
        }
        assert!("queued".parse::<DownloadStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(DownloadStatus::Complete.is_terminal());
        assert!(DownloadStatus::Failed.is_terminal());
        assert!(!DownloadStatus::New.is_terminal());
        assert!(!DownloadStatus::Pending.is_terminal());
        assert!(!DownloadStatus::Deferred.is_terminal());
    }

    #[test]
    fn backoff_exponential_then_capped() {
        assert_eq!(retry_backoff_seconds(0), 1);
        assert_eq!(retry_backoff_seconds(1), 2);
        assert_eq!(retry_backoff_seconds(2), 4);
        assert_eq!(retry_backoff_seconds(8), 256);
        assert_eq!(retry_backoff_seconds(9), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(retry_backoff_seconds(100), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(retry_backoff_seconds(-1), 1);
    }

    fn download(url: &str, frequency_seconds: Option<i64>) -> Download {
        Download {
            id: Uuid::new_v4(),
            url: url.to_string(),
            domain: Download::domain_of(url),
            downloader: "archive".to_string(),
            sub_downloader: None,
            destination: None,
            frequency_seconds,
            status: DownloadStatus::New,
            location: None,
            error: None,
            attempts: 0,
            last_successful_download: None,
            next_download: None,
            settings: serde_json::json!({}),
            tag_names: vec![],
            collection_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn one_shot_vs_recurring() {
        assert!(!download("https://example.com/a", None).is_recurring());
        assert!(download("https://example.com/a", Some(86400)).is_recurring());
    }

    #[test]
    fn status_serializes_snake_case() {
        let d = download("https://example.com/a", None);
        let value = serde_json::to_value(&d).unwrap();
        assert_eq!(value["status"], "new");
        assert_eq!(value["domain"], "example.com");
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(
            Download::domain_of("https://example.com/a/b?c=d"),
            Some("example.com".to_string())
        );
        assert_eq!(
            Download::domain_of("https://www.example.org:8080/x"),
            Some("www.example.org".to_string())
        );
        assert_eq!(Download::domain_of("not a url"), None);
    }
}
