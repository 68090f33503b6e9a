use serde::Serialize;

use crate::models::file::FileRecord;

/// Per-user storage ceiling, 10 GiB. Reported, not enforced.
pub const STORAGE_LIMIT_BYTES: i64 = 10 * 1024 * 1024 * 1024;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QuotaReport {
    #[serde(rename = "used")]
    pub used_bytes: i64,
    #[serde(rename = "total")]
    pub limit_bytes: i64,
    pub used_percentage: f64,
}

impl QuotaReport {
    pub fn empty(limit_bytes: i64) -> Self {
        Self {
            used_bytes: 0,
            limit_bytes,
            used_percentage: 0.0,
        }
    }
}

pub fn compute_quota(owner_files: &[FileRecord], limit_bytes: i64) -> QuotaReport {
    let used_bytes = owner_files
        .iter()
        .map(|file| file.size_bytes.max(0))
        .fold(0i64, i64::saturating_add);

    let used_percentage = if limit_bytes > 0 {
        let raw = used_bytes as f64 / limit_bytes as f64 * 100.0;
        ((raw * 100.0).round() / 100.0).min(100.0)
    } else {
        0.0
    };

    QuotaReport {
        used_bytes,
        limit_bytes,
        used_percentage,
    }
}
