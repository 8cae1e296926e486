use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: u64 = 60 * 60 * 24;
pub const SECONDS_PER_HOUR: u64 = 60 * 60;

/// Snapshot cadence. Each cadence keeps its own table of per-bucket rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cadence {
    Daily,
    Hourly,
}

impl Cadence {
    pub fn duration_secs(&self) -> u64 {
        match self {
            Cadence::Daily => SECONDS_PER_DAY,
            Cadence::Hourly => SECONDS_PER_HOUR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Hourly => "hourly",
        }
    }

    pub fn bucket(&self, timestamp: u64) -> u64 {
        timestamp / self.duration_secs()
    }

    pub fn all() -> [Cadence; 2] {
        [Cadence::Daily, Cadence::Hourly]
    }
}

pub fn daily_bucket(timestamp: u64) -> u64 {
    Cadence::Daily.bucket(timestamp)
}

pub fn hourly_bucket(timestamp: u64) -> u64 {
    Cadence::Hourly.bucket(timestamp)
}

/// `"<tokenId>-<bucket>"`, shared by daily and hourly snapshots.
pub fn snapshot_id(token_id: &str, bucket: u64) -> String {
    format!("{token_id}-{bucket}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_boundary() {
        assert_eq!(daily_bucket(0), 0);
        assert_eq!(daily_bucket(86_399), 0);
        assert_eq!(daily_bucket(86_400), 1);
        assert_eq!(daily_bucket(1_700_000_000), 19_675);
    }

    #[test]
    fn test_hour_boundary() {
        assert_eq!(hourly_bucket(3_599), 0);
        assert_eq!(hourly_bucket(3_600), 1);
        assert_eq!(hourly_bucket(86_400), 24);
    }

    #[test]
    fn test_snapshot_id_format() {
        let token = "0x9e20461bc2c4c980f62f1b279d71734207a6a356";
        assert_eq!(
            snapshot_id(token, Cadence::Daily.bucket(86_400)),
            "0x9e20461bc2c4c980f62f1b279d71734207a6a356-1"
        );
    }
}
