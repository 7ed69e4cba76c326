use time::OffsetDateTime;

/// Source of wall-clock time for delegation windows and file timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    fn unix_seconds(&self) -> u64 {
        self.now().unix_timestamp().max(0) as u64
    }

    fn unix_millis(&self) -> u64 {
        (self.now().unix_timestamp_nanos() / 1_000_000).max(0) as u64
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Always returns the same instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub OffsetDateTime);

impl FixedClock {
    pub fn from_unix_seconds(secs: i64) -> Self {
        Self(OffsetDateTime::from_unix_timestamp(secs).unwrap_or(OffsetDateTime::UNIX_EPOCH))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}
