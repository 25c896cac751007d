use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{self, Duration, SystemTime, UNIX_EPOCH},
};
/// represent current time with seconds and fraction of a second in nanoseconds
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeDurationStruct {
    /// seconds
    pub sec: u64,
    /// fraction of a second in nanoseconds
    pub nsec: u32,
}

/// calculate what time is it since `1970-1-1 00:00:00`,named as [UNIX_EPOCH]
pub fn now() -> TimeDurationStruct {
    // a clock set before the epoch is reported as the epoch itself
    let now = SystemTime::now()
        .duration_since(time::UNIX_EPOCH)
        .unwrap_or_default();
    TimeDurationStruct {
        sec: now.as_secs(),
        nsec: now.subsec_nanos(),
    }
}

impl TimeDurationStruct {
    pub fn is_unset(&self) -> bool {
        self.sec == 0 && self.nsec == 0
    }
}

impl From<TimeDurationStruct> for SystemTime {
    fn from(value: TimeDurationStruct) -> Self {
        let duration = Duration::new(value.sec, value.nsec);
        UNIX_EPOCH + duration
    }
}

/// seconds since the epoch, which is what reports print
impl fmt::Display for TimeDurationStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}
