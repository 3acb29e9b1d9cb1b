use std::fmt::{self, Display};
use std::str::FromStr;

use serde::Serialize;

use crate::error::ParseError;

/// Per-request measurements a client can report, named after their libcurl
/// counterparts. Times are in seconds, sizes in bytes, speeds in bytes/second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    NamelookupTime,
    ConnectTime,
    AppconnectTime,
    PretransferTime,
    StarttransferTime,
    RedirectTime,
    TotalTime,
    SizeDownload,
    RequestSize,
    SpeedDownload,
    SpeedUpload,
    RedirectCount,
    NumConnects,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::NamelookupTime,
        Metric::ConnectTime,
        Metric::AppconnectTime,
        Metric::PretransferTime,
        Metric::StarttransferTime,
        Metric::RedirectTime,
        Metric::TotalTime,
        Metric::SizeDownload,
        Metric::RequestSize,
        Metric::SpeedDownload,
        Metric::SpeedUpload,
        Metric::RedirectCount,
        Metric::NumConnects,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::NamelookupTime => "namelookup_time",
            Metric::ConnectTime => "connect_time",
            Metric::AppconnectTime => "appconnect_time",
            Metric::PretransferTime => "pretransfer_time",
            Metric::StarttransferTime => "starttransfer_time",
            Metric::RedirectTime => "redirect_time",
            Metric::TotalTime => "total_time",
            Metric::SizeDownload => "size_download",
            Metric::RequestSize => "request_size",
            Metric::SpeedDownload => "speed_download",
            Metric::SpeedUpload => "speed_upload",
            Metric::RedirectCount => "redirect_count",
            Metric::NumConnects => "num_connects",
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Metric {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Metric::ALL
            .into_iter()
            .find(|metric| metric.name() == wanted)
            .ok_or_else(|| ParseError::UnknownMetric(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().ok(), Some(metric));
        }
        assert!(matches!("latency".parse::<Metric>(), Err(ParseError::UnknownMetric(_))));
    }
}
