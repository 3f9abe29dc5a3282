use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::globals::SYSTEM_RESERVED_BUCKET_PATH_WITH_SLASH;
use crate::utils::DateTime;

/// A traced event. The category is fixed by the producer and every consumer
/// matches on it once.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TraceInfo {
    Http(HttpTrace),
    Storage(StorageTrace),
    Os(OsTrace),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpTrace {
    #[serde(rename = "nodename")]
    pub node_name: String,
    #[serde(rename = "funcname")]
    pub fn_name: String,
    pub time: DateTime,
    #[serde(rename = "request")]
    pub req_info: TraceRequestInfo,
    #[serde(rename = "response")]
    pub resp_info: TraceResponseInfo,
    #[serde(rename = "stats")]
    pub call_stats: TraceCallStats,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceRequestInfo {
    pub time: DateTime,
    pub proto: String,
    pub method: String,
    pub path: String,
    #[serde(rename = "rawquery")]
    pub raw_query: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
    pub client: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceResponseInfo {
    pub time: DateTime,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "statuscode")]
    pub status_code: u16,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceCallStats {
    #[serde(rename = "inputbytes")]
    pub input_bytes: usize,
    #[serde(rename = "outputbytes")]
    pub output_bytes: usize,
    #[serde(with = "duration_nanos")]
    pub latency: Duration,
    #[serde(rename = "timetofirstbyte", with = "duration_nanos")]
    pub time_to_first_byte: Duration,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageTrace {
    #[serde(rename = "nodename")]
    pub node_name: String,
    #[serde(rename = "funcname")]
    pub fn_name: String,
    pub time: DateTime,
    pub path: String,
    #[serde(with = "duration_nanos")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OsTrace {
    #[serde(rename = "nodename")]
    pub node_name: String,
    #[serde(rename = "funcname")]
    pub fn_name: String,
    pub time: DateTime,
    pub path: String,
    #[serde(with = "duration_nanos")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl TraceInfo {
    pub fn node_name(&self) -> &str {
        match self {
            TraceInfo::Http(t) => &t.node_name,
            TraceInfo::Storage(t) => &t.node_name,
            TraceInfo::Os(t) => &t.node_name,
        }
    }

    pub fn latency(&self) -> Duration {
        match self {
            TraceInfo::Http(t) => t.call_stats.latency,
            TraceInfo::Storage(t) => t.duration,
            TraceInfo::Os(t) => t.duration,
        }
    }

    /// HTTP calls fail with a 4xx/5xx status, storage and OS calls when
    /// they carry an error.
    pub fn is_failure(&self) -> bool {
        match self {
            TraceInfo::Http(t) => t.resp_info.status_code >= 400,
            TraceInfo::Storage(t) => t.error.is_some(),
            TraceInfo::Os(t) => t.error.is_some(),
        }
    }
}

/// Which traces a client asked to receive.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceOpts {
    pub only_errors: bool,
    pub s3: bool,
    pub internal: bool,
    pub storage: bool,
    pub os: bool,
    #[serde(with = "duration_nanos")]
    pub threshold: Duration,
}

impl TraceOpts {
    /// Parses `err`, `s3`, `internal`, `storage`, `os`, `all` and
    /// `threshold` query values.
    pub fn from_query(query: &HashMap<String, String>) -> anyhow::Result<TraceOpts> {
        let flag = |key: &str| query.get(key).map(|v| v == "true").unwrap_or(false);
        let mut opts = TraceOpts {
            only_errors: flag("err"),
            s3: flag("s3"),
            internal: flag("internal"),
            storage: flag("storage"),
            os: flag("os"),
            threshold: Duration::ZERO,
        };
        if flag("all") {
            opts.s3 = true;
            opts.internal = true;
            opts.storage = true;
            opts.os = true;
        }
        if let Some(t) = query.get("threshold").filter(|t| !t.is_empty()) {
            opts.threshold = humantime::parse_duration(t)?;
        }
        Ok(opts)
    }

    /// Encodes the options back into a peer request query.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("err", self.only_errors.to_string()),
            ("s3", self.s3.to_string()),
            ("internal", self.internal.to_string()),
            ("storage", self.storage.to_string()),
            ("os", self.os.to_string()),
        ];
        if self.threshold > Duration::ZERO {
            query.push((
                "threshold",
                humantime::format_duration(self.threshold).to_string(),
            ));
        }
        query
    }

    pub fn must_trace(&self, entry: &TraceInfo) -> bool {
        if self.threshold > Duration::ZERO && entry.latency() < self.threshold {
            return false;
        }
        let wanted = match entry {
            TraceInfo::Http(t) => {
                if t.req_info
                    .path
                    .starts_with(SYSTEM_RESERVED_BUCKET_PATH_WITH_SLASH)
                {
                    self.internal
                } else {
                    self.s3
                }
            }
            TraceInfo::Storage(_) => self.storage,
            TraceInfo::Os(_) => self.os,
        };
        wanted && (!self.only_errors || entry.is_failure())
    }
}

pub(crate) mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_nanos() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_nanos(u64::deserialize(d)?))
    }
}
