use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Origin of a log record, used to filter console log streams.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
pub enum ErrKind {
    #[serde(rename = "HULK")]
    #[strum(serialize = "HULK")]
    Hulk,
    #[serde(rename = "APPLICATION")]
    #[strum(serialize = "APPLICATION")]
    Application,
    #[serde(rename = "ALL")]
    #[strum(serialize = "ALL")]
    All,
}

impl Default for ErrKind {
    fn default() -> Self {
        ErrKind::Hulk
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Entry {
    pub level: String,
    #[serde(rename = "errKind")]
    pub kind: ErrKind,
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api: Option<Api>,
    #[serde(rename = "remotehost", skip_serializing_if = "String::is_empty", default)]
    pub remote_host: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub host: String,
    #[serde(rename = "requestID", skip_serializing_if = "String::is_empty", default)]
    pub request_id: String,
    #[serde(rename = "userAgent", skip_serializing_if = "String::is_empty", default)]
    pub user_agent: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<Trace>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Api {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub args: Option<Args>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Trace {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub source: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub variables: HashMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Args {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub bucket: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub object: String,
}
