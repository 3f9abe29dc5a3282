use std::fmt::Display;

use log::error;

use super::{Api, Args, Entry, ErrKind, ReqInfo, Trace};
use crate::utils::{self, DateTimeFormatExt};

#[derive(strum::Display, Debug)]
enum Level {
    #[strum(serialize = "ERROR")]
    Error,
}

/// Logs `err` as a structured entry carrying the request tags.
pub fn log_if<E: Display + ?Sized>(req: &ReqInfo, err: &E, err_kind: Option<ErrKind>) {
    let entry = build_entry(req, err, err_kind);
    match serde_json::to_string(&entry) {
        Ok(entry) => error!("{}", entry),
        Err(_) => error!("{:?}", entry),
    }
}

fn build_entry<E: Display + ?Sized>(req: &ReqInfo, err: &E, err_kind: Option<ErrKind>) -> Entry {
    let api = if req.api.is_empty() {
        "SYSTEM".to_owned()
    } else {
        req.api.clone()
    };

    Entry {
        level: Level::Error.to_string(),
        kind: err_kind.unwrap_or(ErrKind::Hulk),
        time: utils::now().rfc3339_nano(),
        api: Some(Api {
            name: api,
            args: Some(Args {
                bucket: req.bucket_name.clone(),
                object: req.object_name.clone(),
            }),
        }),
        remote_host: req.remote_host.clone(),
        host: req.host.clone(),
        request_id: req.request_id.clone(),
        user_agent: req.user_agent.clone(),
        message: "".to_owned(),
        error: Some(Trace {
            message: err.to_string(),
            source: Vec::new(),
            variables: req.get_tags_map(),
        }),
    }
}
