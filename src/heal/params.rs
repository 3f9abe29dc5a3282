use std::collections::HashMap;

use crate::admin::HealOpts;
use crate::errors::ApiError;
use crate::s3utils;

pub const HEAL_CLIENT_TOKEN: &str = "clientToken";
pub const HEAL_FORCE_START: &str = "forceStart";
pub const HEAL_FORCE_STOP: &str = "forceStop";

/// Validated parameters of a heal request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealInitParams {
    pub bucket: String,
    pub obj_prefix: String,
    pub hs: HealOpts,
    pub client_token: String,
    pub force_start: bool,
    pub force_stop: bool,
}

/// Validates a heal request. Flags are enabled by the mere presence of
/// their query key. The body is only read when no client token is given.
pub fn extract_heal_init_params(
    bucket: &str,
    obj_prefix: &str,
    query: &HashMap<String, String>,
    body: &[u8],
) -> Result<HealInitParams, ApiError> {
    if bucket.is_empty() && !obj_prefix.is_empty() {
        return Err(ApiError::HealMissingBucket);
    }
    if !bucket.is_empty() && s3utils::is_reserved_or_invalid_bucket(bucket, false) {
        return Err(ApiError::InvalidBucketName);
    }
    if !s3utils::is_valid_object_prefix(obj_prefix) {
        return Err(ApiError::InvalidObjectName);
    }

    let mut hip = HealInitParams {
        bucket: bucket.to_owned(),
        obj_prefix: obj_prefix.to_owned(),
        client_token: query.get(HEAL_CLIENT_TOKEN).cloned().unwrap_or_default(),
        force_start: query.contains_key(HEAL_FORCE_START),
        force_stop: query.contains_key(HEAL_FORCE_STOP),
        ..Default::default()
    };

    if (hip.force_start && hip.force_stop)
        || (!hip.client_token.is_empty() && (hip.force_start || hip.force_stop))
    {
        return Err(ApiError::InvalidRequest);
    }

    if hip.client_token.is_empty() {
        hip.hs = serde_json::from_slice(body).map_err(|_| ApiError::RequestBodyParse)?;
    }
    Ok(hip)
}

#[cfg(test)]
mod tests {
    use maplit::hashmap;

    use super::*;

    const OPTS: &[u8] = br#"{"recursive":true,"dryRun":false}"#;

    #[test]
    fn test_extract_heal_init_params() {
        let none = HashMap::new();
        let cases: Vec<(&str, &str, HashMap<String, String>, &[u8], Option<ApiError>)> = vec![
            ("", "", none.clone(), OPTS, None),
            ("photos", "2021/", none.clone(), OPTS, None),
            ("", "2021/", none.clone(), OPTS, Some(ApiError::HealMissingBucket)),
            ("hulk", "", none.clone(), OPTS, Some(ApiError::InvalidBucketName)),
            (".hulk.sys", "", none.clone(), OPTS, Some(ApiError::InvalidBucketName)),
            ("photos", "a/../b", none.clone(), OPTS, Some(ApiError::InvalidObjectName)),
            ("photos", "a//b", none.clone(), OPTS, Some(ApiError::InvalidObjectName)),
            (
                "photos",
                "",
                hashmap! { "forceStart".to_owned() => "".to_owned(), "forceStop".to_owned() => "".to_owned() },
                OPTS,
                Some(ApiError::InvalidRequest),
            ),
            (
                "photos",
                "",
                hashmap! { "clientToken".to_owned() => "t".to_owned(), "forceStop".to_owned() => "".to_owned() },
                OPTS,
                Some(ApiError::InvalidRequest),
            ),
            ("photos", "", none.clone(), b"{", Some(ApiError::RequestBodyParse)),
            (
                "photos",
                "",
                hashmap! { "clientToken".to_owned() => "t".to_owned() },
                b"not json",
                None,
            ),
        ];
        for (bucket, prefix, query, body, expected) in cases {
            let res = extract_heal_init_params(bucket, prefix, &query, body);
            match expected {
                None => assert!(res.is_ok(), "{}/{}", bucket, prefix),
                Some(code) => assert_eq!(res.unwrap_err(), code, "{}/{}", bucket, prefix),
            }
        }
    }

    #[test]
    fn test_flags_enabled_by_presence() {
        let query = hashmap! { "forceStart".to_owned() => "false".to_owned() };
        let hip = extract_heal_init_params("photos", "", &query, OPTS).unwrap();
        assert!(hip.force_start);
        assert!(!hip.force_stop);
        assert!(hip.hs.recursive);

        let query = hashmap! { "clientToken".to_owned() => "abc".to_owned() };
        let hip = extract_heal_init_params("photos", "", &query, b"").unwrap();
        assert_eq!(hip.client_token, "abc");
        assert_eq!(hip.hs, HealOpts::default());
    }
}
