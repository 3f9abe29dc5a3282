use anyhow::bail;
use lazy_static::lazy_static;
use regex::Regex;

use crate::globals::{SYSTEM_META_BUCKET, SYSTEM_RESERVED_BUCKET};
use crate::utils::SLASH_SEPARATOR;

lazy_static! {
    static ref VALID_BUCKET_NAME: Regex =
        Regex::new(r#"^[A-Za-z0-9][A-Za-z0-9\.\-_:]{1,61}[A-Za-z0-9]$"#).unwrap();
    static ref VALID_BUCKET_NAME_STRICT: Regex =
        Regex::new(r#"^[a-z0-9][a-z0-9\.\-]{1,61}[a-z0-9]$"#).unwrap();
    static ref IP_ADDRESS: Regex = Regex::new(r#"^(\d+\.){3}\d+$"#).unwrap();
}

// Checks if we have a valid input bucket name.
pub fn check_valid_bucket_name(bucket_name: &str) -> anyhow::Result<()> {
    check_bucket_name_common(bucket_name, false)
}

// Checks if we have a valid input bucket name.
// This is a stricter version.
// - http://docs.aws.amazon.com/AmazonS3/latest/dev/UsingBucket.html
pub fn check_valid_bucket_name_strict(bucket_name: &str) -> anyhow::Result<()> {
    check_bucket_name_common(bucket_name, true)
}

fn check_bucket_name_common(bucket_name: &str, strict: bool) -> anyhow::Result<()> {
    if bucket_name.trim().is_empty() {
        bail!("Bucket name cannot be empty");
    }
    if bucket_name.len() < 3 {
        bail!("Bucket name cannot be shorter than 3 characters");
    }
    if bucket_name.len() > 63 {
        bail!("Bucket name cannot be longer than 63 characters");
    }
    if IP_ADDRESS.is_match(bucket_name) {
        bail!("Bucket name cannot be an ip address");
    }
    if bucket_name.contains("..") || bucket_name.contains(".-") || bucket_name.contains("-.") {
        bail!("Bucket name contains invalid characters");
    }
    if strict && !VALID_BUCKET_NAME_STRICT.is_match(bucket_name) {
        bail!("Bucket name contains invalid characters");
    }
    if !VALID_BUCKET_NAME.is_match(bucket_name) {
        bail!("Bucket name contains invalid characters");
    }
    Ok(())
}

/// Reports buckets that must never be addressed by admin requests: empty,
/// malformed, or one of the system reserved names.
pub fn is_reserved_or_invalid_bucket(bucket: &str, strict: bool) -> bool {
    let bucket = bucket.trim_end_matches(SLASH_SEPARATOR);
    if bucket.is_empty() {
        return true;
    }
    let checked = if strict {
        check_valid_bucket_name_strict(bucket)
    } else {
        check_valid_bucket_name(bucket)
    };
    if checked.is_err() {
        return true;
    }
    bucket == SYSTEM_META_BUCKET || bucket == SYSTEM_RESERVED_BUCKET
}

// Checks for "." and ".." path components.
pub fn has_bad_path_component(path: &str) -> bool {
    path.split(|c| c == '/' || (cfg!(windows) && c == '\\'))
        .map(str::trim)
        .any(|p| p == "." || p == "..")
}

/// Validates an object prefix. An empty prefix is valid.
pub fn is_valid_object_prefix(object: &str) -> bool {
    if has_bad_path_component(object) {
        return false;
    }
    if object.contains("//") {
        return false;
    }
    // Valid for S3, but no file system can store it.
    !object.contains('\u{0}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_valid_bucket_name() {
        assert!(check_valid_bucket_name("photos").is_ok());
        assert!(check_valid_bucket_name("my.bucket-01").is_ok());
        assert!(check_valid_bucket_name("ab").is_err());
        assert!(check_valid_bucket_name("192.168.1.1").is_err());
        assert!(check_valid_bucket_name("a..b").is_err());
        assert!(check_valid_bucket_name_strict("Photos").is_err());
    }

    #[test]
    fn test_is_reserved_or_invalid_bucket() {
        assert!(is_reserved_or_invalid_bucket("", false));
        assert!(is_reserved_or_invalid_bucket("hulk", false));
        assert!(is_reserved_or_invalid_bucket(".hulk.sys", false));
        assert!(is_reserved_or_invalid_bucket("a", false));
        assert!(!is_reserved_or_invalid_bucket("b1b", false));
        assert!(!is_reserved_or_invalid_bucket("photos/", false));
    }

    #[test]
    fn test_is_valid_object_prefix() {
        let cases = vec![
            ("", true),
            ("dir/", true),
            ("dir/obj", true),
            ("a/../b", false),
            ("./a", false),
            ("a//b", false),
            ("a\u{0}b", false),
        ];
        for (prefix, valid) in cases {
            assert_eq!(is_valid_object_prefix(prefix), valid, "{:?}", prefix);
        }
    }
}
