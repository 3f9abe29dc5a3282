mod datetime;
mod path;

pub use datetime::*;
pub use path::*;

pub fn parse_bool(s: &str) -> anyhow::Result<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(anyhow::anyhow!("provided string was not a boolean string")),
    }
}

pub fn parse_bool_ext(s: &str) -> anyhow::Result<bool> {
    match s {
        "on" | "ON" | "On" | "enabled" | "ENABLED" | "Enabled" => Ok(true),
        "off" | "OFF" | "Off" | "disabled" | "DISABLED" | "Disabled" => Ok(false),
        _ => parse_bool(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_ext() {
        assert!(parse_bool_ext("on").unwrap());
        assert!(parse_bool_ext("true").unwrap());
        assert!(!parse_bool_ext("Disabled").unwrap());
        assert!(!parse_bool_ext("0").unwrap());
        assert!(parse_bool_ext("maybe").is_err());
    }
}
