use relative_path::RelativePathBuf;

pub const SLASH_SEPARATOR: &str = "/";

/// Joins `elements` into a normalized slash path. A leading slash on the
/// first element and a trailing slash on the last one are kept, so heal
/// paths of prefixes stay distinct from paths of objects.
pub fn path_join(elements: &[&str]) -> String {
    let (first, last) = match (elements.first(), elements.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return String::new(),
    };
    let joined = elements
        .iter()
        .fold(RelativePathBuf::new(), |mut p, e| {
            p.push(e);
            p
        })
        .normalize();

    let mut path = String::new();
    if first.starts_with(SLASH_SEPARATOR) {
        path.push_str(SLASH_SEPARATOR);
    }
    path.push_str(joined.as_str());
    if last.ends_with(SLASH_SEPARATOR) && !path.ends_with(SLASH_SEPARATOR) {
        path.push_str(SLASH_SEPARATOR);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_join() {
        let cases = vec![
            (vec![], ""),
            (vec![""], ""),
            (vec!["photos"], "photos"),
            (vec!["photos", "a.png"], "photos/a.png"),
            (vec!["photos", ""], "photos"),
            (vec!["", "a.png"], "a.png"),
            (vec!["/", "hulk"], "/hulk"),
            (vec!["/", ""], "/"),
            (vec!["photos/", "2021/./a.png"], "photos/2021/a.png"),
            (vec!["photos", "2021/"], "photos/2021/"),
            (vec!["photos", "2021/../2022/"], "photos/2022/"),
        ];
        for (elements, path) in cases {
            assert_eq!(path_join(&elements), path, "{:?}", elements);
        }
    }
}
