use regex::Regex;

fn non_path_identifiers() -> &'static [Regex] {
    use std::sync::OnceLock;

    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            vec![
                Regex::new(r"(?i)^anon:").expect("invalid anonymous layer regex"),
                Regex::new(r"(?i)^[a-z][a-z0-9+.\-]+://").expect("invalid URI scheme regex"),
            ]
        })
        .as_slice()
}

/// Determine whether a layer identifier can be interpreted as a filesystem location.
///
/// Anonymous in-memory layers and URI-style identifiers have no directory on disk, so they
/// can never anchor a relative asset path.
pub fn is_path_like_identifier(identifier: &str) -> bool {
    !identifier.trim().is_empty()
        && !non_path_identifiers()
            .iter()
            .any(|pattern| pattern.is_match(identifier))
}

#[cfg(test)]
mod tests {
    use super::is_path_like_identifier;

    #[test]
    fn rejects_anonymous_layers() {
        assert!(!is_path_like_identifier("anon:0x7f91a2c0:tmp.usda"));
        assert!(!is_path_like_identifier("ANON:1"));
    }

    #[test]
    fn rejects_uri_identifiers() {
        assert!(!is_path_like_identifier("omniverse://server/scene.usd"));
        assert!(!is_path_like_identifier("https://example.com/a.usda"));
    }

    #[test]
    fn rejects_blank_identifiers() {
        assert!(!is_path_like_identifier("  "));
    }

    #[test]
    fn keeps_filesystem_paths() {
        assert!(is_path_like_identifier("/scene/shot.usda"));
        assert!(is_path_like_identifier("layers/shot.usda"));
        assert!(is_path_like_identifier("C:/scene/shot.usda"));
    }
}
