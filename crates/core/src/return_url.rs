//! Post-login redirect target sanitizing.
//!
//! Only same-site relative paths are accepted. Anything that could be
//! interpreted by a browser as another origin falls back to the default.

/// Where users land when no usable return URL was supplied.
pub const DEFAULT_RETURN_PATH: &str = "/dashboard";

/// Maximum accepted length of a return path.
const MAX_RETURN_PATH_LEN: usize = 2048;

/// Return `candidate` if it is a safe relative path, otherwise
/// [`DEFAULT_RETURN_PATH`].
pub fn sanitize_return_url(candidate: Option<&str>) -> String {
    match candidate {
        Some(path) if is_safe_relative_path(path) => path.to_string(),
        _ => DEFAULT_RETURN_PATH.to_string(),
    }
}

/// `true` when `path` is a relative path on this site.
///
/// Rejects protocol-relative (`//evil.com`), backslash tricks (`/\evil.com`),
/// absolute URLs and control characters.
pub fn is_safe_relative_path(path: &str) -> bool {
    if path.is_empty() || path.len() > MAX_RETURN_PATH_LEN {
        return false;
    }
    if !path.starts_with('/') || path.starts_with("//") {
        return false;
    }
    !path.chars().any(|c| c == '\\' || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_relative_paths() {
        for ok in ["/", "/dashboard", "/drive/abc?tab=1#x", "/a/b/c"] {
            assert!(is_safe_relative_path(ok), "{ok} should be accepted");
            assert_eq!(sanitize_return_url(Some(ok)), ok);
        }
    }

    #[test]
    fn rejects_offsite_targets() {
        for bad in [
            "",
            "https://evil.com",
            "//evil.com",
            "/\\evil.com",
            "evil.com/path",
            "javascript:alert(1)",
            "/path\nSet-Cookie: x",
            "/tab\there",
        ] {
            assert!(!is_safe_relative_path(bad), "{bad:?} should be rejected");
            assert_eq!(sanitize_return_url(Some(bad)), DEFAULT_RETURN_PATH);
        }
    }

    #[test]
    fn missing_and_oversized_fall_back() {
        assert_eq!(sanitize_return_url(None), DEFAULT_RETURN_PATH);
        let long = format!("/{}", "a".repeat(MAX_RETURN_PATH_LEN));
        assert_eq!(sanitize_return_url(Some(&long)), DEFAULT_RETURN_PATH);
    }
}
