//! Action and endpoint path normalization

use percent_encoding::percent_decode_str;
use url::Url;

/// Reduce a form action to the path it posts to.
///
/// An absolute URL contributes only its path; anything else is taken as a
/// path already and kept as written. The parsed path is percent-decoded so
/// `http://t/a b` and `/a b` agree. The result always starts with `/` and has
/// no trailing `/` unless it is exactly `/`.
pub fn normalize_action(action: &str) -> String {
    if action.is_empty() {
        return String::from("/");
    }

    let path = match Url::parse(action) {
        Ok(url) if url.has_host() => percent_decode_str(url.path())
            .decode_utf8_lossy()
            .into_owned(),
        _ => action.to_string(),
    };

    let mut path = if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    };

    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}
