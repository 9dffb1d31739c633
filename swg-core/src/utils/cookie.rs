//! Cookie string helpers.

/// Value of the first cookie called `name` in a `document.cookie` style
/// string (`a=1; b=2`).
///
/// Whitespace around the name and the `=` is ignored. Empty values count as
/// absent, and so do whitespace-only values, where a regex such as
/// `(^|;)\s*name\s*=\s*([^;]+)` would backtrack and return a single space.
pub fn find_cookie<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies.split(';').find_map(|pair| {
        let rest = pair.trim_start().strip_prefix(name)?;
        let value = rest.trim_start().strip_prefix('=')?.trim_start();
        (!value.is_empty()).then_some(value)
    })
}
