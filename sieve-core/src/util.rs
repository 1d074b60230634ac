use std::borrow::Cow;

/// Writes every value with `f`, putting `separator` between the ones that wrote something.
pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

/// Shortens long statements for error messages and logs.
pub fn truncate_long(text: &str) -> Cow<'_, str> {
    match text.char_indices().nth(497) {
        Some((end, _)) => format!("{}...", text[..end].trim_end()).into(),
        None => text.into(),
    }
}
