/// Length of the extension (dot included) carried by image file names
pub const EXTENSION_LEN: usize = 4;

/// Drop the trailing extension from a file name to recover its roster key.
///
/// File names are always `<key>.<ext>` with a three letter extension, so this
/// strips a fixed number of characters rather than looking for the last dot.
/// Names too short to carry an extension yield `None`.
pub fn strip_extension(file_name: &str) -> Option<&str> {
    let cut = file_name
        .char_indices()
        .rev()
        .nth(EXTENSION_LEN - 1)
        .map(|(index, _)| index)?;
    if cut == 0 {
        return None;
    }
    Some(&file_name[..cut])
}

/// Escape text for inclusion in an HTML event description
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
