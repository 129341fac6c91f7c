use std::collections::BTreeSet;

/// Splits `name` at a known extension (dot included). Names that do not end
/// with it are treated as having no extension.
pub fn split_known_extension<'a>(name: &'a str, extension: &'a str) -> (&'a str, &'a str) {
    match name.strip_suffix(extension) {
        Some(stem) if !extension.is_empty() => (stem, extension),
        _ => (name, ""),
    }
}

/// Returns `stem + extension` if free, otherwise the first free
/// `stem (n) + extension` for n = 1, 2, ...
pub fn resolve_parts<F>(stem: &str, extension: &str, mut is_taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    let candidate = format!("{stem}{extension}");
    if !is_taken(&candidate) {
        return candidate;
    }
    let mut counter: u64 = 1;
    loop {
        let suffixed = format!("{stem} ({counter}){extension}");
        if !is_taken(&suffixed) {
            return suffixed;
        }
        counter += 1;
    }
}

/// Resolves `candidate` against the committed set. `extension` is the
/// candidate's real extension; suffixes are inserted in front of it.
pub fn resolve_collision(
    candidate: &str,
    extension: &str,
    committed: &BTreeSet<String>,
) -> String {
    let (stem, extension) = split_known_extension(candidate, extension);
    resolve_parts(stem, extension, |name| committed.contains(name))
}
