use std::path::{Component, Path, PathBuf};

/// Characters that are not allowed in a file name on at least one platform.
const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Reduce an untrusted name to a bare, portable file name.
///
/// Any directory part is dropped (only the last normal component survives),
/// forbidden and control characters become `_`, and leading/trailing dots
/// and spaces are trimmed. May return an empty string.
pub fn clean_file_name(name: &str) -> String {
    let unified = name.replace('\\', "/");
    let last = Path::new(&unified)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .next_back()
        .unwrap_or_default();

    let replaced: String = last
        .chars()
        .map(|c| if c.is_control() || FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();

    replaced.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_string()
}

/// Split a file name into its complete base name and last suffix.
///
/// `archive.tar.gz` splits into `("archive.tar", Some("gz"))`; a name without
/// a dot, or with a single leading dot, has no suffix.
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Pick a path in `dir` for `name` that does not exist yet.
///
/// Collisions are resolved by inserting a counter before the suffix:
/// `photo.png`, `photo-1.png`, `photo-2.png`, ...
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (base, suffix) = split_name(name);
    let mut index = 1u32;
    loop {
        let file_name = match suffix {
            Some(suffix) => format!("{base}-{index}.{suffix}"),
            None => format!("{base}-{index}"),
        };
        let candidate = dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }
        index += 1;
    }
}

/// Staging location for `destination`: same directory, name prefixed.
pub fn staging_path(destination: &Path, prefix: &str) -> PathBuf {
    let file_name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staged = format!("{prefix}{file_name}");
    match destination.parent() {
        Some(parent) => parent.join(staged),
        None => PathBuf::from(staged),
    }
}
