//! Shared low-level helpers used across the crate.

pub mod synchronization;

/// Canonicalise a unit identifier to its internal form (`a/b/C`).
///
/// Dotted names (`a.b.C`) are accepted everywhere an identifier is taken from the user.
#[must_use]
pub fn internal_name(name: &str) -> String {
    name.trim().replace('.', "/")
}

/// Canonicalise a package namespace to an internal prefix ending in `/`.
///
/// `com.example.internal` only covers units inside that package, never
/// `com/example/internalTools`. Empty input stays empty.
#[must_use]
pub fn namespace_prefix(namespace: &str) -> String {
    let mut prefix = internal_name(namespace);
    if !prefix.is_empty() && !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

/// Render an internal name in dotted form for display.
#[must_use]
pub fn dotted_name(name: &str) -> String {
    name.replace('/', ".")
}
