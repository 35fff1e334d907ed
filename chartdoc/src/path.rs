//! Resolution of data references relative to the document store.

use std::path::{Path, PathBuf};

use log::debug;

/// Decides whether data references point outside of the document store and,
/// if not, where inside the store they live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathResolver {
    // The host (including the port, if any) of the current runtime. When not
    // set, every reference that names a host is considered external.
    host: Option<String>,
}

impl PathResolver {
    /// Constructor.
    pub fn new<S: AsRef<str>>(host: Option<S>) -> Self {
        Self {
            host: host.map(|h| h.as_ref().to_lowercase()),
        }
    }

    /// Returns true if and only if the given reference names a host that
    /// differs from the runtime's host.
    ///
    /// Relative references and references without an authority component
    /// (like `file:` or `data:` URLs) resolve against the runtime host and are
    /// therefore never external.
    pub fn is_external(&self, reference: &str) -> bool {
        match host_of(reference) {
            Some(host) => self.host.as_deref() != Some(host.as_str()),
            None => false,
        }
    }

    /// Joins the directory of the document at `base_path` with the file name
    /// of the given reference.
    ///
    /// Only the base name of the reference is kept, so references into nested
    /// directories are resolved next to the document. The target is not
    /// checked for existence.
    pub fn resolve<P: AsRef<Path>>(&self, base_path: P, reference: &str) -> PathBuf {
        let dir = base_path.as_ref().parent().unwrap_or_else(|| Path::new(""));
        let file_name = base_name(reference);
        if file_name.len() != reference.len() {
            debug!(
                "Keeping only the file name of data reference \"{}\": \"{}\"",
                reference, file_name
            );
        }
        dir.join(file_name)
    }
}

/// The last path segment of the given reference, without any query string
/// or fragment.
pub fn base_name(reference: &str) -> &str {
    let path = reference
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or(reference);
    path.rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(path)
}

// Extracts the lowercase `host[:port]` part of an absolute or
// scheme-relative URL.
fn host_of(reference: &str) -> Option<String> {
    let rest = reference.trim();
    let after_scheme = match rest.strip_prefix("//") {
        Some(r) => r,
        None => {
            let (scheme, r) = rest.split_once(':')?;
            if !is_scheme(scheme) {
                return None;
            }
            r.strip_prefix("//")?
        }
    };
    let authority = after_scheme
        .split(|c: char| c == '/' || c == '?' || c == '#' || c == '\\')
        .next()
        .unwrap_or("");
    let host = match authority.rsplit_once('@') {
        Some((_, host)) => host,
        None => authority,
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => (),
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn relative_references_are_local() {
        let resolver = PathResolver::new(Some("localhost:8888"));
        assert!(!resolver.is_external("cars.csv"));
        assert!(!resolver.is_external("data/cars.csv"));
        assert!(!resolver.is_external("../cars.csv"));
        assert!(!resolver.is_external("/files/cars.csv"));
        assert!(!resolver.is_external("file:///tmp/cars.csv"));
        assert!(!resolver.is_external("C:\\data\\cars.csv"));
    }

    #[test]
    fn other_hosts_are_external() {
        let resolver = PathResolver::new(Some("localhost:8888"));
        assert!(resolver.is_external("https://vega.github.io/data/cars.json"));
        assert!(resolver.is_external("//cdn.example.com/cars.json"));
        assert!(resolver.is_external("http://localhost:9999/cars.json"));
        assert!(!resolver.is_external("http://LOCALHOST:8888/files/cars.json"));
        assert!(!resolver.is_external("http://user@localhost:8888/files/cars.json"));
    }

    #[test]
    fn without_runtime_host_every_host_is_external() {
        let resolver = PathResolver::default();
        assert!(resolver.is_external("http://localhost/cars.json"));
        assert!(!resolver.is_external("cars.json"));
    }

    #[test]
    fn resolution_keeps_only_the_base_name() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.resolve("notebooks/chart.vl.json", "other.csv"),
            PathBuf::from("notebooks/other.csv")
        );
        assert_eq!(
            resolver.resolve("notebooks/chart.vl.json", "nested/dir/other.csv"),
            PathBuf::from("notebooks/other.csv")
        );
        assert_eq!(resolver.resolve("chart.vl.json", "other.csv"), PathBuf::from("other.csv"));
    }

    #[test]
    fn resolution_drops_queries_and_fragments() {
        let resolver = PathResolver::new(Some("localhost:8888"));
        let url = "http://localhost:8888/files/data/x.csv?token=abc#top";
        assert!(!resolver.is_external(url));
        assert_eq!(resolver.resolve("charts/c.vl.json", url), PathBuf::from("charts/x.csv"));
        assert_eq!(base_name("x.csv#frag"), "x.csv");
    }
}
