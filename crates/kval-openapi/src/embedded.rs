//! Schema documents and patches compiled into the binary.
//!
//! Tables are keyed by Kubernetes minor version and OpenAPI path
//! (`api/v1`, `apis/<group>/<version>`).

const BUILTIN_SCHEMAS: &[(&str, &str, &str)] = &[(
    "1.27",
    "api/v1",
    include_str!("../builtins/1.27/api/v1.json"),
)];

const BUILTIN_PATCHES: &[(&str, &str, &str)] = &[(
    "1.27",
    "api/v1",
    include_str!("../builtins/patches/1.27/api/v1.json"),
)];

/// Reduce a Kubernetes version to `<major>.<minor>`.
///
/// Accepts `1.27`, `v1.27` and `1.27.3`; returns `None` for anything else,
/// including the empty string.
pub fn normalize_version(version: &str) -> Option<String> {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    let mut parts = version.split('.');
    let major = parts.next().filter(|p| is_number(p))?;
    let minor = parts.next().filter(|p| is_number(p))?;
    Some(format!("{major}.{minor}"))
}

fn is_number(part: &str) -> bool {
    !part.is_empty() && part.chars().all(|c| c.is_ascii_digit())
}

fn lookup(table: &'static [(&str, &str, &str)], version: &str, path: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(v, p, _)| *v == version && *p == path)
        .map(|(_, _, text)| *text)
}

pub(crate) fn schema(version: &str, path: &str) -> Option<&'static str> {
    lookup(BUILTIN_SCHEMAS, version, path)
}

pub(crate) fn patch(version: &str, path: &str) -> Option<&'static str> {
    lookup(BUILTIN_PATCHES, version, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_normalization() {
        assert_eq!(normalize_version("1.27").as_deref(), Some("1.27"));
        assert_eq!(normalize_version("v1.27").as_deref(), Some("1.27"));
        assert_eq!(normalize_version("1.27.3").as_deref(), Some("1.27"));
        assert_eq!(normalize_version(""), None);
        assert_eq!(normalize_version("latest"), None);
        assert_eq!(normalize_version("1"), None);
    }

    #[test]
    fn embedded_documents_parse() {
        for (version, path, text) in BUILTIN_SCHEMAS.iter().chain(BUILTIN_PATCHES) {
            assert!(
                serde_json::from_str::<serde_json::Value>(text).is_ok(),
                "{version}/{path} is not valid JSON"
            );
        }
        assert!(schema("1.27", "api/v1").is_some());
        assert!(schema("1.27", "apis/apps/v1").is_none());
    }
}
