use crate::config::EnvSnapshot;

const PROXY_KEYS: &[&str] = &[
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
    "NO_PROXY",
    "no_proxy",
];

/// Decide whether the HTTP client should honor standard proxy environment variables.
///
/// Behavior:
/// - `DREST_KEEP_PROXIES=1/true/yes/on` forces proxies on.
/// - `DREST_KEEP_PROXIES=0/false/no/off/""` forces proxies off.
/// - If unset, proxies are enabled only when at least one proxy env var is set.
pub(crate) fn keep_proxies(snapshot: &EnvSnapshot) -> bool {
    match snapshot.flag("DREST_KEEP_PROXIES") {
        Some(keep) => keep,
        None => PROXY_KEYS.iter().any(|key| snapshot.var(key).is_some()),
    }
}
