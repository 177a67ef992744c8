use crate::defaults::{
    HTTPS_PROXY_KEY, HTTP_PROXY_KEY, JUJU_HTTPS_PROXY, JUJU_HTTP_PROXY, JUJU_NO_PROXY,
    NO_PROXY_KEY,
};
use crate::env::EnvStore;
use crate::error::{ProxyLibError, Result, UrlDefect};
use std::collections::BTreeMap;
use url::{ParseError, Url};

const SUPPORTED_SCHEMES: [&str; 2] = ["http", "https"];

/// The Juju proxy variables exactly as they were found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProxyEnv {
    pub https_proxy: String,
    pub http_proxy: String,
    pub no_proxy: String,
}

impl RawProxyEnv {
    /// Pairs keyed by the Juju variable names
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (JUJU_HTTPS_PROXY, self.https_proxy.as_str()),
            (JUJU_HTTP_PROXY, self.http_proxy.as_str()),
            (JUJU_NO_PROXY, self.no_proxy.as_str()),
        ]
        .into_iter()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }
}

/// Proxy settings after URL validation and no_proxy merging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedProxyConfig {
    pub http_proxy: String,
    pub https_proxy: String,
    pub no_proxy: String,
}

impl ValidatedProxyConfig {
    /// Lower case key/value pairs in sorted key order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (HTTP_PROXY_KEY, self.http_proxy.as_str()),
            (HTTPS_PROXY_KEY, self.https_proxy.as_str()),
            (NO_PROXY_KEY, self.no_proxy.as_str()),
        ]
        .into_iter()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }
}

/// Read the three Juju proxy variables without validating them
pub fn raw<E: EnvStore + ?Sized>(env: &E) -> Result<RawProxyEnv> {
    let read = |name: &str| env.get(name).ok_or_else(|| ProxyLibError::missing_var(name));

    Ok(RawProxyEnv {
        https_proxy: read(JUJU_HTTPS_PROXY)?,
        http_proxy: read(JUJU_HTTP_PROXY)?,
        no_proxy: read(JUJU_NO_PROXY)?,
    })
}

/// Read and validate the Juju proxy variables
///
/// Returns `Ok(None)` without touching `env` when proxying is disabled
/// `add_no_proxies` are placed at the front of the no_proxy list unless the
/// user already listed them
pub fn validated<E, S>(
    env: &E,
    enabled: bool,
    add_no_proxies: &[S],
) -> Result<Option<ValidatedProxyConfig>>
where
    E: EnvStore + ?Sized,
    S: AsRef<str>,
{
    if !enabled {
        return Ok(None);
    }

    let raw = raw(env)?;
    validate_proxy_url(&raw.https_proxy)?;
    validate_proxy_url(&raw.http_proxy)?;

    Ok(Some(ValidatedProxyConfig {
        http_proxy: raw.http_proxy,
        https_proxy: raw.https_proxy,
        no_proxy: merge_no_proxy(&raw.no_proxy, add_no_proxies),
    }))
}

/// Check that a proxy URL is empty or an absolute http(s) URL with a host
pub fn validate_proxy_url(value: &str) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }

    match Url::parse(value) {
        Ok(url) => {
            if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
                return Err(ProxyLibError::invalid_url(value, UrlDefect::UnsupportedScheme));
            }
            // The parser fills in a host for `http:host` and `http:///host`.
            let has_host = url.host_str().is_some_and(|host| !host.is_empty());
            if has_host && !authority(value).is_empty() {
                Ok(())
            } else {
                Err(ProxyLibError::invalid_url(value, UrlDefect::MissingHost))
            }
        }
        Err(err) => {
            // The parser rejects some inputs before the scheme can be inspected.
            let defect = if !has_supported_scheme(value) {
                UrlDefect::UnsupportedScheme
            } else if err == ParseError::EmptyHost {
                UrlDefect::MissingHost
            } else {
                UrlDefect::Malformed(err.to_string())
            };
            Err(ProxyLibError::invalid_url(value, defect))
        }
    }
}

/// Text between `<scheme>://` and the path, empty when there is no `//`
fn authority(value: &str) -> &str {
    let Some((_, rest)) = value.split_once(':') else {
        return "";
    };
    let Some(rest) = rest.strip_prefix("//") else {
        return "";
    };
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

fn has_supported_scheme(value: &str) -> bool {
    value
        .split_once(':')
        .map(|(scheme, _)| {
            SUPPORTED_SCHEMES
                .iter()
                .any(|supported| scheme.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Split a comma separated host list, trimming entries and dropping empty ones
pub fn split_no_proxy(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Put `defaults` in front of the user's no_proxy entries
///
/// Nothing appears twice and the user's entries keep their relative order
/// Merging the same defaults again yields the same string
pub fn merge_no_proxy<S: AsRef<str>>(user: &str, defaults: &[S]) -> String {
    let mut merged: Vec<String> = Vec::new();
    let candidates = defaults
        .iter()
        .map(|entry| entry.as_ref().trim().to_string())
        .filter(|entry| !entry.is_empty())
        .chain(split_no_proxy(user));

    for entry in candidates {
        if !merged.contains(&entry) {
            merged.push(entry);
        }
    }
    merged.join(",")
}
