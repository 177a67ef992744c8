//! Caller-facing renderings of the validated proxy settings.
//!
//! [`environ`] never fails: a validation error is logged and kept on the
//! returned [`ProxyView`] instead. The view can then be written as a systemd
//! drop-in ([`systemd`]), turned into container env records
//! ([`container_vars`]) or overlaid on an environment store
//! ([`ProxyView::apply`]).

use crate::defaults::{DISABLED, JUJU_UNIT_NAME};
use crate::env::{EnvOverlay, EnvStore};
use crate::error::{ProxyLibError, Result};
use crate::proxy::{self, ValidatedProxyConfig};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::ops::Deref;

/// Which key spellings a view emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyCase {
    Lower,
    Upper,
    #[default]
    Both,
}

impl From<bool> for KeyCase {
    /// `true` is the `uppercase` flag: emit both spellings
    fn from(uppercase: bool) -> Self {
        if uppercase {
            KeyCase::Both
        } else {
            KeyCase::Lower
        }
    }
}

impl KeyCase {
    fn spellings(self, key: &str) -> Vec<String> {
        match self {
            KeyCase::Lower => vec![key.to_string()],
            KeyCase::Upper => vec![key.to_uppercase()],
            KeyCase::Both => vec![key.to_string(), key.to_uppercase()],
        }
    }
}

/// Ordered proxy variables, or the reason there are none
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProxyView {
    entries: Vec<(String, String)>,
    error: Option<String>,
    case: KeyCase,
}

impl ProxyView {
    pub fn empty(case: KeyCase) -> Self {
        Self {
            entries: Vec::new(),
            error: None,
            case,
        }
    }

    pub fn failed(message: impl Into<String>, case: KeyCase) -> Self {
        Self {
            entries: Vec::new(),
            error: Some(message.into()),
            case,
        }
    }

    /// Entries follow the config's key order; within a key lower case comes
    /// first. Values equal to the `disabled` sentinel are skipped in every case
    pub fn from_config(config: &ValidatedProxyConfig, case: KeyCase) -> Self {
        let entries = config
            .iter()
            .filter(|(_, value)| *value != DISABLED)
            .flat_map(|(key, value)| {
                case.spellings(key)
                    .into_iter()
                    .map(move |name| (name, value.to_string()))
            })
            .collect();
        Self {
            entries,
            error: None,
            case,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn case(&self) -> KeyCase {
        self.case
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.iter().cloned().collect()
    }

    /// Overlay this view on `env` until the returned guard is dropped
    pub fn apply<'e, E: EnvStore + ?Sized>(&self, env: &'e mut E) -> AppliedView<'_, 'e, E> {
        AppliedView {
            view: self,
            overlay: EnvOverlay::new(env, self.iter()),
        }
    }
}

impl Serialize for ProxyView {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A view whose entries are currently set in an environment store
pub struct AppliedView<'v, 'e, E: EnvStore + ?Sized> {
    view: &'v ProxyView,
    overlay: EnvOverlay<'e, E>,
}

impl<E: EnvStore + ?Sized> AppliedView<'_, '_, E> {
    pub fn env(&self) -> &E {
        self.overlay.env()
    }
}

impl<E: EnvStore + ?Sized> Deref for AppliedView<'_, '_, E> {
    type Target = ProxyView;

    fn deref(&self) -> &ProxyView {
        self.view
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOptions {
    pub enabled: bool,
    pub case: KeyCase,
    pub add_no_proxies: Vec<String>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            case: KeyCase::Both,
            add_no_proxies: Vec::new(),
        }
    }
}

/// Proxy variables for `env`, in both spellings when `uppercase` is set
pub fn environ<E: EnvStore + ?Sized>(env: &E, enabled: bool, uppercase: bool) -> ProxyView {
    environ_with(
        env,
        &ViewOptions {
            enabled,
            case: KeyCase::from(uppercase),
            ..ViewOptions::default()
        },
    )
}

pub fn environ_with<E: EnvStore + ?Sized>(env: &E, options: &ViewOptions) -> ProxyView {
    match proxy::validated(env, options.enabled, options.add_no_proxies.as_slice()) {
        Ok(Some(config)) => ProxyView::from_config(&config, options.case),
        Ok(None) => ProxyView::empty(options.case),
        Err(err) => {
            tracing::error!("Error retrieving proxy settings: {err}");
            ProxyView::failed(err.to_string(), options.case)
        }
    }
}

/// Render `view` as a systemd `[Service]` drop-in for `service_name`
///
/// Fails when `JUJU_UNIT_NAME` is missing or malformed, even for an empty view
pub fn systemd<E: EnvStore + ?Sized>(
    env: &E,
    view: &ProxyView,
    service_name: &str,
) -> Result<String> {
    let app = juju_app(env)?;
    if view.is_empty() {
        return Ok(String::new());
    }

    let mut content = String::from("[Service]\n");
    content.push_str(&format!(
        "# Autogenerated by juju_app='{app}' for service='{service_name}'\n"
    ));
    for (name, value) in view.iter() {
        content.push_str(&format!("Environment=\"{name}={value}\"\n"));
    }
    Ok(content)
}

fn juju_app<E: EnvStore + ?Sized>(env: &E) -> Result<String> {
    let unit = env
        .get(JUJU_UNIT_NAME)
        .ok_or_else(|| ProxyLibError::missing_var(JUJU_UNIT_NAME))?;
    match unit.split_once('/') {
        Some((app, number)) if is_app_name(app) && is_unit_number(number) => Ok(app.to_string()),
        _ => Err(ProxyLibError::JujuEnvironment(format!(
            "Juju environment variable '{JUJU_UNIT_NAME}' is malformed: '{unit}'"
        ))),
    }
}

fn is_app_name(app: &str) -> bool {
    !app.is_empty() && !app.chars().any(char::is_whitespace)
}

fn is_unit_number(number: &str) -> bool {
    !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit())
}

/// Container spec environment entry, shaped like the Kubernetes `EnvVar`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Builds the records [`container_vars_with`] returns
pub trait EnvVarProvider {
    type Record;

    /// Checked once per call before any record is built
    fn is_available(&self) -> bool;

    fn record(&self, name: &str, value: &str) -> Self::Record;
}

/// Produces [`EnvVar`] records when built with the `container` feature
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinEnvVars;

impl EnvVarProvider for BuiltinEnvVars {
    type Record = EnvVar;

    fn is_available(&self) -> bool {
        cfg!(feature = "container")
    }

    fn record(&self, name: &str, value: &str) -> EnvVar {
        EnvVar {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

pub fn container_vars(view: &ProxyView) -> Result<Vec<EnvVar>> {
    container_vars_with(view, &BuiltinEnvVars)
}

pub fn container_vars_with<P: EnvVarProvider>(
    view: &ProxyView,
    provider: &P,
) -> Result<Vec<P::Record>> {
    if !provider.is_available() {
        return Err(ProxyLibError::NotImplemented(
            "container env vars need a container record provider".to_string(),
        ));
    }
    Ok(view
        .iter()
        .map(|(name, value)| provider.record(name, value))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tracing_test::traced_test;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn default_env() -> BTreeMap<String, String> {
        env(&[
            ("JUJU_CHARM_HTTPS_PROXY", "https://example.com:8080"),
            ("JUJU_CHARM_HTTP_PROXY", "http://example.com:8080"),
            ("JUJU_CHARM_NO_PROXY", "localhost,"),
        ])
    }

    /// Counts every read so tests can prove the store was never consulted
    #[derive(Default)]
    struct CountingEnv {
        reads: Cell<usize>,
    }

    impl EnvStore for CountingEnv {
        type Snapshot = ();

        fn get(&self, _key: &str) -> Option<String> {
            self.reads.set(self.reads.get() + 1);
            None
        }

        fn set(&mut self, _key: &str, _value: &str) {}

        fn remove(&mut self, _key: &str) {}

        fn snapshot(&self) {
            self.reads.set(self.reads.get() + 1);
        }

        fn restore(&mut self, _snapshot: ()) {}
    }

    #[test]
    fn disabled_view_never_reads_env() {
        let store = CountingEnv::default();
        let view = environ(&store, false, true);
        assert!(view.is_empty());
        assert_eq!(view.error(), None);
        assert_eq!(store.reads.get(), 0);
    }

    #[test]
    #[traced_test]
    fn invalid_scheme_is_logged_and_captured() {
        let mut store = default_env();
        store.insert("JUJU_CHARM_HTTP_PROXY".into(), "not-a-valid-url".into());

        let view = environ(&store, true, true);

        assert!(view.is_empty());
        let error = view.error().unwrap();
        assert!(error.starts_with("Invalid proxy URL: url='not-a-valid-url'"));
        assert!(error.ends_with("Only 'http' and 'https' schemes are supported."));
        assert!(logs_contain(
            "Error retrieving proxy settings: Invalid proxy URL: url='not-a-valid-url'. \
             Only 'http' and 'https' schemes are supported."
        ));
    }

    #[test]
    #[traced_test]
    fn missing_host_is_logged_and_captured() {
        let mut store = default_env();
        store.insert("JUJU_CHARM_HTTPS_PROXY".into(), "http://".into());

        let view = environ(&store, true, true);

        assert_eq!(
            view.error(),
            Some("Invalid proxy URL: url='http://'. It must include a valid hostname or netloc.")
        );
        assert!(logs_contain(
            "Error retrieving proxy settings: Invalid proxy URL: url='http://'. \
             It must include a valid hostname or netloc."
        ));
    }

    #[test]
    fn disabled_sentinel_is_dropped_from_both_cases() {
        let config = ValidatedProxyConfig {
            http_proxy: "http://example.com:8080".into(),
            https_proxy: String::new(),
            no_proxy: "disabled".into(),
        };
        let view = ProxyView::from_config(&config, KeyCase::Both);
        let keys: Vec<&str> = view.keys().collect();
        assert_eq!(
            keys,
            vec!["http_proxy", "HTTP_PROXY", "https_proxy", "HTTPS_PROXY"]
        );
    }

    #[test]
    fn upper_case_only_view() {
        let view = environ_with(
            &default_env(),
            &ViewOptions {
                case: KeyCase::Upper,
                ..ViewOptions::default()
            },
        );
        let keys: Vec<&str> = view.keys().collect();
        assert_eq!(keys, vec!["HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY"]);
    }

    #[test]
    fn malformed_unit_name_is_rejected() {
        for unit in ["no-unit-number", "test/", "/0", "test/x", "test/0/1", "my app/0"] {
            let mut store = default_env();
            store.insert("JUJU_UNIT_NAME".into(), unit.into());
            let view = environ(&store, true, true);
            let err = systemd(&store, &view, "testd").unwrap_err();
            assert!(matches!(err, ProxyLibError::JujuEnvironment(_)), "{unit}");
        }
    }

    #[test]
    fn app_name_comes_from_unit_name() {
        let mut store = default_env();
        store.insert("JUJU_UNIT_NAME".into(), "kube-proxy/12".into());
        let view = environ(&store, true, false);
        let content = systemd(&store, &view, "snap.kube-proxy").unwrap();
        assert!(content
            .contains("# Autogenerated by juju_app='kube-proxy' for service='snap.kube-proxy'\n"));
    }
}
