/// Proxy variables Juju injects into every hook environment
pub const JUJU_HTTPS_PROXY: &str = "JUJU_CHARM_HTTPS_PROXY";
pub const JUJU_HTTP_PROXY: &str = "JUJU_CHARM_HTTP_PROXY";
pub const JUJU_NO_PROXY: &str = "JUJU_CHARM_NO_PROXY";

/// Unit name in the form `<app>/<unit-number>`
pub const JUJU_UNIT_NAME: &str = "JUJU_UNIT_NAME";

/// Values equal to this are left out of every rendered view
pub const DISABLED: &str = "disabled";

pub const HTTP_PROXY_KEY: &str = "http_proxy";
pub const HTTPS_PROXY_KEY: &str = "https_proxy";
pub const NO_PROXY_KEY: &str = "no_proxy";

/// Hosts a pod must always reach directly inside a Kubernetes cluster
pub const K8S_DEFAULT_NO_PROXY: [&str; 6] = [
    "127.0.0.1",
    "localhost",
    "::1",
    "svc",
    "svc.cluster",
    "svc.cluster.local",
];

/// Prefix for environment overrides of the configuration file
pub const CONFIG_ENV_PREFIX: &str = "CHARM_PROXYLIB";

/// Directory name under the user config dir
pub const CONFIG_DIR_NAME: &str = "charm-proxylib";

pub fn k8s_default_no_proxy() -> Vec<String> {
    K8S_DEFAULT_NO_PROXY.iter().map(|s| s.to_string()).collect()
}
