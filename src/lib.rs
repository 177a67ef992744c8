//! Juju model proxy settings for charms.
//!
//! Reads the `JUJU_CHARM_*_PROXY` variables, validates them and renders them
//! as plain maps, systemd drop-ins or container env records.

pub mod config;
pub mod defaults;
pub mod env;
pub mod error;
pub mod proxy;
pub mod view;

pub use env::{EnvOverlay, EnvStore, ProcessEnv};
pub use error::{ProxyLibError, Result, UrlDefect};
pub use proxy::{raw, validated, RawProxyEnv, ValidatedProxyConfig};
pub use view::{
    container_vars, container_vars_with, environ, environ_with, systemd, BuiltinEnvVars, EnvVar,
    EnvVarProvider, KeyCase, ProxyView, ViewOptions,
};
