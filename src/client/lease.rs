//! Lazy, shared client handles.
//!
//! A [`Lease`] builds its client on first use and hands the same `Arc` to
//! every later caller. Concurrent first calls race on a `OnceLock`, so the
//! factory runs at most once per lease and only one live client can ever
//! exist. A failed build is remembered as "unavailable": it is logged once
//! and callers get `None` from then on, never an error.

use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::http::HttpApiClient;
use super::statsd::UdpDaemonClient;
use super::{ApiClient, DaemonAddr, DaemonClient};
use crate::config::Config;
use crate::error::{Error, Result};

type Factory<T> = Box<dyn Fn() -> Result<Arc<T>> + Send + Sync>;

pub struct Lease<T: ?Sized> {
    name: &'static str,
    slot: OnceLock<Option<Arc<T>>>,
    factory: Factory<T>,
}

impl<T: ?Sized + 'static> Lease<T> {
    pub fn new<F>(name: &'static str, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            name,
            slot: OnceLock::new(),
            factory: Box::new(factory),
        }
    }

    /// A lease that already holds `client`.
    pub fn ready(name: &'static str, client: Arc<T>) -> Self {
        let lease = Self::new(name, || Err(Error::Other("lease is pre-filled".to_string())));
        let _ = lease.slot.set(Some(client));
        lease
    }

    /// A lease that never yields a client.
    pub fn unavailable(name: &'static str) -> Self {
        Self::new(name, move || Err(Error::NotConfigured(name)))
    }

    /// Get the client, building it on first use.
    pub fn lease(&self) -> Option<Arc<T>> {
        self.slot
            .get_or_init(|| match (self.factory)() {
                Ok(client) => {
                    info!(client = self.name, "metrics client created");
                    Some(client)
                }
                Err(Error::NotConfigured(_)) => {
                    debug!(client = self.name, "metrics client not configured");
                    None
                }
                Err(e) => {
                    warn!(client = self.name, error = %e, "metrics client unavailable");
                    None
                }
            })
            .clone()
    }

    /// Install a client built elsewhere. Ignored, with a warning, when the
    /// lease is already settled.
    pub fn install(&self, client: Arc<T>) -> bool {
        if self.slot.set(Some(client)).is_err() {
            warn!(client = self.name, "metrics client is already set, ignoring");
            return false;
        }
        true
    }

    /// Whether the first lease has happened.
    pub fn is_settled(&self) -> bool {
        self.slot.get().is_some()
    }
}

/// Both backend leases, owned by the composition root.
pub struct ClientLeases {
    pub api: Lease<dyn ApiClient>,
    pub daemon: Lease<dyn DaemonClient>,
}

impl ClientLeases {
    pub fn new(api: Lease<dyn ApiClient>, daemon: Lease<dyn DaemonClient>) -> Self {
        Self { api, daemon }
    }

    /// Leases that build the real HTTP and UDP clients from `config`.
    ///
    /// The HTTP client submits on the tokio runtime current at first lease.
    pub fn from_config(config: &Config) -> Self {
        let api = match &config.api_key {
            Some(key) => {
                let key = SecretString::from(key.expose_secret().to_owned());
                let url = config.api_url.clone();
                Lease::new("api", move || {
                    let runtime = Handle::try_current().map_err(|e| {
                        Error::Transport(format!("no async runtime for api submissions: {e}"))
                    })?;
                    let client = HttpApiClient::new(&url, &key, runtime)?;
                    Ok(Arc::new(client) as Arc<dyn ApiClient>)
                })
            }
            None => Lease::unavailable("api"),
        };

        let daemon = match &config.daemon_host {
            Some(addr) => {
                let addr = addr.clone();
                let namespace = config.prefix.clone();
                Lease::new("daemon", move || {
                    let addr: DaemonAddr = addr.parse()?;
                    let client = UdpDaemonClient::connect(&addr, &namespace)?;
                    Ok(Arc::new(client) as Arc<dyn DaemonClient>)
                })
            }
            None => Lease::unavailable("daemon"),
        };

        Self { api, daemon }
    }

    pub fn api(&self) -> Option<Arc<dyn ApiClient>> {
        self.api.lease()
    }

    pub fn daemon(&self) -> Option<Arc<dyn DaemonClient>> {
        self.daemon.lease()
    }
}
