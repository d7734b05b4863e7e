use std::{fs, path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::EndpointError;

/// Which page this process renders. Each page talks to its own endpoint and
/// understands its own subset of the wire messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Feed,
    Overlay,
}

impl PageKind {
    pub fn default_endpoint_path(self) -> &'static str {
        match self {
            PageKind::Feed => "/feed/ws",
            PageKind::Overlay => "/ws",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PageKind::Feed => "feed",
            PageKind::Overlay => "overlay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectPolicy {
    /// Constant delay, gives up for good after `max_attempts`.
    Fixed,
    /// Doubling delay capped at `max_delay_ms`, never gives up.
    #[default]
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Address of the page the overlay would be served from. The socket
    /// endpoint mirrors its scheme and host.
    pub page_url: String,
    pub endpoint_path: Option<String>,
    pub reconnect_policy: ReconnectPolicy,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub connect_timeout_ms: u64,
    pub default_overlay_duration_ms: u64,
    pub new_donation_highlight_ms: u64,
    pub auto_scroll_delay_ms: u64,
    pub hide_transition_ms: u64,
    pub max_donations: usize,
    pub currency_symbol: String,
    pub utc_offset_minutes: i32,
    pub output_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_url: "http://127.0.0.1:8080".to_owned(),
            endpoint_path: None,
            reconnect_policy: ReconnectPolicy::default(),
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            max_attempts: 10,
            connect_timeout_ms: 10_000,
            default_overlay_duration_ms: 5000,
            new_donation_highlight_ms: 3000,
            auto_scroll_delay_ms: 100,
            hide_transition_ms: 300,
            max_donations: 50,
            currency_symbol: "₴".to_owned(),
            utc_offset_minutes: 0,
            output_path: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let config = serde_json::from_str::<Self>(&text)
            .with_context(|| format!("invalid json in {}", path.display()))?;
        Ok(config)
    }

    /// Socket endpoint for `page`: `https` pages get `wss`, everything else
    /// keeps the same host and port.
    pub fn endpoint(&self, page: PageKind) -> Result<Url, EndpointError> {
        let mut url = Url::parse(&self.page_url)?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => return Err(EndpointError::UnsupportedScheme(other.to_owned())),
        };
        if url.host_str().is_none() {
            return Err(EndpointError::MissingHost);
        }
        url.set_scheme(scheme)
            .map_err(|()| EndpointError::UnsupportedScheme(scheme.to_owned()))?;
        let path = self
            .endpoint_path
            .as_deref()
            .unwrap_or_else(|| page.default_endpoint_path());
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// Address of the manual test trigger on the same server.
    pub fn test_donation_url(&self) -> Result<Url, EndpointError> {
        let url = Url::parse(&self.page_url)?;
        if url.host_str().is_none() {
            return Err(EndpointError::MissingHost);
        }
        Ok(url.join("/test-donation")?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn default_overlay_duration(&self) -> Duration {
        Duration::from_millis(self.default_overlay_duration_ms)
    }

    pub fn new_donation_highlight(&self) -> Duration {
        Duration::from_millis(self.new_donation_highlight_ms)
    }

    pub fn auto_scroll_delay(&self) -> Duration {
        Duration::from_millis(self.auto_scroll_delay_ms)
    }

    pub fn hide_transition(&self) -> Duration {
        Duration::from_millis(self.hide_transition_ms)
    }
}
