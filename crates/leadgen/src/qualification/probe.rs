use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::extract::{detect_social_links, extract_contact_email, host_of, normalize_url};

const DNS_TIMEOUT: Duration = Duration::from_secs(3);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SocialNetwork {
    Facebook,
    Instagram,
}

impl SocialNetwork {
    pub const fn label(self) -> &'static str {
        match self {
            SocialNetwork::Facebook => "Facebook",
            SocialNetwork::Instagram => "Instagram",
        }
    }
}

/// What probing a business website found, in the order the checks short-circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteReachability {
    NoWebsite,
    Unresolved,
    Unreachable { detail: String },
    Reachable { status: u16, social: Vec<SocialNetwork> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPresenceReport {
    pub reachability: SiteReachability,
}

/// Outbound website checks used by discovery and qualification.
#[async_trait]
pub trait SiteInspector: Send + Sync {
    async fn probe(&self, website_url: Option<&str>) -> WebPresenceReport;
    async fn find_contact_email(&self, website_url: &str) -> Option<String>;
}

/// Live inspector: DNS lookup via tokio, page fetches via reqwest.
#[derive(Debug, Clone)]
pub struct HttpSiteInspector {
    http: reqwest::Client,
}

impl HttpSiteInspector {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .user_agent("Mozilla/5.0 (compatible; LeadGenBot/1.0)")
            .build()?;
        Ok(Self { http })
    }

    async fn resolves(&self, host: &str) -> bool {
        match tokio::time::timeout(DNS_TIMEOUT, tokio::net::lookup_host((host, 80))).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(err)) => {
                debug!(%host, error = %err, "dns lookup failed");
                false
            }
            Err(_) => {
                debug!(%host, "dns lookup timed out");
                false
            }
        }
    }
}

#[async_trait]
impl SiteInspector for HttpSiteInspector {
    async fn probe(&self, website_url: Option<&str>) -> WebPresenceReport {
        let Some(url) = website_url.map(str::trim).filter(|url| !url.is_empty()) else {
            return WebPresenceReport {
                reachability: SiteReachability::NoWebsite,
            };
        };

        let resolved = match host_of(url) {
            Some(host) => self.resolves(&host).await,
            None => false,
        };
        if !resolved {
            return WebPresenceReport {
                reachability: SiteReachability::Unresolved,
            };
        }

        let response = match self
            .http
            .get(normalize_url(url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                return WebPresenceReport {
                    reachability: SiteReachability::Unreachable {
                        detail: if err.is_timeout() {
                            "timeout".to_string()
                        } else {
                            "connection error".to_string()
                        },
                    },
                }
            }
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            return WebPresenceReport {
                reachability: SiteReachability::Unreachable {
                    detail: format!("HTTP {}", status.as_u16()),
                },
            };
        }

        let social = if status == reqwest::StatusCode::OK {
            match response.text().await {
                Ok(body) => detect_social_links(&body),
                Err(err) => {
                    debug!(%url, error = %err, "failed to read page body");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        WebPresenceReport {
            reachability: SiteReachability::Reachable {
                status: status.as_u16(),
                social,
            },
        }
    }

    async fn find_contact_email(&self, website_url: &str) -> Option<String> {
        let response = self
            .http
            .get(normalize_url(website_url))
            .timeout(SCRAPE_TIMEOUT)
            .send()
            .await
            .map_err(|err| debug!(url = %website_url, error = %err, "contact scrape failed"))
            .ok()?;

        if response.status() != reqwest::StatusCode::OK {
            return None;
        }

        let body = response.text().await.ok()?;
        extract_contact_email(&body)
    }
}
