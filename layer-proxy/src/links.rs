//! Proxy share links.
//!
//! Telegram distributes proxies as links:
//!
//! ```text
//! tg://socks?server=1.2.3.4&port=1080&user=u&pass=p
//! https://t.me/proxy?server=1.2.3.4&port=443&secret=dd0123…
//! ```
//!
//! [`parse_link`] turns such a link into an [`ApplyConfirmation`] the UI
//! shows before adding the proxy; [`share_link`] builds the `t.me` form.

use std::collections::HashMap;

use url::Url;

use crate::config::{ProxyConfig, ProxyKind, ProxyStatus};

/// A proxy parsed from a link, waiting for the user to confirm it.
#[derive(Clone, Debug, PartialEq)]
pub struct ApplyConfirmation {
    pub config: ProxyConfig,
    pub status: ProxyStatus,
}

impl ApplyConfirmation {
    /// Build from link parameters. Keys are matched case-insensitively.
    pub fn from_fields(kind: ProxyKind, fields: &HashMap<String, String>) -> Self {
        let fields: HashMap<String, &str> = fields
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .collect();
        let field = |name: &str| fields.get(name).copied().unwrap_or_default().to_string();

        let mut config = ProxyConfig {
            kind,
            host: field("server"),
            port: field("port").trim().parse().unwrap_or(0),
            ..Default::default()
        };
        match kind {
            ProxyKind::Socks5 => {
                config.user     = field("user");
                config.password = field("pass");
            }
            ProxyKind::Mtproto => config.password = field("secret"),
            _ => {}
        }
        let status = config.status();
        Self { config, status }
    }

    pub fn is_valid(&self) -> bool {
        self.status == ProxyStatus::Valid
    }
}

/// Parse a `tg://` or `t.me` proxy link. `None` if it is not a proxy link.
pub fn parse_link(link: &str) -> Option<ApplyConfirmation> {
    let link = link.trim();
    let url = match Url::parse(link) {
        Ok(url) => url,
        Err(_) => Url::parse(&format!("https://{link}")).ok()?,
    };

    let kind_name = match url.scheme() {
        "tg" => url.host_str()?.to_ascii_lowercase(),
        "http" | "https" => {
            let host = url.host_str()?.to_ascii_lowercase();
            if !matches!(host.as_str(), "t.me" | "telegram.me" | "telegram.dog") {
                return None;
            }
            url.path_segments()?.next()?.to_ascii_lowercase()
        }
        _ => return None,
    };
    let kind = match kind_name.as_str() {
        "socks" => ProxyKind::Socks5,
        "proxy" => ProxyKind::Mtproto,
        _ => return None,
    };

    let fields: HashMap<String, String> = url.query_pairs().into_owned().collect();
    Some(ApplyConfirmation::from_fields(kind, &fields))
}

/// The `https://t.me/...` link for `config`, `None` for kinds that cannot be shared.
pub fn share_link(config: &ProxyConfig) -> Option<String> {
    let path = match config.kind {
        ProxyKind::Socks5  => "socks",
        ProxyKind::Mtproto => "proxy",
        _ => return None,
    };
    let mut url = Url::parse("https://t.me/").ok()?;
    url.set_path(path);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("server", &config.host);
        query.append_pair("port", &config.port.to_string());
        match config.kind {
            ProxyKind::Socks5 => {
                if !config.user.is_empty() {
                    query.append_pair("user", &config.user);
                }
                if !config.password.is_empty() {
                    query.append_pair("pass", &config.password);
                }
            }
            _ => {
                query.append_pair("secret", &config.password);
            }
        }
    }
    Some(url.into())
}
