use std::env;

use anyhow::{bail, Context, Result};
use reqwest::Url;

use crate::llm::SYSTEM_PROMPT;

pub const MODEL: &str = "phi3";

const HOST_VAR: &str = "OLLAMA_HOST";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 11434;

#[derive(Debug)]
pub struct Config {
    pub host: Url,
    pub model: String,
    pub system_prompt: String,
}

impl Config {
    /// Fixed model and prompt. The server address follows the usual Ollama
    /// client convention of honoring `OLLAMA_HOST`.
    pub fn from_env() -> Result<Self> {
        let raw = env::var(HOST_VAR).ok();
        let host = parse_host(raw.as_deref())
            .with_context(|| format!("invalid {HOST_VAR} value {:?}", raw.unwrap_or_default()))?;

        Ok(Self {
            host,
            model: MODEL.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
        })
    }
}

/// Normalizes an Ollama host string into a base URL.
///
/// A bare host gets `http` and port 11434. An explicit `http` or `https`
/// scheme without a port falls back to 80 or 443. An empty host means
/// `127.0.0.1`. Any path is kept without its surrounding slashes.
pub fn parse_host(raw: Option<&str>) -> Result<Url> {
    let raw = raw.unwrap_or("").trim();

    let (scheme, rest, default_port) = match raw.split_once("://") {
        Some(("http", rest)) => ("http", rest, 80),
        Some(("https", rest)) => ("https", rest, 443),
        Some((scheme, _)) => bail!("unsupported scheme {scheme}"),
        None => ("http", raw, DEFAULT_PORT),
    };

    let (authority, path) = match rest.split_once('/') {
        Some((authority, path)) => (authority, path.trim_matches('/')),
        None => (rest, ""),
    };

    let (host, port) = split_host_port(authority)?;
    let host = if host.is_empty() { DEFAULT_HOST } else { host };
    let port = port.unwrap_or(default_port);

    let url = if path.is_empty() {
        format!("{scheme}://{host}:{port}")
    } else {
        format!("{scheme}://{host}:{port}/{path}")
    };

    Url::parse(&url).with_context(|| format!("unable to parse {url}"))
}

fn split_host_port(authority: &str) -> Result<(&str, Option<u16>)> {
    let (host, port) = if authority.starts_with('[') {
        // Bracketed IPv6 literal, the colons inside belong to the address.
        match authority.find(']') {
            Some(end) => (&authority[..=end], authority[end + 1..].strip_prefix(':')),
            None => bail!("unterminated IPv6 address {authority}"),
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => {
                bail!("IPv6 address {authority} must be enclosed in brackets")
            }
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    let port = match port {
        None | Some("") => None,
        Some(port) => Some(
            port.parse::<u16>()
                .with_context(|| format!("invalid port {port}"))?,
        ),
    };

    Ok((host, port))
}
