use std::fs;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Certificate;

use crate::config::HttpConfig;

pub fn build_client(http: &HttpConfig, headers: &[(String, String)]) -> Result<Client> {
    let mut builder = Client::builder().timeout(http.timeout);

    if !headers.is_empty() {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {name:?}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid header value for {name}"))?;
            map.insert(name, value);
        }
        builder = builder.default_headers(map);
    }

    if let Some(path) = http.ca_bundle.as_ref() {
        let pem = fs::read(path).with_context(|| format!("read ca bundle {}", path.display()))?;
        let certs = Certificate::from_pem_bundle(&pem)
            .with_context(|| format!("parse ca bundle {}", path.display()))?;
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
    }

    builder.build().context("failed to build http client")
}
