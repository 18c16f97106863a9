use crate::app::ports::{HttpGetResult, HttpTransport};
use crate::error::{EtlError, Result};
use reqwest::header::RETRY_AFTER;
use std::time::Duration;

/// Blocking reqwest transport with a fixed per-request timeout.
pub struct ReqwestHttp {
    client: reqwest::blocking::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestHttp {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpGetResult> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(classify)?;
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = resp.text().map_err(classify)?;
        Ok(HttpGetResult {
            status,
            body,
            retry_after,
        })
    }
}

fn classify(e: reqwest::Error) -> EtlError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        EtlError::Transport(e.to_string())
    } else {
        EtlError::Http(e)
    }
}
