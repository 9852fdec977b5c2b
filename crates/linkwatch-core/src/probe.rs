use crate::config::CheckerSettings;
use crate::model::ProbeOutcome;
use anyhow::Context;
use async_trait::async_trait;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub url: String,
    pub timeout: Duration,
}

/// Performs one check against one URL.
///
/// Implementations never fail: every transport problem is folded into a down
/// [`ProbeOutcome`], so a single bad target cannot abort a batch.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, req: &ProbeRequest) -> ProbeOutcome;
}

/// GET prober backed by a shared `reqwest` client.
///
/// User agent, TLS verification and redirect policy are fixed at construction;
/// the timeout is per request.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(settings: &CheckerSettings) -> anyhow::Result<Self> {
        let redirect = if settings.follow_redirects {
            reqwest::redirect::Policy::limited(settings.max_redirects as usize)
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .redirect(redirect)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn check(&self, req: &ProbeRequest) -> ProbeOutcome {
        let request = match self.client.get(&req.url).timeout(req.timeout).build() {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(url = %req.url, error = %e, "request could not be built");
                return ProbeOutcome::connection_error(error_kind(&e));
            }
        };

        let start = Instant::now();
        let result = self.client.execute(request).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let outcome = match result {
            Ok(resp) => ProbeOutcome::from_status(resp.status().as_u16(), elapsed_ms),
            Err(e) if e.is_timeout() => ProbeOutcome::timed_out(elapsed_ms),
            Err(e) => {
                tracing::debug!(url = %req.url, error = %e, "request failed");
                ProbeOutcome::connection_error(error_kind(&e))
            }
        };

        tracing::debug!(
            url = %req.url,
            up = outcome.is_up,
            status = ?outcome.status_code,
            rt_ms = ?outcome.response_time_ms,
            "checked"
        );
        outcome
    }
}

fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_connect() {
        "ConnectionError"
    } else if e.is_redirect() {
        "TooManyRedirects"
    } else if e.is_builder() {
        "InvalidUrl"
    } else {
        "RequestError"
    }
}
