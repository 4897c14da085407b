//! HTTP probing for health checks.

use std::time::Duration;

use anyhow::Context;

/// Issues a single GET and reports the status code.
pub trait HttpProbe {
    fn get_status(&self, url: &str) -> anyhow::Result<u16>;
}

/// [`HttpProbe`] backed by reqwest, driven by a private current-thread runtime.
#[derive(Debug)]
pub struct ReqwestProbe {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl ReqwestProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shipyard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create tokio runtime")?;
        Ok(Self { client, runtime })
    }
}

impl HttpProbe for ReqwestProbe {
    fn get_status(&self, url: &str) -> anyhow::Result<u16> {
        let response = self
            .runtime
            .block_on(self.client.get(url).send())
            .with_context(|| format!("GET {} failed", url))?;
        Ok(response.status().as_u16())
    }
}
