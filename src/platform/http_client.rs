// Release endpoint client over esp-tls. Certificates are not checked (see sdkconfig.defaults),
// the release host is trusted by URL.

use std::time::Duration;

use embedded_svc::http::client::Client;
use embedded_svc::http::{Headers, Method, Status};
use esp_idf_svc::http::client::{Configuration as HttpConfig, EspHttpConnection, FollowRedirectsPolicy};

use super::IoReader;
use crate::ota::auto_update::{Download, ProbeResponse, ReleaseClient};
use crate::ota::UpdateError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const HTTP_BUFFER_SIZE: usize = 4096;
// GitHub redirect URLs are long
const HTTP_BUFFER_SIZE_TX: usize = 2048;

#[derive(Default)]
pub struct EspReleaseClient {
    download: Option<Client<EspHttpConnection>>,
}

impl EspReleaseClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn connection(timeout: Duration, follow_redirects_policy: FollowRedirectsPolicy) -> Result<EspHttpConnection, UpdateError> {
        EspHttpConnection::new(&HttpConfig {
            buffer_size: Some(HTTP_BUFFER_SIZE),
            buffer_size_tx: Some(HTTP_BUFFER_SIZE_TX),
            timeout: Some(timeout),
            follow_redirects_policy,
            ..Default::default()
        })
        .map_err(|e| UpdateError::Connect(format!("{:?}", e)))
    }
}

impl ReleaseClient for EspReleaseClient {
    fn probe(&mut self, url: &str) -> Result<ProbeResponse, UpdateError> {
        let mut client = Client::wrap(Self::connection(PROBE_TIMEOUT, FollowRedirectsPolicy::FollowNone)?);
        let request = client
            .request(Method::Head, url, &[])
            .map_err(|e| UpdateError::Connect(format!("{:?}", e)))?;
        let response = request
            .submit()
            .map_err(|e| UpdateError::Connect(format!("{:?}", e)))?;

        Ok(ProbeResponse {
            status: response.status(),
            location: response.header("Location").map(str::to_string),
        })
    }

    fn download(&mut self, url: &str) -> Result<Download<'_>, UpdateError> {
        let client = self
            .download
            .insert(Client::wrap(Self::connection(DOWNLOAD_TIMEOUT, FollowRedirectsPolicy::FollowAll)?));

        let request = client
            .request(Method::Get, url, &[])
            .map_err(|e| UpdateError::Connect(format!("{:?}", e)))?;
        let response = request
            .submit()
            .map_err(|e| UpdateError::Connect(format!("{:?}", e)))?;

        match response.status() {
            304 => Ok(Download::NotModified),
            200 => {
                let total = response
                    .header("Content-Length")
                    .and_then(|v| v.parse::<usize>().ok());
                Ok(Download::Artifact {
                    total,
                    body: Box::new(IoReader(response)),
                })
            }
            status => Err(UpdateError::Connect(format!("HTTP {}", status))),
        }
    }
}
