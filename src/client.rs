//! epost async download client.
//!
//! This module provides an async [`Client`] and [`ClientBuilder`] for walking an
//! epost folder and saving its documents.
//!
//! Typical flow:
//! 1) Build a client with [`Client::builder`]; this bootstraps the SSO token
//! 2) Download a folder via [`Client::download`] (or [`Client::download_into`])
//! 3) Release the session with [`Client::close`]

use crate::{
    DownloadReport, Error, FolderItem, ItemStatus, ListingPage, Result, RetryPolicy, ServiceConfig,
    extract_sso_token,
};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, COOKIE, HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Async client for downloading documents from an epost folder.
///
/// A `Client` owns one authenticated HTTP session: every request carries the
/// supplied cookies and the SSO token found during [`ClientBuilder::build`].
/// Requests are issued strictly one after another.
pub struct Client {
    http: reqwest::Client,
    config: ServiceConfig,
    retry: RetryPolicy,
    dest: PathBuf,
    proxy: Option<String>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("http", &"<reqwest::Client>")
            .field("cookies", &"<redacted>")
            .field("csrf", &"<redacted>")
            .field("config", &self.config)
            .field("retry", &self.retry)
            .field("dest", &self.dest)
            .field("proxy", &self.proxy)
            .finish()
    }
}

impl Client {
    /// Create a [`ClientBuilder`] for the given browser session cookies.
    ///
    /// `cookies` is the raw `Cookie` header value copied from a logged-in
    /// browser session.
    pub fn builder(cookies: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(cookies)
    }

    /// Get the proxy URL configured for this client (if any).
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Download every document of `folder_id` that is not already on disk.
    ///
    /// Folder `0` is the inbox.
    ///
    /// # Errors
    /// Returns the first fatal error; results gathered until then are lost.
    /// Use [`Client::download_into`] to keep them.
    ///
    /// # Examples
    /// ```no_run
    /// # use epost_download::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), epost_download::Error> {
    /// let client = Client::builder("SESSION=...").dest("docs").build().await?;
    /// let report = client.download(0).await?;
    /// println!("{} new documents", report.downloaded);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn download(&self, folder_id: u64) -> Result<DownloadReport> {
        let mut report = DownloadReport::default();
        self.download_into(folder_id, &mut report).await?;
        Ok(report)
    }

    /// Download every new document of `folder_id`, recording into `report`.
    ///
    /// `report` is reset first. On a fatal error it still holds the counters and
    /// results of every item handled before the failure.
    ///
    /// # Errors
    /// - [`Error::UnexpectedStatus`] if a listing page is not HTTP 200.
    /// - [`Error::EmptyResponse`] if a listing page declares an empty body.
    /// - [`Error::RetriesExhausted`] / [`Error::Request`] if transient failures
    ///   outlast the retry budget.
    /// - [`Error::Json`] / [`Error::ResponseParse`] for malformed listings.
    /// - [`Error::Io`] if a document cannot be written.
    pub async fn download_into(&self, folder_id: u64, report: &mut DownloadReport) -> Result<()> {
        *report = DownloadReport::default();

        let mut offset = 0;
        let mut first_page = true;

        loop {
            let page = self.fetch_page(folder_id, offset).await?;

            if first_page {
                report.total += page.total.unwrap_or(0);
                first_page = false;
            }

            if page.items.is_empty() {
                break;
            }

            info!(folder_id, offset, items = page.items.len(), "processing listing page");
            for item in &page.items {
                self.process_item(folder_id, item, report).await?;
            }

            offset += self.config.page_size;
        }

        info!(
            folder_id,
            total = report.total,
            processed = report.processed,
            downloaded = report.downloaded,
            "folder done"
        );
        Ok(())
    }

    /// Fetch and decode one listing page.
    ///
    /// # Errors
    /// See [`Client::download_into`].
    pub async fn fetch_page(&self, folder_id: u64, offset: u64) -> Result<ListingPage> {
        let params = [
            ("folderId", folder_id.to_string()),
            ("sortField", self.config.sort_field.clone()),
            ("order", self.config.order.clone()),
            ("offset", offset.to_string()),
            ("limit", self.config.page_size.to_string()),
        ];

        debug!(url = %self.config.listing_url, folder_id, offset, "requesting listing page");
        let response = self
            .retry
            .send(self.http.get(&self.config.listing_url).query(&params))
            .await?;

        let status = response.status();
        let url = response.url().to_string();
        if status != StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                url,
                status: status.as_u16(),
            });
        }

        if declares_empty_body(response.headers()) {
            return Err(Error::EmptyResponse { url });
        }

        let body = response.bytes().await?;
        let value = serde_json::from_slice::<serde_json::Value>(&body)?;
        ListingPage::from_value(&value, &self.config.fields)
    }

    async fn process_item(
        &self,
        folder_id: u64,
        item: &FolderItem,
        report: &mut DownloadReport,
    ) -> Result<()> {
        let path = self.dest.join(item.file_name());

        let exists = match tokio::fs::try_exists(&path).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot check for existing file");
                false
            }
        };
        if exists {
            debug!(item = %item.id, path = %path.display(), "already downloaded");
            report.record(folder_id, item, ItemStatus::AlreadyDownloaded { path });
            return Ok(());
        }

        let (status, body) = self.fetch_item(&item.id).await?;
        if status != StatusCode::OK {
            warn!(
                item = %item.id,
                description = %item.description,
                status = status.as_u16(),
                "document download failed"
            );
            report.record(
                folder_id,
                item,
                ItemStatus::Failed {
                    status: status.as_u16(),
                },
            );
            return Ok(());
        }

        tokio::fs::write(&path, &body)
            .await
            .map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;

        info!(item = %item.id, path = %path.display(), bytes = body.len(), "downloaded");
        report.record(folder_id, item, ItemStatus::Downloaded { path });
        Ok(())
    }

    /// Request a document body. Non-200 statuses are returned, not raised.
    async fn fetch_item(&self, item_id: &str) -> Result<(StatusCode, Vec<u8>)> {
        let params = [(self.config.item_id_param.as_str(), item_id)];

        debug!(url = %self.config.item_url, item = item_id, "requesting document");
        let response = self
            .retry
            .send(self.http.get(&self.config.item_url).query(&params))
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Ok((status, Vec::new()));
        }

        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }

    /// Release the HTTP session and its connection pool.
    ///
    /// Consuming `self` makes a second close impossible; dropping the client
    /// has the same effect on early-return paths.
    pub fn close(self) {
        debug!(dest = %self.dest.display(), "closing epost session");
    }
}

fn declares_empty_body(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim() == "0")
}

const USER_AGENT_VALUE: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:131.0) Gecko/20100101 Firefox/131.0";

/// Builder for configuring an epost [`Client`].
///
/// Start with [`Client::builder`], then call [`ClientBuilder::build`] to
/// bootstrap the SSO token and open the session.
///
/// # Defaults
/// - Destination: current directory
/// - No proxy
/// - TLS certificates verified
/// - A browser-like user agent
/// - Production epost endpoints ([`ServiceConfig::default`])
/// - [`RetryPolicy::default`]
/// - Reqwest default timeout
#[derive(Clone)]
pub struct ClientBuilder {
    cookies: String,
    dest: PathBuf,
    proxy: Option<String>,
    danger_accept_invalid_certs: bool,
    user_agent: String,
    timeout: Option<Duration>,
    retry: RetryPolicy,
    config: ServiceConfig,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("cookies", &"<redacted>")
            .field("dest", &self.dest)
            .field("proxy", &self.proxy)
            .field(
                "danger_accept_invalid_certs",
                &self.danger_accept_invalid_certs,
            )
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("config", &self.config)
            .finish()
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    pub fn new(cookies: impl Into<String>) -> Self {
        Self {
            cookies: cookies.into(),
            dest: PathBuf::from("."),
            proxy: None,
            danger_accept_invalid_certs: false,
            user_agent: USER_AGENT_VALUE.to_string(),
            timeout: None,
            retry: RetryPolicy::default(),
            config: ServiceConfig::default(),
        }
    }

    /// Directory downloaded documents are written to. It must already exist.
    pub fn dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = dest.into();
        self
    }

    /// Set a proxy URL (e.g. `"http://127.0.0.1:8080"`).
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Configure whether to accept invalid TLS certificates (default: `false`).
    ///
    /// # Security
    /// The session cookies are sent with every request; only enable this for
    /// traffic inspection in controlled environments.
    pub fn danger_accept_invalid_certs(mut self, value: bool) -> Self {
        self.danger_accept_invalid_certs = value;
        self
    }

    /// Override the default user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set a request timeout applied to all operations.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the retry policy of the authenticated session.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override endpoints and listing field names.
    ///
    /// This is primarily useful for testing.
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the [`Client`] by bootstrapping the SSO token.
    ///
    /// The landing page is requested once with only the cookies attached and
    /// without retries. The first non-empty SSO token found becomes the `csrf`
    /// header of the session.
    ///
    /// # Errors
    /// Returns an error if:
    /// - the cookies cannot be used as a header value,
    /// - the HTTP client cannot be constructed (e.g., invalid proxy URL),
    /// - the bootstrap request fails,
    /// - no SSO token is found ([`Error::Authentication`]).
    pub async fn build(self) -> Result<Client> {
        let mut cookie = HeaderValue::from_str(&self.cookies)?;
        cookie.set_sensitive(true);

        let bootstrap = self.http_builder()?.build()?;
        debug!(url = %self.config.landing_url, "bootstrapping SSO token");
        let html = bootstrap
            .get(&self.config.landing_url)
            .header(COOKIE, cookie.clone())
            .send()
            .await?
            .text()
            .await?;
        drop(bootstrap);

        let token = extract_sso_token(&html).ok_or(Error::Authentication)?;
        let mut csrf = HeaderValue::from_str(&token)?;
        csrf.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);
        headers.insert(HeaderName::from_static("csrf"), csrf);

        let http = self.http_builder()?.default_headers(headers).build()?;
        debug!("epost session ready");

        Ok(Client {
            http,
            config: self.config,
            retry: self.retry,
            dest: self.dest,
            proxy: self.proxy,
        })
    }

    fn http_builder(&self) -> Result<reqwest::ClientBuilder> {
        let mut builder = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs);

        if let Some(proxy_url) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(builder)
    }
}
