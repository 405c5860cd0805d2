//! Data API HTTP client.

use std::path::Path;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, instrument, trace};
use url::Url;

use fluentfm_core::endpoint::{self, Route, TOKEN_HEADER, UPLOAD_PART};
use fluentfm_core::error::{AuthError, Error, ProtocolError};
use fluentfm_core::response::{self, decode_body};
use fluentfm_core::{AccessToken, ConnectionConfig, Credentials, Result, ServerUrl};

const USER_AGENT: &str = concat!("fluentfm/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to one server and database.
#[derive(Debug, Clone)]
pub struct FmClient {
    client: reqwest::Client,
    server: ServerUrl,
    database: String,
    timeout: Duration,
}

impl FmClient {
    /// Create a client for the server and database in `config`.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            server: config.server.clone(),
            database: config.database.clone(),
            timeout: config.timeout,
        })
    }

    pub fn server(&self) -> &ServerUrl {
        &self.server
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Request timeout, shared by the Data API and download clients.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL of a route relative to the database root.
    pub fn url(&self, route: &Route) -> Url {
        self.server.data_url(&self.database, route.segments())
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Open a session with HTTP basic credentials and return its token.
    #[instrument(skip(self, credentials), fields(server = %self.server, database = %self.database))]
    pub async fn create_session(&self, credentials: &Credentials) -> Result<AccessToken> {
        let url = self.url(&endpoint::sessions());
        debug!("opening Data API session");

        let response = self
            .client
            .post(url)
            .basic_auth(credentials.username(), Some(credentials.password()))
            .json(&json!({}))
            .send()
            .await?;

        let status = response.status();
        trace!(%status, "session response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = response
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(AccessToken::new);

        match token {
            Some(token) => Ok(token),
            None if status.is_success() => {
                Err(ProtocolError::missing_token(status.as_u16()).into())
            }
            None => {
                let body = response.bytes().await?;
                let decoded = decode_body(&body, status.as_u16())?;
                response::check_status(&decoded, &json!({}))?;
                Err(ProtocolError::new(status.as_u16(), Some("login failed".to_string())).into())
            }
        }
    }

    /// Close a session.
    #[instrument(skip(self, token), fields(server = %self.server, database = %self.database))]
    pub async fn delete_session(&self, token: &AccessToken) -> Result<()> {
        let url = self.url(&endpoint::session(token.as_str()));
        debug!("closing Data API session");

        let response = self
            .client
            .delete(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .send()
            .await?;

        let body = self.handle_response(response).await?;
        response::check_status(&body, &Value::Null)
    }

    // ========================================================================
    // Data requests
    // ========================================================================

    /// Send an authenticated request and return the decoded envelope.
    ///
    /// The envelope code is not checked here; callers run
    /// [`response::check_status`] with the payload they sent.
    #[instrument(skip(self, token, params, body), fields(server = %self.server))]
    pub async fn send(
        &self,
        method: Method,
        route: &Route,
        token: &AccessToken,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.url(route);
        debug!(%url, "Data API request");
        trace!(?params, ?body, "request payload");

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token.as_str());
        if !params.is_empty() {
            request = request.query(params);
        }
        request = match body {
            Some(body) => request.json(body),
            None => request.header(CONTENT_TYPE, HeaderValue::from_static("application/json")),
        };

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Upload a local file into a container field as multipart form data.
    #[instrument(skip(self, token), fields(server = %self.server))]
    pub async fn upload(&self, route: &Route, token: &AccessToken, file: &Path) -> Result<Value> {
        let contents = tokio::fs::read(file)
            .await
            .map_err(|e| Error::io(file, e))?;
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let url = self.url(route);
        debug!(%url, bytes = contents.len(), "container upload");

        let form = Form::new().part(UPLOAD_PART, Part::bytes(contents).file_name(file_name));
        let response = self
            .client
            .post(url)
            .bearer_auth(token.as_str())
            .multipart(form)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Build a client for container downloads.
    ///
    /// Container URLs may redirect through a streaming session that is tracked
    /// with cookies, so downloads use their own cookie-enabled client.
    pub fn downloader(&self) -> Result<Downloader> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .cookie_store(true)
            .build()?;
        Ok(Downloader { client })
    }

    // ========================================================================
    // Response handling
    // ========================================================================

    async fn handle_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        trace!(%status, "Data API response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Rejected.into());
        }

        let bytes = response.bytes().await?;
        let decoded = decode_body(&bytes, status.as_u16());

        if status.is_success() {
            return decoded;
        }

        match decoded {
            // e.g. layout missing arrives as HTTP 500 with code 105
            Ok(body) if response::has_error_code(&body) => Ok(body),
            _ => Err(ProtocolError::new(
                status.as_u16(),
                Some(String::from_utf8_lossy(&bytes).trim().chars().take(200).collect()),
            )
            .into()),
        }
    }
}

/// Fetches container data by URL.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    /// GET a container URL with the session bearer token.
    #[instrument(skip(self, token))]
    pub async fn fetch(&self, url: &str, token: &AccessToken) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token.as_str())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Rejected.into());
        }
        if !status.is_success() {
            return Err(ProtocolError::new(
                status.as_u16(),
                Some("container download failed".to_string()),
            )
            .into());
        }

        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "container downloaded");
        Ok(bytes.to_vec())
    }
}
