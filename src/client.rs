// znr - zone notes report for the DynECT DNS API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

const USER_AGENT: &str = "znr/0.1";
const AUTH_HEADER: &str = "Auth-Token";
pub const STATUS_SUCCESS: &str = "success";
const STATUS_INCOMPLETE: &str = "incomplete";

/// One entry of the `msgs` array the API attaches to every response.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ApiMessage {
    #[serde(rename = "INFO", default)]
    pub info: Option<String>,
    #[serde(rename = "LVL", default)]
    pub level: Option<String>,
    #[serde(rename = "ERR_CD", default)]
    pub error_code: Option<String>,
    #[serde(rename = "SOURCE", default)]
    pub source: Option<String>,
}

impl fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
        write!(
            f,
            "{} (level: {}, code: {}, source: {})",
            field(&self.info),
            field(&self.level),
            field(&self.error_code),
            field(&self.source)
        )
    }
}

/// Response envelope shared by every REST resource.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub job_id: Option<u64>,
    #[serde(default)]
    pub msgs: Vec<ApiMessage>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status} from {url} did not carry an API response: {body}")]
    Malformed {
        status: u16,
        url: String,
        body: String,
    },
    #[error("job {job_id} still incomplete after {polls} polls")]
    JobPending { job_id: u64, polls: u32 },
}

/// Renders provider messages one per line, indented, for error output.
pub fn describe_messages(msgs: &[ApiMessage]) -> String {
    msgs.iter()
        .filter(|m| m.info.is_some() || m.error_code.is_some())
        .map(|m| format!("\n  {m}"))
        .collect()
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub job_poll_interval: Duration,
    pub job_poll_limit: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            job_poll_interval: Duration::from_secs(5),
            job_poll_limit: 60,
        }
    }
}

#[derive(Debug)]
pub struct DynClient {
    base_url: Url,
    http: Client,
    token: Option<String>,
    options: ClientOptions,
}

impl DynClient {
    pub fn new(base_url: &str, options: ClientOptions) -> Result<Self> {
        let parsed = Url::parse(base_url).context("parsing base URL")?;
        let http = Client::builder()
            .user_agent(HeaderValue::from_static(USER_AGENT))
            .timeout(options.timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: parsed,
            http,
            token: None,
            options,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Issues one request and follows the job protocol until the API stops
    /// reporting `incomplete`.
    pub fn execute(
        &self,
        method: Method,
        path: &str,
        params: Option<&Value>,
    ) -> Result<ApiResponse> {
        let mut response = self.send(method, path, params)?;

        let mut polls = 0;
        while response.status == STATUS_INCOMPLETE {
            let Some(job_id) = response.job_id else {
                break;
            };
            if polls >= self.options.job_poll_limit {
                return Err(ApiError::JobPending { job_id, polls }.into());
            }
            polls += 1;
            debug!(job_id, polls, "job incomplete, polling");
            std::thread::sleep(self.options.job_poll_interval);
            response = self.send(Method::GET, &format!("/REST/Job/{job_id}/"), None)?;
        }

        Ok(response)
    }

    fn send(&self, method: Method, path: &str, params: Option<&Value>) -> Result<ApiResponse> {
        let normalized = path.trim_start_matches('/');
        let url = self
            .base_url
            .join(normalized)
            .with_context(|| format!("joining path `{}` to base URL", path))?;

        trace!(%method, %url, "sending request");
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            request = request.header(AUTH_HEADER, token);
        }

        if let Some(params) = params {
            request = request.json(params);
        }

        let response = request
            .send()
            .with_context(|| format!("sending {} {}", method, url))?;

        let status = response.status().as_u16();
        let text = response.text().context("reading response body")?;

        // Failures come back as a regular envelope with a 4xx/5xx code.
        match serde_json::from_str::<ApiResponse>(&text) {
            Ok(parsed) => {
                debug!(%method, path, http_status = status, api_status = %parsed.status, "response");
                Ok(parsed)
            }
            Err(_) => Err(ApiError::Malformed {
                status,
                url: url.to_string(),
                body: truncate(&text, 200),
            }
            .into()),
        }
    }
}

fn truncate(body: &str, max: usize) -> String {
    if body.chars().count() > max {
        let cut: String = body.chars().take(max).collect();
        format!("{cut}...")
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Method;
    use serde_json::json;

    fn fast_options() -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(5),
            job_poll_interval: Duration::from_millis(0),
            job_poll_limit: 3,
        }
    }

    #[test]
    fn sends_token_and_json_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/REST/ZoneNoteReport/")
                .header("Auth-Token", "tok")
                .header("Content-Type", "application/json")
                .json_body(json!({"zone": "example.com", "limit": 5}));
            then.status(200)
                .json_body(json!({"status": "success", "data": [], "msgs": []}));
        });

        let mut client = DynClient::new(&server.base_url(), fast_options()).unwrap();
        client.set_token(Some("tok".into()));
        let response = client
            .execute(
                Method::POST,
                "/REST/ZoneNoteReport/",
                Some(&json!({"zone": "example.com", "limit": 5})),
            )
            .unwrap();

        mock.assert();
        assert!(response.is_success());
    }

    #[test]
    fn parses_failure_envelope_from_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/REST/Session/");
            then.status(400).json_body(json!({
                "status": "failure",
                "data": {},
                "msgs": [{"INFO": "login: Credentials you entered did not match", "LVL": "ERROR", "ERR_CD": "INVALID_DATA", "SOURCE": "BLL"}]
            }));
        });

        let client = DynClient::new(&server.base_url(), fast_options()).unwrap();
        let response = client
            .execute(Method::POST, "/REST/Session/", Some(&json!({})))
            .unwrap();

        assert!(!response.is_success());
        let rendered = describe_messages(&response.msgs);
        assert!(rendered.contains("did not match"));
        assert!(rendered.contains("INVALID_DATA"));
    }

    #[test]
    fn non_json_body_is_malformed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/REST/NodeList/example.com/");
            then.status(502).body("<html>bad gateway</html>");
        });

        let client = DynClient::new(&server.base_url(), fast_options()).unwrap();
        let err = client
            .execute(Method::GET, "/REST/NodeList/example.com/", None)
            .unwrap_err();

        let api = err.downcast_ref::<ApiError>().unwrap();
        assert!(matches!(api, ApiError::Malformed { status: 502, .. }));
    }

    #[test]
    fn follows_incomplete_job_until_done() {
        let server = MockServer::start();
        let report = server.mock(|when, then| {
            when.method(POST).path("/REST/ZoneNoteReport/");
            then.status(200)
                .json_body(json!({"status": "incomplete", "job_id": 42, "data": null}));
        });
        let job = server.mock(|when, then| {
            when.method(GET).path("/REST/Job/42/");
            then.status(200)
                .json_body(json!({"status": "success", "job_id": 42, "data": ["done"]}));
        });

        let client = DynClient::new(&server.base_url(), fast_options()).unwrap();
        let response = client
            .execute(Method::POST, "/REST/ZoneNoteReport/", Some(&json!({})))
            .unwrap();

        report.assert();
        job.assert();
        assert_eq!(response.data, json!(["done"]));
    }

    #[test]
    fn gives_up_on_jobs_that_never_finish() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/REST/ZoneNoteReport/");
            then.status(200)
                .json_body(json!({"status": "incomplete", "job_id": 7}));
        });
        let job = server.mock(|when, then| {
            when.method(GET).path("/REST/Job/7/");
            then.status(200)
                .json_body(json!({"status": "incomplete", "job_id": 7}));
        });

        let client = DynClient::new(&server.base_url(), fast_options()).unwrap();
        let err = client
            .execute(Method::POST, "/REST/ZoneNoteReport/", Some(&json!({})))
            .unwrap_err();

        assert_eq!(job.hits(), 3);
        assert!(err.to_string().contains("job 7 still incomplete"));
    }
}
