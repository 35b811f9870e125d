use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use log::debug;
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::UploadError;
use crate::config::EcotaxaSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// `/users/me`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// `/projects/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub title: Option<String>,
}

/// State letter of an EcoTaxa job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    /// Waiting for answers on the web interface
    Asking,
    Error,
    Finished,
    Unknown(String),
}

impl JobState {
    pub fn from_code(code: &str) -> Self {
        match code {
            "P" => JobState::Pending,
            "R" => JobState::Running,
            "A" => JobState::Asking,
            "E" => JobState::Error,
            "F" => JobState::Finished,
            other => JobState::Unknown(other.to_string()),
        }
    }
}

/// `/jobs/{id}/`
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub progress_pct: Option<f64>,
    #[serde(default)]
    pub progress_msg: Option<String>,
    #[serde(default)]
    pub errors: Vec<Value>,
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        JobState::from_code(&self.state)
    }

    /// Remote error list, rendered as text
    pub fn error_messages(&self) -> Vec<String> {
        render_errors(&self.errors)
    }
}

#[derive(Debug, Deserialize)]
struct ImportResponse {
    #[serde(default)]
    job_id: i64,
    #[serde(default)]
    errors: Vec<Value>,
}

/// The subset of the EcoTaxa REST API used for uploads
pub trait EcotaxaApi {
    /// Exchange credentials for a bearer token
    fn login(&self, username: &str, password: &str) -> Result<String, UploadError>;

    /// Account behind `token`, or `None` when the token is rejected
    fn user_info(&self, token: &str) -> Result<Option<UserInfo>, UploadError>;

    fn project_info(&self, token: &str, project_id: i64) -> Result<ProjectInfo, UploadError>;

    /// Original ids of the samples already in the project
    fn existing_samples(&self, token: &str, project_id: i64) -> Result<HashSet<String>, UploadError>;

    /// Upload a file to the user's area; returns its server path
    fn upload_file(&self, token: &str, path: &Path) -> Result<String, UploadError>;

    /// Start importing an uploaded file; returns the job id
    fn start_import(&self, token: &str, project_id: i64, source_path: &str) -> Result<i64, UploadError>;

    fn job_status(&self, token: &str, job_id: i64) -> Result<JobStatus, UploadError>;
}

/// [`EcotaxaApi`] over HTTPS
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    upload_timeout: Duration,
}

impl HttpApi {
    pub fn new(settings: &EcotaxaSettings) -> Result<Self, UploadError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            upload_timeout: Duration::from_secs(settings.upload_timeout_secs),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request.bearer_auth(token)
    }
}

/// Fail on any status other than 200
fn expect_ok(endpoint: &str, response: Response) -> Result<Response, UploadError> {
    if response.status() == StatusCode::OK {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    Err(UploadError::Status {
        endpoint: endpoint.to_string(),
        status,
        body,
    })
}

fn parse<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, UploadError> {
    let body = response.text()?;
    serde_json::from_str(&body).map_err(|e| UploadError::InvalidResponse {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

fn render_errors(errors: &[Value]) -> Vec<String> {
    errors
        .iter()
        .map(|e| match e {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

impl EcotaxaApi for HttpApi {
    fn login(&self, username: &str, password: &str) -> Result<String, UploadError> {
        let endpoint = "/login";
        let response = self
            .client
            .post(self.url(endpoint))
            .json(&json!({"username": username, "password": password}))
            .send()?;
        parse(endpoint, expect_ok(endpoint, response)?)
    }

    fn user_info(&self, token: &str) -> Result<Option<UserInfo>, UploadError> {
        let endpoint = "/users/me";
        let response = self
            .authorized(self.client.get(self.url(endpoint)), token)
            .send()?;
        match response.status() {
            StatusCode::OK => Ok(Some(parse(endpoint, response)?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => Err(UploadError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            }),
        }
    }

    fn project_info(&self, token: &str, project_id: i64) -> Result<ProjectInfo, UploadError> {
        let endpoint = format!("/projects/{}", project_id);
        let response = self
            .authorized(self.client.get(self.url(&endpoint)), token)
            .send()?;
        parse(&endpoint, expect_ok(&endpoint, response)?)
    }

    fn existing_samples(&self, token: &str, project_id: i64) -> Result<HashSet<String>, UploadError> {
        let endpoint = "/samples/search";
        let response = self
            .authorized(self.client.get(self.url(endpoint)), token)
            .query(&[("project_ids", project_id.to_string()), ("id_pattern", "*".to_string())])
            .send()?;
        let samples: Vec<Value> = parse(endpoint, expect_ok(endpoint, response)?)?;
        Ok(samples
            .iter()
            .filter_map(|s| s.get("orig_id").and_then(Value::as_str))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn upload_file(&self, token: &str, path: &Path) -> Result<String, UploadError> {
        let endpoint = "/user_files/";
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let bytes = std::fs::read(path)?;
        debug!("Uploading {} ({} bytes)", file_name, bytes.len());

        let form = multipart::Form::new().part(
            "file",
            multipart::Part::bytes(bytes)
                .file_name(file_name)
                .mime_str("application/zip")?,
        );
        let response = self
            .authorized(self.client.post(self.url(endpoint)), token)
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()?;
        parse(endpoint, expect_ok(endpoint, response)?)
    }

    fn start_import(&self, token: &str, project_id: i64, source_path: &str) -> Result<i64, UploadError> {
        let endpoint = format!("/file_import/{}", project_id);
        let request = json!({
            "source_path": source_path,
            "skip_loaded_files": false,
            "skip_existing_objects": false,
            "update_mode": "",
        });
        let response = self
            .authorized(self.client.post(self.url(&endpoint)), token)
            .json(&request)
            .send()?;
        let result: ImportResponse = parse(&endpoint, expect_ok(&endpoint, response)?)?;

        if !result.errors.is_empty() {
            return Err(UploadError::Remote(render_errors(&result.errors)));
        }
        if result.job_id <= 0 {
            return Err(UploadError::InvalidResponse {
                endpoint,
                reason: "no job id returned".to_string(),
            });
        }
        Ok(result.job_id)
    }

    fn job_status(&self, token: &str, job_id: i64) -> Result<JobStatus, UploadError> {
        let endpoint = format!("/jobs/{}/", job_id);
        let response = self
            .authorized(self.client.get(self.url(&endpoint)), token)
            .send()?;
        parse(&endpoint, expect_ok(&endpoint, response)?)
    }
}
