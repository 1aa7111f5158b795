//! Model hub availability checks

use langcheck_core::{Error, Result};
use std::time::Duration;

/// Default model hub endpoint
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

/// Remote registry that can confirm a model (and revision) exists
pub trait HubClient {
    /// Whether `model_name` exists, at `revision` when given
    ///
    /// Returns `Ok(false)` when the hub answers but does not know the model,
    /// and an error when the hub cannot be reached.
    fn model_exists(&self, model_name: &str, revision: Option<&str>) -> Result<bool>;
}

impl<T: HubClient + ?Sized> HubClient for &T {
    fn model_exists(&self, model_name: &str, revision: Option<&str>) -> Result<bool> {
        (**self).model_exists(model_name, revision)
    }
}

impl<T: HubClient + ?Sized> HubClient for Box<T> {
    fn model_exists(&self, model_name: &str, revision: Option<&str>) -> Result<bool> {
        (**self).model_exists(model_name, revision)
    }
}

/// Connection settings for the Hugging Face hub API
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// Base URL of the hub
    pub endpoint: String,

    /// Connect timeout
    pub connect_timeout: Duration,

    /// Overall request timeout
    pub request_timeout: Duration,

    /// Access token for private or gated models
    pub token: Option<String>,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_HUB_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
            token: None,
        }
    }
}

impl HubSettings {
    /// Defaults overridden by `HF_ENDPOINT` and `HF_TOKEN`
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(endpoint) = std::env::var("HF_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                settings.endpoint = endpoint.trim().trim_end_matches('/').to_string();
            }
        }

        settings.token = std::env::var("HF_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        settings
    }

    /// Override the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Override both timeouts
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.request_timeout = timeout;
        self
    }
}

/// Hugging Face hub client backed by a blocking HTTP client
pub struct HuggingFaceHub {
    client: reqwest::blocking::Client,
    settings: HubSettings,
}

impl HuggingFaceHub {
    /// Create a client with the given settings
    pub fn new(settings: HubSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| Error::hub(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    /// Create a client configured from the environment
    pub fn from_env() -> Result<Self> {
        Self::new(HubSettings::from_env())
    }

    /// Settings in use
    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }
}

impl HubClient for HuggingFaceHub {
    fn model_exists(&self, model_name: &str, revision: Option<&str>) -> Result<bool> {
        let url = model_info_url(&self.settings.endpoint, model_name, revision);
        tracing::debug!("Checking model availability at {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.settings.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| Error::hub(format!("Failed to reach {}: {}", url, e)))?;

        let status = response.status();
        tracing::debug!("Model hub answered {} for {}", status, model_name);

        Ok(status == reqwest::StatusCode::OK)
    }
}

/// URL of the model info endpoint for a model and optional revision
pub fn model_info_url(endpoint: &str, model_name: &str, revision: Option<&str>) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    match revision {
        Some(revision) => format!(
            "{}/api/models/{}/revision/{}",
            endpoint, model_name, revision
        ),
        None => format!("{}/api/models/{}", endpoint, model_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_model_info_url() {
        assert_eq!(
            model_info_url(DEFAULT_HUB_ENDPOINT, "BAAI/bge-base-zh-v1.5", None),
            "https://huggingface.co/api/models/BAAI/bge-base-zh-v1.5"
        );
        assert_eq!(
            model_info_url("http://localhost:8080/", "org/model", Some("v2")),
            "http://localhost:8080/api/models/org/model/revision/v2"
        );
    }

    #[test]
    fn test_settings_builder() {
        let settings = HubSettings::default()
            .with_endpoint("https://hf-mirror.example/")
            .with_timeout(Duration::from_millis(250));

        assert_eq!(settings.endpoint, "https://hf-mirror.example");
        assert_eq!(settings.connect_timeout, Duration::from_millis(250));
        assert_eq!(settings.request_timeout, Duration::from_millis(250));
    }

    /// Serves `requests` hub API calls on loopback: 200 for known paths,
    /// 404 otherwise. Each request's path and bearer token are reported.
    fn serve_hub(requests: usize) -> (String, mpsc::Receiver<(String, Option<String>)>) {
        const KNOWN: [&str; 2] = ["/api/models/org/model", "/api/models/org/model/revision/v1"];

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for stream in listener.incoming().take(requests) {
                let mut stream = stream.unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let path = request_line.split_whitespace().nth(1).unwrap_or_default().to_string();

                let mut token = None;
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    let header = header.trim_end();
                    if header.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        if name.eq_ignore_ascii_case("authorization") {
                            token = value.trim().strip_prefix("Bearer ").map(str::to_string);
                        }
                    }
                }

                let status = if KNOWN.contains(&path.as_str()) {
                    "200 OK"
                } else {
                    "404 Not Found"
                };
                write!(
                    stream,
                    "HTTP/1.1 {}\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{{}}",
                    status
                )
                .unwrap();
                tx.send((path, token)).unwrap();
            }
        });

        (endpoint, rx)
    }

    #[test]
    fn test_status_maps_to_existence() {
        let (endpoint, requests) = serve_hub(4);
        let settings = HubSettings::default()
            .with_endpoint(endpoint)
            .with_timeout(Duration::from_secs(2));
        let hub = HuggingFaceHub::new(settings).unwrap();

        assert!(hub.model_exists("org/model", None).unwrap());
        assert!(!hub.model_exists("org/missing", None).unwrap());
        assert!(hub.model_exists("org/model", Some("v1")).unwrap());
        assert!(!hub.model_exists("org/model", Some("v2")).unwrap());

        let paths: Vec<String> = requests.iter().take(4).map(|(path, _)| path).collect();
        assert_eq!(
            paths,
            vec![
                "/api/models/org/model",
                "/api/models/org/missing",
                "/api/models/org/model/revision/v1",
                "/api/models/org/model/revision/v2",
            ]
        );
    }

    #[test]
    fn test_token_is_sent_as_bearer() {
        let (endpoint, requests) = serve_hub(1);
        let mut settings = HubSettings::default()
            .with_endpoint(endpoint)
            .with_timeout(Duration::from_secs(2));
        settings.token = Some("hf_secret".to_string());
        let hub = HuggingFaceHub::new(settings).unwrap();

        assert!(hub.model_exists("org/model", None).unwrap());
        let (_, token) = requests.recv().unwrap();
        assert_eq!(token.as_deref(), Some("hf_secret"));
    }

    #[test]
    fn test_unreachable_hub_is_an_error() {
        // Port 9 (discard) on loopback refuses connections on typical hosts.
        let settings = HubSettings::default()
            .with_endpoint("http://127.0.0.1:9")
            .with_timeout(Duration::from_millis(200));
        let hub = HuggingFaceHub::new(settings).unwrap();

        let err = hub.model_exists("org/model", None).unwrap_err();
        assert!(matches!(err, Error::Hub(_)));
    }
}
