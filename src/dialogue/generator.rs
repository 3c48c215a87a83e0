//! Remote dialogue generation boundary
//!
//! The text-generation model runs as a remote service. The service may have
//! to load the model first; it reports loading progress as newline-delimited
//! JSON events which are republished here as a `[0, 1]` fraction for display.

use crate::{PodcastError, Result};
use async_trait::async_trait;
use futures_util::stream::{Stream, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{watch, OnceCell};

/// One generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub do_sample: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_new_tokens: 300,
            temperature: 0.7,
            top_p: 0.9,
            do_sample: true,
        }
    }
}

/// Text generation service
///
/// Implementations turn a prompt into free-form text; parsing that text into
/// dialogue is the caller's job.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Make sure the model is loaded; concurrent callers share one load
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Generate text for a prompt
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Build a request carrying this generator's sampling settings
    fn request(&self, prompt: String) -> GenerationRequest {
        GenerationRequest::new(prompt)
    }
}

/// Normalize a reported load progress to `[0, 1]`
///
/// Services report either a fraction or a percentage; anything above 1 is
/// taken as a percentage.
pub fn normalize_progress(raw: f64) -> f32 {
    if !raw.is_finite() {
        return 0.0;
    }
    let fraction = if raw > 1.0 { raw / 100.0 } else { raw };
    fraction.clamp(0.0, 1.0) as f32
}

/// Load event streamed by the service while the model loads
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoadEvent {
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Parse one line of the load stream; blank or malformed lines are skipped
pub fn parse_load_line(line: &str) -> Option<LoadEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Skipping malformed load event {:?}: {}", line, e);
            None
        }
    }
}

/// Read newline-delimited load events from a byte stream
///
/// Lines may be split across chunks, even inside a multi-byte character;
/// only complete lines are decoded. A last line without a newline is still
/// read.
pub async fn read_load_events<S, B, E, F>(stream: S, mut on_event: F) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    PodcastError: From<E>,
    F: FnMut(LoadEvent) -> Result<()>,
{
    let mut stream = std::pin::pin!(stream);
    let mut pending: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        pending.extend_from_slice(chunk?.as_ref());

        while let Some(newline) = pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = pending.drain(..=newline).collect();
            if let Some(event) = parse_load_line(&String::from_utf8_lossy(&line)) {
                on_event(event)?;
            }
        }
    }
    if let Some(event) = parse_load_line(&String::from_utf8_lossy(&pending)) {
        on_event(event)?;
    }
    Ok(())
}

/// One-time model load shared by concurrent callers
///
/// Everyone waiting while a load runs gets its result. A failed load leaves
/// the cell empty so the next caller tries again.
#[derive(Debug, Default)]
pub struct SharedLoad {
    done: OnceCell<()>,
}

impl SharedLoad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.done.initialized()
    }

    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.done.get_or_try_init(load).await.map(|_| ())
    }
}

#[derive(Serialize)]
struct LoadBody<'a> {
    model: &'a str,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    inputs: &'a str,
    parameters: GenerateParameters,
}

#[derive(Serialize)]
struct GenerateParameters {
    max_new_tokens: u32,
    temperature: f32,
    top_p: f32,
    do_sample: bool,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

/// The service answers with either a list or a single object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Many(Vec<GeneratedText>),
    One(GeneratedText),
}

impl GenerationResponse {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Many(items) => items.into_iter().next().map(|g| g.generated_text),
            Self::One(item) => Some(item.generated_text),
        }
    }
}

/// Extract the generated text from a response body
pub fn parse_generation_response(body: &str) -> Result<String> {
    let response: GenerationResponse = serde_json::from_str(body)?;
    match response.into_text() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(PodcastError::Generation("empty generation result".to_string())),
    }
}

/// Where and how to reach the generation service
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl GeneratorConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: "Xenova/t5-small".to_string(),
            timeout: Duration::from_secs(120),
            max_new_tokens: 300,
            temperature: 0.7,
            top_p: 0.9,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }
}

/// Generation service over HTTP
pub struct HttpGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
    loaded: SharedLoad,
    progress: watch::Sender<f32>,
}

impl HttpGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("webpodcast/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let (progress, _) = watch::channel(0.0);

        Ok(Self {
            client,
            config,
            loaded: SharedLoad::new(),
            progress,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Model load progress, `[0, 1]`
    pub fn progress(&self) -> watch::Receiver<f32> {
        self.progress.subscribe()
    }

    fn publish(&self, event: &LoadEvent) -> Result<()> {
        match event.status.as_str() {
            "progress" => {
                let fraction = normalize_progress(event.progress.unwrap_or(0.0));
                self.progress.send_replace(fraction);
            }
            "ready" | "done" => {
                self.progress.send_replace(1.0);
            }
            "error" => {
                return Err(PodcastError::Generation(format!(
                    "model failed to load: {}",
                    event.error.as_deref().unwrap_or("unknown error")
                )));
            }
            other => debug!("Load event: {}", other),
        }
        Ok(())
    }

    async fn load(&self) -> Result<()> {
        info!("Loading generation model {}", self.config.model);

        let response = self
            .client
            .post(self.config.url("load"))
            .json(&LoadBody {
                model: &self.config.model,
            })
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("Service has no load endpoint; assuming model is ready");
            self.progress.send_replace(1.0);
            return Ok(());
        }

        let stream = response.error_for_status()?.bytes_stream();
        read_load_events(stream, |event| self.publish(&event)).await?;

        self.progress.send_replace(1.0);
        info!("Generation model ready");
        Ok(())
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn ensure_ready(&self) -> Result<()> {
        self.loaded
            .get_or_load(|| async {
                self.load().await.map_err(|e| {
                    warn!("Model load failed: {}", e);
                    e
                })
            })
            .await
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = GenerateBody {
            model: &self.config.model,
            inputs: &request.prompt,
            parameters: GenerateParameters {
                max_new_tokens: request.max_new_tokens,
                temperature: request.temperature,
                top_p: request.top_p,
                do_sample: request.do_sample,
            },
        };

        debug!("Generating with {} prompt chars", request.prompt.len());
        let text = self
            .client
            .post(self.config.url("generate"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_generation_response(&text)
    }

    fn request(&self, prompt: String) -> GenerationRequest {
        GenerationRequest {
            prompt,
            max_new_tokens: self.config.max_new_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            do_sample: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_normalize_progress() {
        assert_eq!(normalize_progress(0.0), 0.0);
        assert_eq!(normalize_progress(0.5), 0.5);
        assert_eq!(normalize_progress(1.0), 1.0);
        assert_eq!(normalize_progress(42.0), 0.42);
        assert_eq!(normalize_progress(100.0), 1.0);
        assert_eq!(normalize_progress(250.0), 1.0);
        assert_eq!(normalize_progress(-3.0), 0.0);
        assert_eq!(normalize_progress(f64::NAN), 0.0);
    }

    #[test]
    fn test_parse_load_line() {
        let event = parse_load_line(r#"{"status":"progress","progress":37.5}"#).unwrap();
        assert_eq!(event.status, "progress");
        assert_eq!(event.progress, Some(37.5));

        let event = parse_load_line(r#"{"status":"ready"}"#).unwrap();
        assert_eq!(event.progress, None);

        assert!(parse_load_line("   ").is_none());
        assert!(parse_load_line("not json").is_none());
    }

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>>> {
        let parts: Vec<Result<Vec<u8>>> = parts.iter().map(|part| Ok(part.to_vec())).collect();
        futures_util::stream::iter(parts)
    }

    async fn collect_events(parts: &[&[u8]]) -> Result<Vec<LoadEvent>> {
        let mut events = Vec::new();
        read_load_events(chunks(parts), |event| {
            events.push(event);
            Ok(())
        })
        .await?;
        Ok(events)
    }

    #[tokio::test]
    async fn test_load_events_split_across_chunks() {
        let events = collect_events(&[
            b"{\"status\":\"prog",
            b"ress\",\"progress\":25}\n{\"status\":",
            b"\"progress\",\"progress\":0.5}\n\n",
            b"{\"status\":\"ready\"}",
        ])
        .await
        .unwrap();

        let statuses: Vec<_> = events.iter().map(|e| e.status.as_str()).collect();
        assert_eq!(statuses, vec!["progress", "progress", "ready"]);
        assert_eq!(events[0].progress, Some(25.0));
        assert_eq!(events[1].progress, Some(0.5));
    }

    #[tokio::test]
    async fn test_load_events_keep_split_characters() {
        // "é" is two bytes; the chunk boundary falls between them
        let line = "{\"status\":\"error\",\"error\":\"modèle absent\"}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let events = collect_events(&[&line[..split], &line[split..]]).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].error.as_deref(), Some("modèle absent"));
    }

    #[tokio::test]
    async fn test_load_events_stop_on_error() {
        let mut seen = 0;
        let result = read_load_events(chunks(&[b"{\"status\":\"a\"}\n{\"status\":\"b\"}\n"]), |_| {
            seen += 1;
            Err(PodcastError::Generation("stop".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn test_shared_load_runs_once_for_concurrent_callers() {
        let load = SharedLoad::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let run = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(())
        };

        let (first, second) = tokio::join!(load.get_or_load(run), load.get_or_load(run));
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(load.is_loaded());

        load.get_or_load(run).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shared_load_retries_after_failure() {
        let load = SharedLoad::new();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let run = move || async move {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Err(PodcastError::Generation("still warming up".to_string()))
            } else {
                Ok(())
            }
        };

        assert!(load.get_or_load(run).await.is_err());
        assert!(!load.is_loaded());

        load.get_or_load(run).await.unwrap();
        assert!(load.is_loaded());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parse_generation_response() {
        let text = parse_generation_response(r#"[{"generated_text":"Host: Hi"}]"#).unwrap();
        assert_eq!(text, "Host: Hi");

        let text = parse_generation_response(r#"{"generated_text":"Expert: Hello"}"#).unwrap();
        assert_eq!(text, "Expert: Hello");

        assert!(matches!(
            parse_generation_response(r#"[]"#),
            Err(PodcastError::Generation(_))
        ));
        assert!(matches!(
            parse_generation_response(r#"[{"generated_text":"  "}]"#),
            Err(PodcastError::Generation(_))
        ));
        assert!(matches!(
            parse_generation_response("<html>"),
            Err(PodcastError::Json(_))
        ));
    }

    #[test]
    fn test_config_url() {
        let config = GeneratorConfig::new("http://localhost:8080/");
        assert_eq!(config.url("generate"), "http://localhost:8080/generate");
    }

    #[test]
    fn test_publish_events() {
        let generator = HttpGenerator::new(GeneratorConfig::new("http://localhost:1")).unwrap();
        let progress = generator.progress();

        let event = parse_load_line(r#"{"status":"progress","progress":60}"#).unwrap();
        generator.publish(&event).unwrap();
        assert_eq!(*progress.borrow(), 0.6);

        let failed = parse_load_line(r#"{"status":"error","error":"out of memory"}"#).unwrap();
        assert!(generator.publish(&failed).is_err());
    }

    #[test]
    fn test_request_uses_configured_sampling() {
        let mut config = GeneratorConfig::new("http://localhost:1");
        config.max_new_tokens = 64;
        config.temperature = 0.2;
        let generator = HttpGenerator::new(config).unwrap();

        let request = generator.request("prompt".to_string());
        assert_eq!(request.max_new_tokens, 64);
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.top_p, 0.9);
        assert!(request.do_sample);
    }
}
