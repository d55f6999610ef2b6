//! Azure text-to-speech REST endpoint.

use crate::error::{ProviderError, service_status_error, service_transport_error};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use vocalis_abstraction::{ServiceError, SpeechSynthesizer};

pub const OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";
pub const DEFAULT_VOICE: &str = "en-US-JennyNeural";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct AzureSpeechSynthesizer {
    http_client: Client,
    endpoint: String,
    subscription_key: String,
}

impl AzureSpeechSynthesizer {
    pub fn new(region: &str, subscription_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_endpoint(format!("https://{region}.tts.speech.microsoft.com"), subscription_key)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        subscription_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            subscription_key: subscription_key.into(),
        })
    }
}

/// SSML document speaking `text` with `voice_name`.
pub fn build_ssml(text: &str, voice_name: &str) -> String {
    format!(
        "<speak version='1.0' xml:lang='{}' xmlns='http://www.w3.org/2001/10/synthesis'><voice name='{}'>{}</voice></speak>",
        voice_locale(voice_name),
        escape_xml(voice_name),
        escape_xml(text)
    )
}

/// `en-US-JennyNeural` speaks `en-US`; names without a locale prefix fall back to it.
fn voice_locale(voice_name: &str) -> String {
    let mut parts = voice_name.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(lang), Some(region), Some(_))
            if lang.len() == 2 && region.len() == 2 && lang.chars().all(|c| c.is_ascii_lowercase()) =>
        {
            format!("{lang}-{region}")
        }
        _ => "en-US".to_string(),
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[async_trait]
impl SpeechSynthesizer for AzureSpeechSynthesizer {
    async fn synthesize(&self, text: &str, voice_name: &str) -> Result<Bytes, ServiceError> {
        let operation = format!("synthesize with {voice_name}");
        debug!(voice = voice_name, chars = text.chars().count(), "Requesting speech synthesis");

        let response = self
            .http_client
            .post(format!("{}/cognitiveservices/v1", self.endpoint))
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("User-Agent", "vocalis")
            .body(build_ssml(text, voice_name))
            .send()
            .await
            .map_err(|e| service_transport_error(&e, &operation))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(service_status_error(status, &body, &operation));
        }

        let audio = response.bytes().await.map_err(|e| service_transport_error(&e, &operation))?;
        if audio.is_empty() {
            return Err(ServiceError::InvalidResponse(format!("{operation}: empty audio response")));
        }
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_ssml_escapes_text() {
        let ssml = build_ssml("Tom & Jerry <live>", "en-GB-RyanNeural");
        assert!(ssml.contains("xml:lang='en-GB'"));
        assert!(ssml.contains("<voice name='en-GB-RyanNeural'>Tom &amp; Jerry &lt;live&gt;</voice>"));
    }

    #[test]
    fn test_custom_voice_names_fall_back_to_default_locale() {
        assert!(build_ssml("hi", "MyCustomVoice").contains("xml:lang='en-US'"));
    }

    #[tokio::test]
    async fn test_synthesize_returns_audio() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/cognitiveservices/v1")
            .match_header("ocp-apim-subscription-key", "speech-key")
            .match_header("x-microsoft-outputformat", OUTPUT_FORMAT)
            .match_body(Matcher::Regex("Hello there".to_string()))
            .with_status(200)
            .with_header("content-type", "audio/wav")
            .with_body(b"RIFF....WAVE")
            .create_async()
            .await;

        let synthesizer = AzureSpeechSynthesizer::with_endpoint(server.url(), "speech-key").unwrap();
        let audio = synthesizer.synthesize("Hello there", DEFAULT_VOICE).await.unwrap();

        assert!(audio.starts_with(b"RIFF"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_synthesize_auth_failure() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/cognitiveservices/v1").with_status(401).create_async().await;

        let synthesizer = AzureSpeechSynthesizer::with_endpoint(server.url(), "bad-key").unwrap();
        let err = synthesizer.synthesize("Hello", DEFAULT_VOICE).await.unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_empty_audio_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/cognitiveservices/v1").with_status(200).create_async().await;

        let synthesizer = AzureSpeechSynthesizer::with_endpoint(server.url(), "speech-key").unwrap();
        let err = synthesizer.synthesize("Hello", DEFAULT_VOICE).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse(_)));
    }
}
