//! Image prompt resolution with a local fallback.

use tracing::{debug, warn};

use crate::config::TextGenerationConfig;
use crate::constants::PRODUCT_NAME_PLACEHOLDER;
use crate::error::PipelineError;
use crate::upstream::{TextGenerationClient, TextGenerationError};

/// Produces the text prompt for the image generator. Never fails.
#[derive(Clone, Debug)]
pub struct PromptResolver {
    client: TextGenerationClient,
    system_prompt: String,
    fallback_template: String,
}

impl PromptResolver {
    /// Builds a resolver around the configured text generation service.
    pub fn new(config: &TextGenerationConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            client: TextGenerationClient::new(config)?,
            system_prompt: config.system_prompt.clone(),
            fallback_template: config.fallback_prompt.clone(),
        })
    }

    /// Returns a generated prompt, or the fallback template when generation
    /// is not configured or fails in any way.
    pub async fn resolve(&self, subject_name: &str, style_instruction: &str) -> String {
        match self.generate(subject_name, style_instruction).await {
            Ok(prompt) => prompt,
            Err(TextGenerationError::NotConfigured) => {
                debug!("Text generation not configured, using fallback prompt");
                self.fallback(subject_name)
            }
            Err(err) => {
                warn!("Prompt generation failed, using fallback prompt: {err}");
                self.fallback(subject_name)
            }
        }
    }

    /// Asks the text generation service for a prompt.
    pub async fn generate(
        &self,
        subject_name: &str,
        style_instruction: &str,
    ) -> Result<String, TextGenerationError> {
        if !self.client.is_configured() {
            return Err(TextGenerationError::NotConfigured);
        }
        let user_message = format!("Describe: {subject_name}. Style Requirement: {style_instruction}");
        self.client.complete(&self.system_prompt, &user_message).await
    }

    /// The fallback template with the subject substituted in.
    pub fn fallback(&self, subject_name: &str) -> String {
        render_fallback(&self.fallback_template, subject_name)
    }
}

/// Substitutes `subject_name` for every `{product_name}` in `template`.
/// Other braces are left alone, so this can't fail.
pub fn render_fallback(template: &str, subject_name: &str) -> String {
    template.replace(PRODUCT_NAME_PLACEHOLDER, subject_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::constants::{DEFAULT_AI_FALLBACK_PROMPT, DEFAULT_AI_SYSTEM_PROMPT};
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    fn config(base_url: &str, api_key: Option<&str>) -> TextGenerationConfig {
        TextGenerationConfig {
            api_key: api_key.map(Secret::new),
            base_url: Url::parse(base_url).unwrap(),
            model: "deepseek-chat".to_string(),
            system_prompt: DEFAULT_AI_SYSTEM_PROMPT.to_string(),
            fallback_prompt: DEFAULT_AI_FALLBACK_PROMPT.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn fallback_inserts_subject_literally() {
        assert_eq!(
            render_fallback(DEFAULT_AI_FALLBACK_PROMPT, "Margherita Pizza"),
            "Professional food photo of Margherita Pizza, isolated on white background."
        );
        assert_eq!(
            render_fallback("{x} {product_name} {}", "{product_name} & {0}"),
            "{x} {product_name} & {0} {}"
        );
    }

    #[tokio::test]
    async fn no_credential_means_no_calls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let resolver = PromptResolver::new(&config(&server.url(), None)).unwrap();
        let prompt = resolver.resolve("Margherita Pizza", "anything").await;
        assert_eq!(
            prompt,
            "Professional food photo of Margherita Pizza, isolated on white background."
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generated_prompt_is_used() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "deepseek-chat",
                "messages": [
                    {"role": "system", "content": DEFAULT_AI_SYSTEM_PROMPT},
                    {"role": "user", "content": "Describe: Caesar Salad. Style Requirement: flat lighting"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "choices": [{"message": {"role": "assistant", "content": "  Crisp romaine, top-down  "}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let resolver = PromptResolver::new(&config(&server.url(), Some("sk-test"))).unwrap();
        let prompt = resolver.resolve("Caesar Salad", "flat lighting").await;
        assert_eq!(prompt, "Crisp romaine, top-down");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"bad key"}}"#)
            .create_async()
            .await;

        let resolver = PromptResolver::new(&config(&server.url(), Some("sk-bad"))).unwrap();
        let prompt = resolver.resolve("Tiramisu", "x").await;
        assert_eq!(
            prompt,
            "Professional food photo of Tiramisu, isolated on white background."
        );
        assert!(matches!(
            resolver.generate("Tiramisu", "x").await,
            Err(TextGenerationError::Status(401, _))
        ));
    }

    #[tokio::test]
    async fn malformed_response_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let resolver = PromptResolver::new(&config(&server.url(), Some("sk-test"))).unwrap();
        assert!(matches!(
            resolver.generate("Ramen", "x").await,
            Err(TextGenerationError::Malformed(_))
        ));
        assert_eq!(
            resolver.resolve("Ramen", "x").await,
            "Professional food photo of Ramen, isolated on white background."
        );
    }

    #[tokio::test]
    async fn unreachable_service_falls_back() {
        // Nothing listens on the discard port.
        let resolver = PromptResolver::new(&config("http://127.0.0.1:9", Some("sk"))).unwrap();
        assert_eq!(
            resolver.resolve("Pho", "x").await,
            "Professional food photo of Pho, isolated on white background."
        );
    }

    #[tokio::test]
    async fn slow_service_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_chunked_body(|writer| {
                std::thread::sleep(Duration::from_millis(1500));
                writer.write_all(br#"{"choices": []}"#)
            })
            .create_async()
            .await;

        let mut cfg = config(&server.url(), Some("sk-test"));
        cfg.timeout = Duration::from_millis(300);
        cfg.fallback_prompt = "P {product_name}".to_string();
        let resolver = PromptResolver::new(&cfg).unwrap();
        assert!(matches!(
            resolver.generate("Soup", "x").await,
            Err(TextGenerationError::Timeout)
        ));
        assert_eq!(resolver.resolve("Soup", "x").await, "P Soup");
    }
}
