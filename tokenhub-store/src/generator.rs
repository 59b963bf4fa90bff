use log::{error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokenhub_core::{Config, User, ValidationError};

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Image generation is not configured")]
    NotConfigured,
    #[error("Failed to generate image. Please try again later.")]
    GenerationFailed,
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
    error: Option<GenerationErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct GenerationErrorBody {
    message: String,
}

/// Generates product photos through an external image API
pub struct ImageGenerator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ImageGenerator {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.image_endpoint, config.image_api_key.clone())
    }

    /// Generates an image of the described product and returns its url.
    /// The user needs a positive balance, nothing is deducted.
    pub async fn generate_for(&self, user: &User, description: &str) -> Result<String, GeneratorError> {
        let description = description.trim();

        if description.is_empty() {
            return Err(ValidationError::EmptyPrompt.into());
        }

        if user.api_tokens <= 0 {
            return Err(ValidationError::NoTokensAvailable.into());
        }

        let api_key = self.api_key.as_ref().ok_or(GeneratorError::NotConfigured)?;
        let prompt = prompt_for(description);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&GenerationRequest {
                prompt: &prompt,
                n: 1,
                size: "1024x1024",
            })
            .send()
            .await
            .map_err(|e| {
                error!("Image request failed: {}", e);
                GeneratorError::GenerationFailed
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read image response: {}", e);
            GeneratorError::GenerationFailed
        })?;

        if !status.is_success() {
            error!("Image API answered {}: {}", status, body);
            return Err(GeneratorError::GenerationFailed);
        }

        let url = parse_response(&body)?;
        info!("Generated an image for {}", user.email);

        Ok(url)
    }
}

pub fn prompt_for(description: &str) -> String {
    format!(
        "Professional product photography of {}. High resolution, studio lighting, white background, commercial quality",
        description
    )
}

/// Takes the url of the first image out of a response body
fn parse_response(body: &str) -> Result<String, GeneratorError> {
    let response: GenerationResponse = serde_json::from_str(body).map_err(|e| {
        error!("Malformed image response: {}", e);
        GeneratorError::GenerationFailed
    })?;

    if let Some(e) = response.error {
        error!("Image API error: {}", e.message);
        return Err(GeneratorError::GenerationFailed);
    }

    response
        .data
        .into_iter()
        .next()
        .map(|image| image.url)
        .ok_or(GeneratorError::GenerationFailed)
}

#[cfg(test)]
mod test {
    use tokenhub_core::Role;
    use uuid::Uuid;

    use super::*;

    fn user(api_tokens: i64) -> User {
        User {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            name: "User".to_string(),
            role: Role::User,
            api_tokens,
        }
    }

    #[test]
    fn test_prompt() {
        assert_eq!(
            prompt_for("a ceramic mug"),
            "Professional product photography of a ceramic mug. High resolution, studio lighting, white background, commercial quality"
        );
    }

    #[test]
    fn test_parse_response() {
        let ok = r#"{ "created": 1, "data": [{ "url": "https://images.example.com/1.png" }] }"#;
        assert_eq!(parse_response(ok).unwrap(), "https://images.example.com/1.png");

        let failed = r#"{ "error": { "message": "Billing hard limit reached" } }"#;
        assert!(matches!(parse_response(failed), Err(GeneratorError::GenerationFailed)));

        assert!(matches!(parse_response("{}"), Err(GeneratorError::GenerationFailed)));
        assert!(matches!(parse_response("<html>"), Err(GeneratorError::GenerationFailed)));
    }

    #[tokio::test]
    async fn test_checks_before_calling() {
        let generator = ImageGenerator::new("http://127.0.0.1:9/unreachable", None);

        assert!(matches!(
            generator.generate_for(&user(10), "   ").await,
            Err(GeneratorError::Validation(ValidationError::EmptyPrompt))
        ));
        assert!(matches!(
            generator.generate_for(&user(0), "a mug").await,
            Err(GeneratorError::Validation(ValidationError::NoTokensAvailable))
        ));
        assert!(matches!(
            generator.generate_for(&user(10), "a mug").await,
            Err(GeneratorError::NotConfigured)
        ));
    }
}
