//! Provider-specific configuration and detection.
//!
//! OpenAI-compatible services differ in URL layout, how the key is sent, and
//! a few optional headers. Everything else about the request is shared.

/// Supported completion providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        /// Deployment name (required for Azure)
        deployment_name: String,
        /// API version (e.g., "2024-08-01-preview")
        api_version: String,
    },
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// Together AI (together.ai, together.xyz)
    TogetherAI,
    /// Groq (groq.com)
    Groq,
    /// Generic OpenAI-compatible provider
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// ```rust
    /// use returns_concierge::llm::Provider;
    ///
    /// assert_eq!(Provider::detect_from_url("https://openrouter.ai/api"), Provider::OpenRouter);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("openai.azure.com") {
            Self::AzureOpenAI {
                deployment_name: String::new(),
                api_version: "2024-08-01-preview".to_string(),
            }
        } else if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("together.ai") || lower.contains("together.xyz") {
            Self::TogetherAI
        } else if lower.contains("groq.com") {
            Self::Groq
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Build the chat completions URL for this provider.
    ///
    /// A base URL that already ends in `/chat/completions` is used as is.
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            return base.to_string();
        }

        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => format!(
                "{base}/openai/deployments/{deployment_name}/chat/completions?api-version={api_version}"
            ),
            _ if base.ends_with("/v1") => format!("{base}/chat/completions"),
            Self::Groq if !base.ends_with("/openai") => {
                format!("{base}/openai/v1/chat/completions")
            }
            _ => format!("{base}/v1/chat/completions"),
        }
    }

    /// Header carrying the API key, and whether it uses the bearer scheme.
    #[must_use]
    pub fn auth_header(&self) -> (&'static str, bool) {
        match self {
            Self::AzureOpenAI { .. } => ("api-key", false),
            _ => ("authorization", true),
        }
    }

    /// Extra headers identifying the calling application.
    ///
    /// Only `OpenRouter` reads these (`HTTP-Referer`, `X-Title`).
    #[must_use]
    pub fn attribution_headers<'a>(
        &self,
        site_url: Option<&'a str>,
        site_name: Option<&'a str>,
    ) -> Vec<(&'static str, &'a str)> {
        if *self != Self::OpenRouter {
            return Vec::new();
        }
        let mut headers = Vec::new();
        if let Some(url) = site_url.filter(|s| !s.is_empty()) {
            headers.push(("HTTP-Referer", url));
        }
        if let Some(name) = site_name.filter(|s| !s.is_empty()) {
            headers.push(("X-Title", name));
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_openai() {
        assert_eq!(
            Provider::detect_from_url("https://api.openai.com"),
            Provider::OpenAI
        );
    }

    #[test]
    fn test_detect_azure() {
        let provider = Provider::detect_from_url("https://my-resource.openai.azure.com");
        assert!(matches!(provider, Provider::AzureOpenAI { .. }));
    }

    #[test]
    fn test_detect_openrouter_and_generic() {
        assert_eq!(
            Provider::detect_from_url("https://openrouter.ai/api"),
            Provider::OpenRouter
        );
        assert_eq!(
            Provider::detect_from_url("http://127.0.0.1:8080"),
            Provider::Generic
        );
    }

    #[test]
    fn test_build_url_openrouter() {
        let url = Provider::OpenRouter.build_chat_url("https://openrouter.ai/api/");
        assert_eq!(url, "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn test_build_url_respects_existing_suffixes() {
        assert_eq!(
            Provider::Generic.build_chat_url("http://localhost:1234/v1"),
            "http://localhost:1234/v1/chat/completions"
        );
        assert_eq!(
            Provider::Generic.build_chat_url("http://localhost:1234/v1/chat/completions"),
            "http://localhost:1234/v1/chat/completions"
        );
        assert_eq!(
            Provider::Groq.build_chat_url("https://api.groq.com"),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_build_url_azure() {
        let provider = Provider::AzureOpenAI {
            deployment_name: "gpt-35".to_string(),
            api_version: "2024-08-01-preview".to_string(),
        };
        assert_eq!(
            provider.build_chat_url("https://my-resource.openai.azure.com"),
            "https://my-resource.openai.azure.com/openai/deployments/gpt-35/chat/completions?api-version=2024-08-01-preview"
        );
        assert_eq!(provider.auth_header(), ("api-key", false));
    }

    #[test]
    fn test_attribution_headers_only_for_openrouter() {
        let headers =
            Provider::OpenRouter.attribution_headers(Some("https://example.com"), Some("Returns"));
        assert_eq!(
            headers,
            vec![("HTTP-Referer", "https://example.com"), ("X-Title", "Returns")]
        );
        assert!(
            Provider::OpenAI
                .attribution_headers(Some("https://example.com"), Some("Returns"))
                .is_empty()
        );
        assert!(Provider::OpenRouter.attribution_headers(Some(""), None).is_empty());
    }
}
