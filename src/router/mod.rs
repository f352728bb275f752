//! Language model router: one contract over multiple completion backends.
//!
//! Backends are selected at startup from a `provider:model` spec string, one
//! enum variant per provider:
//! - `ollama:<model>` — local Ollama server (default port 11434)
//! - `openai:<model>` — OpenAI chat completions (needs `OPENAI_API_KEY`)
//! - `anthropic:<model>` — Anthropic messages API (needs `ANTHROPIC_API_KEY`)
//! - `echo:<anything>` — returns the prompt unchanged; diagnostic/test backend
//!
//! A spec without a provider prefix falls back to `echo`.

use serde_json::json;

use crate::error::{RouterError, RouterResult};

/// Capability interface for text generation.
///
/// The exploration loop and the contradiction detector both speak to models
/// through this seam, so tests can substitute deterministic implementations.
pub trait Generate: Send + Sync {
    /// Generate a completion for `prompt`, optionally with a system prompt.
    fn generate(&self, prompt: &str, system: Option<&str>) -> RouterResult<String>;
}

/// Parsed `provider:model` specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub provider: String,
    pub model: String,
}

impl ModelSpec {
    /// Parse a spec string. `"llama3"` (no provider) is treated as `echo:llama3`.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((provider, model)) => Self {
                provider: provider.trim().to_ascii_lowercase(),
                model: model.trim().to_string(),
            },
            None => Self {
                provider: "echo".into(),
                model: spec.trim().to_string(),
            },
        }
    }
}

/// One variant per backend; selected once at startup, never inspected at runtime.
#[derive(Debug, Clone)]
enum Backend {
    Ollama { base_url: String, model: String },
    OpenAi { model: String },
    Anthropic { model: String },
    Echo,
}

/// Routes completion requests to the configured backend.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    backend: Backend,
    timeout_secs: u64,
}

/// Default Ollama endpoint.
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

impl ModelRouter {
    /// Build a router from a `provider:model` spec.
    pub fn from_spec(spec: &str) -> RouterResult<Self> {
        let parsed = ModelSpec::parse(spec);
        let backend = match parsed.provider.as_str() {
            "ollama" => Backend::Ollama {
                base_url: OLLAMA_BASE_URL.into(),
                model: parsed.model,
            },
            "openai" => Backend::OpenAi {
                model: parsed.model,
            },
            "anthropic" => Backend::Anthropic {
                model: parsed.model,
            },
            "echo" => Backend::Echo,
            _ => {
                return Err(RouterError::UnknownProvider {
                    spec: spec.to_string(),
                });
            }
        };
        Ok(Self {
            backend,
            timeout_secs: 120,
        })
    }

    /// Override the request timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Human-readable backend description for logs and `curio info`.
    pub fn describe(&self) -> String {
        match &self.backend {
            Backend::Ollama { model, .. } => format!("ollama:{model}"),
            Backend::OpenAi { model } => format!("openai:{model}"),
            Backend::Anthropic { model } => format!("anthropic:{model}"),
            Backend::Echo => "echo".into(),
        }
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()
    }

    fn call_ollama(
        &self,
        base_url: &str,
        model: &str,
        prompt: &str,
        system: Option<&str>,
    ) -> RouterResult<String> {
        let url = format!("{base_url}/api/generate");
        let mut body = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys.to_string());
        }

        let json = post_json(&self.agent(), &url, &[], &body)?;
        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| RouterError::ParseError {
                message: "missing 'response' field".into(),
            })
    }

    fn call_openai(&self, model: &str, prompt: &str, system: Option<&str>) -> RouterResult<String> {
        let api_key = api_key("openai", "OPENAI_API_KEY")?;
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(json!({ "role": "system", "content": sys }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));
        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": 0.7,
        });

        let headers = [("Authorization".to_string(), format!("Bearer {api_key}"))];
        let json = post_json(
            &self.agent(),
            "https://api.openai.com/v1/chat/completions",
            &headers,
            &body,
        )?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| RouterError::ParseError {
                message: "missing choices[0].message.content".into(),
            })
    }

    fn call_anthropic(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
    ) -> RouterResult<String> {
        let api_key = api_key("anthropic", "ANTHROPIC_API_KEY")?;
        let mut body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": 800,
        });
        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys.to_string());
        }

        let headers = [
            ("x-api-key".to_string(), api_key),
            ("anthropic-version".to_string(), "2023-06-01".to_string()),
        ];
        let json = post_json(
            &self.agent(),
            "https://api.anthropic.com/v1/messages",
            &headers,
            &body,
        )?;
        json["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| RouterError::ParseError {
                message: "missing content[0].text".into(),
            })
    }
}

impl Generate for ModelRouter {
    fn generate(&self, prompt: &str, system: Option<&str>) -> RouterResult<String> {
        match &self.backend {
            Backend::Ollama { base_url, model } => {
                self.call_ollama(base_url, model, prompt, system)
            }
            Backend::OpenAi { model } => self.call_openai(model, prompt, system),
            Backend::Anthropic { model } => self.call_anthropic(model, prompt, system),
            Backend::Echo => Ok(prompt.to_string()),
        }
    }
}

/// Read a backend API key from the environment.
fn api_key(provider: &str, env_var: &str) -> RouterResult<String> {
    std::env::var(env_var).map_err(|_| RouterError::MissingApiKey {
        provider: provider.to_string(),
        env_var: env_var.to_string(),
    })
}

/// POST a JSON body and parse the JSON reply.
fn post_json(
    agent: &ureq::Agent,
    url: &str,
    headers: &[(String, String)],
    body: &serde_json::Value,
) -> RouterResult<serde_json::Value> {
    let body_str = serde_json::to_string(body).map_err(|e| RouterError::RequestFailed {
        message: format!("JSON serialize error: {e}"),
    })?;

    let mut request = agent.post(url).set("Content-Type", "application/json");
    for (name, value) in headers {
        request = request.set(name, value);
    }

    let resp = request
        .send_string(&body_str)
        .map_err(|e: ureq::Error| RouterError::RequestFailed {
            message: e.to_string(),
        })?;

    let resp_str = resp.into_string().map_err(|e| RouterError::ParseError {
        message: e.to_string(),
    })?;

    serde_json::from_str(&resp_str).map_err(|e| RouterError::ParseError {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_and_model() {
        let spec = ModelSpec::parse("ollama:llama3.2");
        assert_eq!(spec.provider, "ollama");
        assert_eq!(spec.model, "llama3.2");
    }

    #[test]
    fn bare_model_falls_back_to_echo() {
        let spec = ModelSpec::parse("llama3.2");
        assert_eq!(spec.provider, "echo");
    }

    #[test]
    fn unknown_provider_rejected() {
        assert!(ModelRouter::from_spec("cohere:command").is_err());
    }

    #[test]
    fn echo_returns_prompt_unchanged() {
        let router = ModelRouter::from_spec("echo:any").unwrap();
        let out = router.generate("1. Why is water wet?", Some("sys")).unwrap();
        assert_eq!(out, "1. Why is water wet?");
    }

    #[test]
    fn missing_openai_key_is_an_error() {
        // Only meaningful when the variable is absent; skip otherwise.
        if std::env::var("OPENAI_API_KEY").is_ok() {
            return;
        }
        let router = ModelRouter::from_spec("openai:gpt-4o-mini").unwrap();
        let err = router.generate("hi", None).unwrap_err();
        assert!(matches!(err, RouterError::MissingApiKey { .. }));
    }

    #[test]
    fn unreachable_ollama_fails_fast() {
        let router = ModelRouter {
            backend: Backend::Ollama {
                base_url: "http://127.0.0.1:1".into(), // unreachable port
                model: "llama3.2".into(),
            },
            timeout_secs: 1,
        };
        let err = router.generate("hi", None).unwrap_err();
        assert!(matches!(err, RouterError::RequestFailed { .. }));
    }
}
