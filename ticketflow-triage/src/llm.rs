//! Hosted chat model access through `genai`.

use genai::{
    Client, ModelIden, ServiceTarget,
    adapter::AdapterKind,
    chat::{ChatMessage, ChatOptions, ChatRequest},
    resolver::{AuthData, AuthResolver, Endpoint, ServiceTargetResolver},
};
use tracing::debug;

use crate::{
    config::ModelConfig,
    error::{ClassifierError, Result, TriageError},
};

/// A configured chat model. Credentials and endpoint come from the
/// [`ModelConfig`] only; the provider's environment variables are never
/// consulted.
pub struct ChatModel {
    client: Client,
    config: ModelConfig,
    options: ChatOptions,
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("model", &self.config.model_name)
            .field("api", &self.config.api)
            .finish()
    }
}

impl ChatModel {
    /// Build a client for `config`. Fails without an explicit API key.
    pub fn new(config: ModelConfig) -> Result<Self> {
        let api_key = config
            .api
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                TriageError::configuration("model.api.api_key is required to use the hosted model")
            })?;

        let mut options = ChatOptions::default().with_temperature(config.parameters.temperature);
        if let Some(max_tokens) = config.parameters.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }

        Ok(Self {
            client: build_client(api_key, config.api.base_url.clone()),
            config,
            options,
        })
    }

    /// Configured model name.
    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    /// Send one system + user exchange and return the trimmed answer.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> std::result::Result<String, ClassifierError> {
        let request = ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)]);

        debug!(model = %self.config.model_name, "sending chat request");
        let response = self
            .client
            .exec_chat(&self.config.model_name, request, Some(&self.options))
            .await?;

        match response.content_text_as_str().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(ClassifierError::EmptyResponse),
        }
    }
}

fn build_client(api_key: String, base_url: Option<String>) -> Client {
    let auth_resolver = AuthResolver::from_resolver_fn(
        move |_model: ModelIden| -> std::result::Result<Option<AuthData>, genai::resolver::Error> {
            Ok(Some(AuthData::from_single(api_key.clone())))
        },
    );
    let mut builder = Client::builder().with_auth_resolver(auth_resolver);

    // Custom endpoints are assumed to speak the OpenAI chat protocol.
    if let Some(base_url) = base_url {
        let target_resolver = ServiceTargetResolver::from_resolver_fn(
            move |target: ServiceTarget| -> std::result::Result<ServiceTarget, genai::resolver::Error> {
                let ServiceTarget { model, auth, .. } = target;
                Ok(ServiceTarget {
                    endpoint: Endpoint::from_owned(base_url.clone()),
                    auth,
                    model: ModelIden::new(AdapterKind::OpenAI, model.model_name),
                })
            },
        );
        builder = builder.with_service_target_resolver(target_resolver);
    }

    builder.build()
}
