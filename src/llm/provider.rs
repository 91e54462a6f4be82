//! `LlmProvider` trait and the rig-core adapter.

use async_trait::async_trait;
use rig::completion::{CompletionModel, Prompt};

use crate::error::LlmError;

/// Minimal prompt-to-text completion interface.
///
/// The pipeline only ever needs one free-text reply per call; parsing of
/// structured content out of the reply happens at the call sites.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a prompt and return the model's text reply.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Name of the underlying model.
    fn model_name(&self) -> &str;
}

/// Bridges a rig agent to the `LlmProvider` trait.
pub struct RigAdapter<M: CompletionModel> {
    agent: rig::agent::Agent<M>,
    provider_name: String,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(agent: rig::agent::Agent<M>, provider_name: &str, model_name: &str) -> Self {
        Self {
            agent,
            provider_name: provider_name.to_string(),
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M: CompletionModel + 'static> LlmProvider for RigAdapter<M> {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.agent
            .prompt(prompt)
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.provider_name.clone(),
                reason: e.to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
