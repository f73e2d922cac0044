//! Collaborator adapter over a text-completion backend.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::{debug, warn};

use ndc_calc_core::assist::{
    CandidateSelection, CandidateSummary, MatchQuery, PrescriptionAttributes, SigExtraction,
    TextAssistant,
};

use crate::extraction::{
    parse_prescription_response, parse_selection_response, parse_sig_response, ExtractionError,
    ExtractionResult,
};
use crate::prompts::{
    make_prescription_prompt, make_selection_prompt, make_sig_prompt, PRESCRIPTION_SYSTEM_PROMPT,
    SELECTION_SYSTEM_PROMPT, SIG_SYSTEM_PROMPT,
};

/// A chat-style completion service.
pub trait CompletionBackend: Send + Sync {
    /// Complete a single system/user exchange and return the raw text.
    fn complete(&self, system: &str, user: &str) -> ExtractionResult<String>;

    /// Model identifier reported with selections.
    fn model_name(&self) -> Option<String> {
        None
    }
}

/// [`TextAssistant`] backed by a language model.
///
/// Backend failures and unusable payloads are logged and reported as "no
/// assistance", so the core falls back to its deterministic rules.
pub struct LlmAssistant<B> {
    backend: B,
    sig_examples: bool,
}

impl<B: CompletionBackend> LlmAssistant<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            sig_examples: true,
        }
    }

    /// Include worked examples in SIG prompts (default on).
    pub fn with_sig_examples(mut self, enabled: bool) -> Self {
        self.sig_examples = enabled;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn ask<T>(
        &self,
        task: &'static str,
        system: &str,
        user: &str,
        parse: impl FnOnce(&str) -> ExtractionResult<T>,
    ) -> Option<T> {
        let outcome = self
            .backend
            .complete(system, user)
            .and_then(|response| parse(&response));
        match outcome {
            Ok(value) => {
                debug!(task, "collaborator response parsed");
                Some(value)
            }
            Err(e) => {
                warn!(task, error = %e, "collaborator request failed");
                None
            }
        }
    }
}

impl<B: CompletionBackend> TextAssistant for LlmAssistant<B> {
    fn extract_sig(&self, sig: &str) -> Option<SigExtraction> {
        let prompt = make_sig_prompt(sig, self.sig_examples);
        self.ask("sig", SIG_SYSTEM_PROMPT, &prompt, parse_sig_response)
    }

    fn extract_prescription(&self, query: &MatchQuery) -> Option<PrescriptionAttributes> {
        let prompt = make_prescription_prompt(query);
        self.ask(
            "prescription",
            PRESCRIPTION_SYSTEM_PROMPT,
            &prompt,
            parse_prescription_response,
        )
    }

    fn select_candidate(
        &self,
        attributes: &PrescriptionAttributes,
        candidates: &[CandidateSummary],
    ) -> Option<CandidateSelection> {
        if candidates.is_empty() {
            return None;
        }
        let prompt = match make_selection_prompt(attributes, candidates) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "could not build selection prompt");
                return None;
            }
        };
        let mut selection = self.ask(
            "selection",
            SELECTION_SYSTEM_PROMPT,
            &prompt,
            parse_selection_response,
        )?;
        selection.model = self.backend.model_name();
        Some(selection)
    }
}

/// A recorded backend exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub system: String,
    pub user: String,
}

/// Backend that replays queued responses in order.
///
/// An exhausted queue behaves like an unreachable service.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    model: Option<String>,
    responses: Mutex<VecDeque<Result<String, String>>>,
    exchanges: Mutex<Vec<Exchange>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Queue a successful completion.
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a backend failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    /// Exchanges seen so far.
    pub fn exchanges(&self) -> Vec<Exchange> {
        self.exchanges
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn push(&self, response: Result<String, String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }
}

impl CompletionBackend for ScriptedBackend {
    fn complete(&self, system: &str, user: &str) -> ExtractionResult<String> {
        if let Ok(mut exchanges) = self.exchanges.lock() {
            exchanges.push(Exchange {
                system: system.to_string(),
                user: user.to_string(),
            });
        }
        let next = self
            .responses
            .lock()
            .map_err(|e| ExtractionError::Backend(e.to_string()))?
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ExtractionError::Backend(message)),
            None => Err(ExtractionError::Backend("no scripted response left".into())),
        }
    }

    fn model_name(&self) -> Option<String> {
        self.model.clone()
    }
}
