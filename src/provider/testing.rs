//! Scripted backend for tests that should not touch the network.

use super::client::{ChatBackend, NativeStream};
use super::error::Error;
use super::types::{ChatMessage, CompletionParams, NativeResponse, NativeUnit};
use crate::protocol::{ChatCompletion, Usage};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::sync::{Arc, Mutex};

/// One step of a scripted stream.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Unit(NativeUnit),
    Fail(String),
}

pub(crate) struct ScriptedBackend {
    steps: Vec<Step>,
    reply: Option<NativeResponse>,
    reject: Option<(u16, String)>,
    seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedBackend {
    pub(crate) fn streaming(units: Vec<NativeUnit>) -> Self {
        Self::scripted(units.into_iter().map(Step::Unit).collect())
    }

    pub(crate) fn scripted(steps: Vec<Step>) -> Self {
        Self {
            steps,
            reply: None,
            reject: None,
            seen: Arc::default(),
        }
    }

    pub(crate) fn replying(content: &str) -> Self {
        Self::responding(NativeResponse::Chat(ChatCompletion::assistant(
            "chatcmpl-test",
            0,
            "scripted",
            content,
            Usage::default(),
        )))
    }

    pub(crate) fn responding(reply: NativeResponse) -> Self {
        Self {
            reply: Some(reply),
            ..Self::scripted(Vec::new())
        }
    }

    pub(crate) fn rejecting(status: u16, message: &str) -> Self {
        Self {
            reject: Some((status, message.to_string())),
            ..Self::scripted(Vec::new())
        }
    }

    /// Message lists received by each call, in call order.
    pub(crate) fn seen(&self) -> Arc<Mutex<Vec<Vec<ChatMessage>>>> {
        Arc::clone(&self.seen)
    }

    fn check(&self, messages: Vec<ChatMessage>) -> Result<(), Error> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(messages);
        }
        match &self.reject {
            Some((status, message)) => Err(Error::Api {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn id(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        _params: &CompletionParams,
    ) -> Result<NativeStream, Error> {
        self.check(messages)?;
        let items: Vec<Result<NativeUnit, Error>> = self
            .steps
            .iter()
            .map(|step| match step {
                Step::Unit(unit) => Ok(unit.clone()),
                Step::Fail(message) => Err(Error::Stream(message.clone())),
            })
            .collect();
        Ok(stream::iter(items).boxed())
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _params: &CompletionParams,
    ) -> Result<NativeResponse, Error> {
        self.check(messages)?;
        self.reply
            .clone()
            .ok_or_else(|| Error::Stream("no scripted reply".into()))
    }
}
