// src/generate/mock.rs
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::error::{GenerationError, Result};
use super::{GenerationRequest, GenerationService};
use crate::contract::render::edit_payload;

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(GenerationError),
    /// Sleep, then reply. For timeout and cancellation tests.
    Delayed(Duration, String),
}

/// Deterministic generator: plays back a script in order and records every
/// request it receives. When the script runs dry it echoes the user content
/// back inside an html fence (minus the edit header).
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Step::Reply(r.into())))
    }

    /// Empty script: every call echoes.
    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    /// Snapshot of requests seen so far, in call order.
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn next_step(&self) -> Option<Step> {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
    }
}

fn echo(user: &str) -> String {
    let header = edit_payload("");
    let body = user.strip_prefix(header.as_str()).unwrap_or(user);
    format!("```html\n{body}\n```")
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate(&self, req: &GenerationRequest) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(req.clone());

        match self.next_step() {
            Some(Step::Reply(s)) => Ok(s),
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Delayed(d, s)) => {
                tokio::time::sleep(d).await;
                Ok(s)
            }
            None => Ok(echo(&req.user)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(user: &str) -> GenerationRequest {
        GenerationRequest {
            system: "sys".into(),
            user: user.into(),
            temperature: 0.9,
            model: "m".into(),
        }
    }

    #[tokio::test]
    async fn plays_script_then_echoes() {
        let g = ScriptedGenerator::new(vec![
            Step::Reply("one".into()),
            Step::Fail(GenerationError::EmptyResponse),
        ]);
        assert_eq!(g.generate(&req("a")).await.unwrap(), "one");
        assert_eq!(g.generate(&req("b")).await, Err(GenerationError::EmptyResponse));
        assert_eq!(
            g.generate(&req("## DRAFT TO EDIT\n\n<p>d</p>")).await.unwrap(),
            "```html\n<p>d</p>\n```"
        );
        let users: Vec<_> = g.calls().into_iter().map(|r| r.user).collect();
        assert_eq!(users.len(), 3);
        assert_eq!(users[0], "a");
    }
}
