//! Decision service abstraction and reply parsing.
//!
//! The [`DecisionService`] trait decouples the action policy from whatever
//! produces natural-language suggestions. [`CommandDecisionService`] pipes
//! the prompt into a local command (for example an LLM CLI); tests use
//! scripted services from `test_support`.

use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::{Draft, Validator};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::policy::SuggestedParams;
use crate::io::process::run_with_timeout;

const DECISION_SCHEMA: &str = include_str!("schemas/decision.schema.json");

static DECISION_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(DECISION_SCHEMA).expect("decision schema should be valid json");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("decision schema should compile")
});

/// Outermost `{ ... }` span, tolerating prose or code fences around it.
static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("json object regex should compile"));

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub system_prompt: String,
    pub temperature: f32,
}

/// Natural-language action-suggestion provider.
pub trait DecisionService {
    /// Send `prompt` and return the raw reply text.
    fn chat(&self, prompt: &str, options: &ChatOptions) -> Result<String>;
}

/// Structured reply expected from a decision service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecisionReply {
    pub action: String,
    pub reasoning: String,
    #[serde(default)]
    pub params: Option<SuggestedParams>,
}

/// Extract, schema-check and deserialize a reply.
pub fn parse_reply(raw: &str) -> Result<DecisionReply> {
    let object = JSON_OBJECT_RE
        .find(raw)
        .ok_or_else(|| anyhow!("reply contains no json object"))?;
    let value: Value = serde_json::from_str(object.as_str()).context("parse decision reply")?;
    let messages: Vec<String> = DECISION_VALIDATOR
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("decision reply failed schema: {}", messages.join("; "));
    }
    serde_json::from_value(value).context("deserialize decision reply")
}

/// Runs a local command per decision: prompt on stdin, reply on stdout.
///
/// The system prompt and temperature travel in the `MARKETSIM_SYSTEM_PROMPT`
/// and `MARKETSIM_TEMPERATURE` environment variables.
#[derive(Debug, Clone)]
pub struct CommandDecisionService {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    capture_limit: usize,
}

impl CommandDecisionService {
    /// `command` is the program followed by its arguments.
    pub fn new(command: &[String], timeout: Duration, capture_limit: usize) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("decision command is empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
            capture_limit,
        })
    }
}

impl DecisionService for CommandDecisionService {
    #[instrument(skip_all, fields(program = %self.program))]
    fn chat(&self, prompt: &str, options: &ChatOptions) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("MARKETSIM_SYSTEM_PROMPT", &options.system_prompt)
            .env("MARKETSIM_TEMPERATURE", options.temperature.to_string());

        let output = run_with_timeout(cmd, prompt.as_bytes(), self.timeout, self.capture_limit)
            .with_context(|| format!("run decision command {}", self.program))?;
        if output.timed_out {
            bail!("decision command timed out after {:?}", self.timeout);
        }
        if !output.status.success() {
            let detail = output.stderr_tail().unwrap_or_default();
            warn!(exit_code = ?output.status.code(), %detail, "decision command failed");
            bail!(
                "decision command exited with {:?}: {detail}",
                output.status.code()
            );
        }
        let reply = output.stdout_text();
        debug!(reply_bytes = reply.len(), "decision command replied");
        Ok(reply)
    }
}
