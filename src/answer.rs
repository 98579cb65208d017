//! Optional question-answering collaborator, kept apart from the search engine.

use serde::Serialize;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::AnswerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("no answer command configured (set [answer] command in config.toml)")]
    NotConfigured,

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("failed to generate answer")]
    Failed,
}

pub trait Answerer {
    fn answer(&self, question: &str) -> Result<Answer, AnswerError>;
}

/// Runs an external program as `<command> [args..] --question <q>` and takes
/// its trimmed stdout as the answer.
pub struct CommandAnswerer {
    command: Option<String>,
    args: Vec<String>,
}

impl CommandAnswerer {
    pub fn from_config(config: Option<&AnswerConfig>) -> Self {
        CommandAnswerer {
            command: config
                .and_then(|c| c.command.clone())
                .filter(|c| !c.trim().is_empty()),
            args: config.map(|c| c.args.clone()).unwrap_or_default(),
        }
    }
}

impl Answerer for CommandAnswerer {
    fn answer(&self, question: &str) -> Result<Answer, AnswerError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }
        let command = self.command.as_deref().ok_or(AnswerError::NotConfigured)?;

        debug!(command, "running answer command");
        let output = Command::new(command)
            .args(&self.args)
            .arg("--question")
            .arg(question)
            .output()
            .map_err(|e| {
                error!(command, error = %e, "failed to start answer command");
                AnswerError::Failed
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                command,
                code = output.status.code().unwrap_or(-1),
                stderr = %stderr.trim(),
                "answer command failed"
            );
            return Err(AnswerError::Failed);
        }

        let answer = String::from_utf8(output.stdout).map_err(|_| {
            error!(command, "answer command output is not valid UTF-8");
            AnswerError::Failed
        })?;

        Ok(Answer {
            question: question.to_string(),
            answer: answer.trim().to_string(),
        })
    }
}
