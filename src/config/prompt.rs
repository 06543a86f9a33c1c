use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DATE_PLACEHOLDER: &str = "{date}";

pub const DEFAULT_SYSTEM_TEMPLATE: &str =
    "You are a helpful assistant integrated into a chat application.\n\
Your goal is to provide accurate and concise answers based on the user's query.\n\
The current date is {date}.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("System prompt template is empty")]
    EmptyTemplate,
    #[error("System prompt template has no {{date}} placeholder")]
    MissingDatePlaceholder,
    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    pub system_template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_template: DEFAULT_SYSTEM_TEMPLATE.to_string(),
        }
    }
}

impl PromptConfig {
    pub fn new(system_template: impl Into<String>) -> Result<Self, PromptError> {
        let config = Self {
            system_template: system_template.into(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PromptError> {
        if self.system_template.trim().is_empty() {
            return Err(PromptError::EmptyTemplate);
        }
        if !self.system_template.contains(DATE_PLACEHOLDER) {
            return Err(PromptError::MissingDatePlaceholder);
        }
        Ok(())
    }

    pub fn render_system_prompt(&self, date: NaiveDate) -> String {
        self.system_template.replace(DATE_PLACEHOLDER, &format_date(date))
    }
}

/// Month/day/year without padding, e.g. `10/19/2026`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<PromptConfig, PromptError> {
    let file_content = fs::read_to_string(path)?;
    let config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    Ok(config)
}
