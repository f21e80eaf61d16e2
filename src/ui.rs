//! Declarative prompts handed to the session kit's UI.
//!
//! The plugin never renders anything. It describes what the user should
//! choose between and waits for the UI to report which option was picked.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Option id returned when the user asks for a new account.
pub const CREATE_ACCOUNT_OPTION: &str = "create-account";
/// Option id for the manual snap setup link.
pub const OPEN_SETUP_OPTION: &str = "open-setup";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptOption {
    pub id: String,
    pub label: String,
    /// External page the UI should open when this option is chosen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl PromptOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptRequest {
    pub title: String,
    pub body: String,
    pub options: Vec<PromptOption>,
}

impl PromptRequest {
    pub fn option(&self, id: &str) -> Option<&PromptOption> {
        self.options.iter().find(|option| option.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse {
    Selected(String),
    Dismissed,
}

/// User interaction capability supplied through the login context.
#[async_trait]
pub trait LoginUi: Send + Sync {
    /// Show `request` and wait until the user picks an option or closes it.
    async fn prompt(&self, request: PromptRequest) -> Result<PromptResponse>;
}
