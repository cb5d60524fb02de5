//! Prompt documents: the platform-side representation of an exported row.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::row::Row;

/// MIME type the platform uses for plain-text prompt content.
pub const TEXT_MIMETYPE: &str = "application/text";

/// Suffix the platform appends to a prompt document's name when it is stored.
pub const PROMPT_FILE_SUFFIX: &str = ".json";

/// Key identifying one prompt inside a document (`"1"`, `"2"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptKey(String);

impl PromptKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sort key: numeric keys in numeric order, anything else after them.
    fn ordinal(&self) -> (u64, &str) {
        (self.0.parse::<u64>().unwrap_or(u64::MAX), self.0.as_str())
    }
}

impl fmt::Display for PromptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One typed content element of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptContent {
    pub mimetype: String,
    /// `None` when the source cell was NULL; serialized as JSON `null`.
    #[serde(default)]
    pub value: Option<String>,
}

impl PromptContent {
    pub fn text(value: Option<String>) -> Self {
        Self {
            mimetype: TEXT_MIMETYPE.to_string(),
            value,
        }
    }
}

/// A message to append to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<PromptContent>,
}

impl Message {
    pub fn user(content: Vec<PromptContent>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }
}

/// A prompt stored in a document, keyed at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub key: PromptKey,
    pub role: Role,
    pub content: Vec<PromptContent>,
}

/// On-disk layout of a prompt document. Only the prompts are read back.
#[derive(Debug, Deserialize)]
struct PromptFile {
    #[serde(default)]
    prompts: BTreeMap<String, Vec<PromptContent>>,
}

/// A named platform document holding prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptDocument {
    name: String,
    prompts: Vec<Prompt>,
    row_id: Option<i64>,
}

impl PromptDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompts: Vec::new(),
            row_id: None,
        }
    }

    /// Document for one table row: named by the row ID, holding a single
    /// user message with the row's prompt text.
    pub fn for_row(row: &Row) -> Self {
        let mut doc = Self::new(row.id.to_string());
        doc.row_id = Some(row.id);
        doc.add(Message::user(vec![PromptContent::text(row.prompt.clone())]));
        doc
    }

    /// Append a message and return the key assigned to it.
    pub fn add(&mut self, message: Message) -> &PromptKey {
        let key = PromptKey::new((self.prompts.len() + 1).to_string());
        self.prompts.push(Prompt {
            key,
            role: message.role,
            content: message.content,
        });
        &self.prompts[self.prompts.len() - 1].key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the stored file (`<name>.json`).
    pub fn filename(&self) -> String {
        format!("{}{}", self.name, PROMPT_FILE_SUFFIX)
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    pub fn first_prompt_key(&self) -> Option<&PromptKey> {
        self.prompts.first().map(|p| &p.key)
    }

    /// Row this document was exported from, if recorded at export time.
    pub fn row_id(&self) -> Option<i64> {
        self.row_id
    }

    /// Serialize to the platform's prompt file format.
    pub fn to_json(&self) -> serde_json::Value {
        let prompts: serde_json::Map<String, serde_json::Value> = self
            .prompts
            .iter()
            .map(|p| (p.key.to_string(), json!(p.content)))
            .collect();
        json!({
            "shebang": "dataloop",
            "metadata": { "dltype": "prompt" },
            "prompts": prompts,
        })
    }

    /// Parse a prompt file downloaded from the platform.
    pub fn from_json(name: impl Into<String>, bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let file: PromptFile = serde_json::from_slice(bytes)?;
        let mut prompts: Vec<Prompt> = file
            .prompts
            .into_iter()
            .map(|(key, content)| Prompt {
                key: PromptKey::new(key),
                role: Role::User,
                content,
            })
            .collect();
        prompts.sort_by(|a, b| a.key.ordinal().cmp(&b.key.ordinal()));

        Ok(Self {
            name: name.into(),
            prompts,
            row_id: None,
        })
    }

    pub fn with_row_id(mut self, row_id: i64) -> Self {
        self.row_id = Some(row_id);
        self
    }
}
