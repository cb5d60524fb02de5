//! Domain models shared by the exporter and writeback services.

mod annotation;
mod prompt;
mod row;

pub use annotation::Annotation;
pub use prompt::{
    Message, Prompt, PromptContent, PromptDocument, PromptKey, Role, PROMPT_FILE_SUFFIX,
    TEXT_MIMETYPE,
};
pub use row::{Row, RowError, ID_COLUMN, PROMPT_COLUMN, RESPONSE_COLUMN};
