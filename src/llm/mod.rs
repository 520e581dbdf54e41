pub mod openai;

pub use openai::{
    ChatApi, ChatMessage, ChatOptions, ContentPart, ImageUrl, LlmError, MessageContent,
    OpenAiClient,
};
