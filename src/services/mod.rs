pub mod ai_service;
pub mod config_manager;

pub use ai_service::{
    AiAnswerService, AnswerMode, ChatRequest, ChatResponse, ConversationState, DoubaoApi,
    HttpDoubaoClient,
};
pub use config_manager::ConfigManager;
