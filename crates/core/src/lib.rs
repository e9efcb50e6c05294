pub mod generic_types;
pub mod prompt;
pub mod reply;
pub mod retrieval;
pub mod turn;
pub mod vocabulary;
