pub mod normalizer;
pub mod nutrition;
pub mod openai;
pub mod prompt;
