pub mod choice_parser;
pub mod error;
pub mod llm_client;
pub mod prompt_builder;
pub mod story_engine;

#[cfg(test)]
pub mod test_support;
