pub mod choice;
pub mod scene;
