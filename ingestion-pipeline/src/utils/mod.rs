pub mod text_extraction;
