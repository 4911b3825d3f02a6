pub mod board;
pub mod note;
