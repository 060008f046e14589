pub mod apply;
pub mod common;
pub mod info;
pub mod rules;
