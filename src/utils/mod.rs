pub mod json;
pub mod paths;
pub mod time;
