pub mod shadow;
pub mod solar;
