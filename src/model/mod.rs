pub mod alert;
pub mod tick;
