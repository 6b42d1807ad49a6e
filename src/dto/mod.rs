pub mod group;
pub mod health;
