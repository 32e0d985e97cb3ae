pub mod admin;
pub mod blobs;
pub mod health;
pub mod turn;
