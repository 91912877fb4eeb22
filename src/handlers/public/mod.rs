// handlers/public/mod.rs - Public handlers (no tenant required)

pub mod health;

pub use health::health;
