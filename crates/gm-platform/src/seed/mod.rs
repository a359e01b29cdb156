//! Startup data seeding.

pub mod seeder;

pub use seeder::{DataSeeder, SeedReport};
