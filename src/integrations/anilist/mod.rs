pub mod client;

pub use client::AniListClient;
