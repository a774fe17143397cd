pub mod entries;
pub mod export;
pub mod pages;
pub mod stats;
pub mod tags;
