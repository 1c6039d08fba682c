pub mod catalog;
pub mod checkpoint;
pub mod fetcher;
pub mod matcher;
pub mod output;
pub mod playlist;
pub mod processor;
