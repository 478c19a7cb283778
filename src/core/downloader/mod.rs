pub mod client;

pub use client::{DownloadCallback, DownloadProgress, Downloader};
