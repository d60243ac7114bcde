//! Collaborators downstream of the catalog: post generation and the digest
//! notifier. Neither is needed for ingestion or trend extraction.

pub mod notify;
pub mod writer;

pub use notify::{Notifier, TelegramNotifier};
pub use writer::{publish_pending, MarkdownPostWriter, PostWriter, PublishedLedger};
