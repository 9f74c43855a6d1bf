//! Posts top technical news to a Telegram channel on a daily schedule:
//! fetch candidates, drop already-published ones, extract the article,
//! translate, render and publish, then record the story as seen.

pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod format;
pub mod models;
pub mod pipeline;
pub mod publisher;
pub mod scheduler;
pub mod seen;
pub mod translator;

pub use config::{Config, SourceKind};
pub use error::{ConfigError, RelayError, StoreError};
pub use models::{ExtractedArticle, Story, StoryId, TranslatedPost};
pub use pipeline::{Pipeline, RunReport, RunSettings, Stage};
pub use scheduler::{Relay, Schedule, Scheduler, Trigger};
pub use seen::SeenStore;
