use crate::error::RelayError;
use crate::extractor::ArticleExtractor;
use crate::fetcher::NewsSource;
use crate::format::{render_post, PostStyle};
use crate::models::{ExtractedArticle, Story, StoryId, TranslatedPost};
use crate::publisher::Publisher;
use crate::seen::SeenStore;
use crate::translator::Translator;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_EXCERPT_CHARS: usize = 1_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Filtering,
    Extracting,
    Translating,
    Formatting,
    Publishing,
    Recording,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetching",
            Stage::Filtering => "filtering",
            Stage::Extracting => "extracting",
            Stage::Translating => "translating",
            Stage::Formatting => "formatting",
            Stage::Publishing => "publishing",
            Stage::Recording => "recording",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub fetch_count: usize,
    /// Upper bound on publish attempts per run.
    pub post_quota: usize,
    pub target_language: String,
    pub translate_body: bool,
    pub excerpt_chars: usize,
    /// Budget for extraction plus translation of one candidate.
    pub candidate_timeout: Duration,
    /// False in dry-run mode.
    pub record_seen: bool,
    pub style: PostStyle,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            fetch_count: 10,
            post_quota: 1,
            target_language: "Russian".to_string(),
            translate_body: true,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            candidate_timeout: Duration::from_secs(120),
            record_seen: true,
            style: PostStyle::default(),
        }
    }
}

/// Outcome of one run, for logging and tests.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub fetched: usize,
    pub eligible: usize,
    pub publish_attempts: usize,
    pub published: Vec<StoryId>,
    pub publish_failed: Vec<StoryId>,
    pub skipped: Vec<(StoryId, String)>,
    pub translation_degraded: usize,
    pub source_unavailable: bool,
}

/// fetch → filter → extract → translate → format → publish → record.
pub struct Pipeline {
    source: Arc<dyn NewsSource>,
    extractor: Arc<dyn ArticleExtractor>,
    translator: Translator,
    publisher: Arc<dyn Publisher>,
    store: SeenStore,
    settings: RunSettings,
    stage: Stage,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn NewsSource>,
        extractor: Arc<dyn ArticleExtractor>,
        translator: Translator,
        publisher: Arc<dyn Publisher>,
        store: SeenStore,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            extractor,
            translator,
            publisher,
            store,
            settings,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn store(&self) -> &SeenStore {
        &self.store
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = %self.stage, to = %stage, "Pipeline stage");
        self.stage = stage;
    }

    #[instrument(skip(self), fields(quota = self.settings.post_quota))]
    pub async fn run_once(&mut self) -> RunReport {
        let mut report = RunReport::default();
        info!("Starting news run");

        self.enter(Stage::Fetching);
        let candidates = match self.source.fetch_candidates(self.settings.fetch_count).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "News source unavailable, skipping run");
                report.source_unavailable = true;
                self.enter(Stage::Idle);
                return report;
            }
        };
        report.fetched = candidates.len();

        self.enter(Stage::Filtering);
        let eligible: Vec<Story> = candidates
            .into_iter()
            .filter(|story| {
                let seen = self.store.contains(&story.id);
                if seen {
                    debug!(story_id = %story.id, "Already published, skipping");
                }
                !seen
            })
            .collect();
        report.eligible = eligible.len();

        if eligible.is_empty() {
            info!(fetched = report.fetched, "No new stories, nothing to publish");
            self.enter(Stage::Idle);
            return report;
        }

        for story in eligible {
            if report.publish_attempts >= self.settings.post_quota {
                break;
            }

            let message = match self.prepare(&story, &mut report).await {
                Ok(message) => message,
                Err(e) => {
                    // Left unseen so it can be retried while still in the candidate window
                    warn!(story_id = %story.id, url = %story.url, error = %e, "Skipping candidate");
                    report.skipped.push((story.id.clone(), e.to_string()));
                    continue;
                }
            };

            self.enter(Stage::Publishing);
            report.publish_attempts += 1;
            if !self.publisher.publish(&message).await {
                let e = RelayError::PublishFailed(format!("story {}", story.id));
                warn!(story_id = %story.id, url = %story.url, error = %e, "Not marking story as seen");
                report.publish_failed.push(story.id);
                continue;
            }

            self.enter(Stage::Recording);
            if self.settings.record_seen {
                if let Err(e) = self.store.add(story.id.clone()) {
                    error!(story_id = %story.id, error = %e, "Published but failed to persist seen store");
                }
            }
            info!(story_id = %story.id, title = %story.title, "Story published");
            report.published.push(story.id);
        }

        self.enter(Stage::Idle);
        info!(
            fetched = report.fetched,
            eligible = report.eligible,
            published = report.published.len(),
            failed = report.publish_failed.len(),
            skipped = report.skipped.len(),
            "News run finished"
        );
        report
    }

    /// Extract, translate and render one candidate within its time budget.
    /// Extraction past the deadline skips the candidate; translation past it
    /// keeps the original text.
    #[instrument(skip_all, fields(story_id = %story.id, url = %story.url))]
    async fn prepare(&mut self, story: &Story, report: &mut RunReport) -> Result<String, RelayError> {
        let budget = self.settings.candidate_timeout;
        let deadline = Instant::now() + budget;

        self.enter(Stage::Extracting);
        let article: ExtractedArticle = timeout_at(deadline, self.extractor.extract(story))
            .await
            .map_err(|_| RelayError::Timeout {
                stage: "extracting",
                after: budget,
            })??;

        self.enter(Stage::Translating);
        let language = self.settings.target_language.clone();
        let title = self.translator.translate_before(&story.title, &language, deadline).await;
        if title.degraded {
            report.translation_degraded += 1;
        }

        let body = if self.settings.translate_body {
            let excerpt = article.excerpt(self.settings.excerpt_chars);
            let body = self.translator.translate_before(&excerpt, &language, deadline).await;
            if body.degraded {
                report.translation_degraded += 1;
            }
            Some(body.text)
        } else {
            None
        };

        self.enter(Stage::Formatting);
        let post = TranslatedPost {
            title: title.text,
            body,
            link: story.url.clone(),
            score: story.score,
        };
        Ok(render_post(&post, &self.settings.style))
    }
}
