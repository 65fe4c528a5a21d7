//! Command handlers for the osteocache CLI.
//!
//! `App` wires the configured progress store and offline cache together and
//! exposes one method per command.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use osteocache_core::progress::RestoreOutcome;
use osteocache_core::{
    CacheStorage, Category, Config, ContentLibrary, FileStore, HttpTransport, InterceptOutcome,
    ItemId, OfflineCache, ProgressStore, QuizAttempt, Request,
};

pub struct App {
    progress: ProgressStore<FileStore>,
    cache: OfflineCache,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let store = FileStore::new(config.progress_dir()?).context("Failed to open progress storage")?;
        let mut progress = ProgressStore::new(store);
        if progress.restore() == RestoreOutcome::Corrupt {
            warn!("Saved progress could not be read; starting from zero");
        }

        let transport = HttpTransport::new(&config.origin)
            .with_context(|| format!("Invalid origin: {}", config.origin))?;
        let storage = CacheStorage::new(config.caches_dir()?).context("Failed to open cache storage")?;
        let cache = OfflineCache::new(Arc::new(transport), storage, config.cache_settings());

        Ok(Self { progress, cache })
    }

    /// Print completed counts per category.
    pub fn stats(&self) {
        let stats = self.progress.stats();
        for category in Category::ALL {
            println!("{:<16} {}", category.display_name(), stats.get(category));
        }
        println!("{:<16} {}", "Total", stats.total());
    }

    pub fn toggle(&mut self, category: Category, id: ItemId) -> Result<()> {
        let complete = self.progress.toggle_complete(category, id)?;
        println!(
            "{} #{}: {}",
            category.display_name(),
            id,
            if complete { "completed" } else { "not completed" }
        );
        Ok(())
    }

    pub fn mark(&mut self, category: Category, id: ItemId) -> Result<()> {
        self.progress.mark_complete(category, id)?;
        println!("{} #{}: completed", category.display_name(), id);
        Ok(())
    }

    /// Install the current cache version and take over from older ones.
    pub async fn update(&self) -> Result<()> {
        let seeded = self.cache.install().await.context("Cache install failed")?;
        let purged = self.cache.activate().await?;
        println!(
            "Installed {} ({} resources), removed {} old cache(s)",
            self.cache.settings().version,
            seeded,
            purged.len()
        );
        Ok(())
    }

    /// Fetch a resource through the cache and write its body to stdout.
    pub async fn fetch(&self, url: &str) -> Result<()> {
        let outcome = self.cache.intercept(Request::for_url(url)).await;
        let source = outcome.label();
        if let InterceptOutcome::CacheHit(ref cached) | InterceptOutcome::ShellFallback(ref cached) = outcome {
            eprintln!("Offline: served from cache ({})", cached.age_display());
        }
        let response = outcome
            .into_result()
            .with_context(|| format!("Failed to load {}", url))?;
        info!(url = url, status = response.status, source = source, "Fetched");
        print!("{}", response.text());
        self.cache.settle().await;
        Ok(())
    }

    /// List the items of a category with their completion state.
    pub async fn list(&self, category: Category) -> Result<()> {
        let library = self.load_content().await?;
        for item in library.items(category) {
            let mark = if self.progress.is_complete(category, item.id) { "x" } else { " " };
            println!("[{}] {:>4}  {}", mark, item.id, item.title().unwrap_or("(untitled)"));
        }
        Ok(())
    }

    pub async fn quiz(&mut self, id: ItemId, answer: usize) -> Result<()> {
        let library = self.load_content().await?;
        let quiz = library
            .quiz(id)?
            .ok_or_else(|| anyhow::anyhow!("No quiz with id {}", id))?;

        println!("{}", quiz.question);
        for (index, option) in quiz.options.iter().enumerate() {
            println!("  {}. {}", index, option);
        }

        let mut attempt = QuizAttempt::new(quiz);
        attempt.select(answer)?;
        if let Some(result) = attempt.check(&mut self.progress)? {
            if result.is_correct {
                println!("Correct!");
            } else {
                println!("Incorrect. The answer is {}.", result.correct);
            }
            if !result.explanation.is_empty() {
                println!("{}", result.explanation);
            }
        }
        Ok(())
    }

    /// Show every bucket and what the one being served holds.
    pub async fn buckets(&self) -> Result<()> {
        let storage = self.cache.storage();
        let current = &self.cache.serving_tag().await;
        for tag in storage.keys().await? {
            let bucket = storage.bucket(&tag)?;
            let urls = bucket.urls().await?;
            let marker = if &tag == current { "*" } else { " " };
            println!("{} {} ({} entries)", marker, tag, urls.len());
            if &tag == current {
                for url in urls {
                    println!("    {}", url);
                }
            }
        }
        Ok(())
    }

    async fn load_content(&self) -> Result<ContentLibrary> {
        let library = ContentLibrary::load(&self.cache)
            .await
            .context("Failed to load study content")?;
        self.cache.settle().await;
        Ok(library)
    }
}
