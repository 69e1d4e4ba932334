//! Fans one source image out to every catalog style and keeps the task store
//! current as results arrive.
//!
//! Each generation call runs as its own tokio task and writes back through a
//! [`DispatchTicket`]. The store rejects tickets from a replaced session and
//! tickets superseded by a later retry of the same style, so no explicit
//! cancellation of in-flight calls is needed.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::{
    error::OrchestratorError,
    gemini::{preview, GenerationClient},
    i18n::{translation, Language},
    models::SourceImage,
    store::{DispatchTicket, GenerationTask, SessionPhase, TaskStore, WriteOutcome},
    styles::StyleCatalog,
};

pub struct Orchestrator {
    catalog: StyleCatalog,
    client: Arc<dyn GenerationClient>,
    store: Arc<RwLock<TaskStore>>,
    source: RwLock<Option<Arc<SourceImage>>>,
    language: RwLock<Language>,
}

impl Orchestrator {
    pub fn new(catalog: StyleCatalog, client: Arc<dyn GenerationClient>, language: Language) -> Self {
        Self {
            catalog,
            client,
            store: Arc::new(RwLock::new(TaskStore::new())),
            source: RwLock::new(None),
            language: RwLock::new(language),
        }
    }

    pub fn catalog(&self) -> &StyleCatalog {
        &self.catalog
    }

    pub fn language(&self) -> Language {
        *self.language.read()
    }

    pub fn set_language(&self, language: Language) {
        *self.language.write() = language;
        info!("🌐 Language set to {}", language);
    }

    /// Starts a new session: one `Pending` task per style, all dispatched at
    /// once. Returns as soon as every call has been spawned.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, source: SourceImage) -> Result<Vec<GenerationTask>, OrchestratorError> {
        source.validate()?;
        let source = Arc::new(source);
        let language = self.language();

        let tickets = {
            // store before source, same order as retry
            let mut store = self.store.write();
            *self.source.write() = Some(Arc::clone(&source));
            store.reset(&self.catalog.ids())
        };

        info!(
            "🚀 New session: {} bytes of {}, dispatching {} styles ({})",
            source.data().len(), source.mime_type(), tickets.len(), language
        );
        for ticket in tickets {
            self.dispatch(ticket, Arc::clone(&source), language);
        }
        Ok(self.snapshot())
    }

    /// Regenerates one style. Returns `false`, leaving the store untouched,
    /// when there is no active source image or the style is unknown.
    pub fn retry(&self, style_id: &str) -> bool {
        let Some(style) = self.catalog.get(style_id) else {
            debug!("retry ignored: unknown style {}", style_id);
            return false;
        };
        let language = self.language();
        let (ticket, source) = {
            let mut store = self.store.write();
            let Some(source) = self.source.read().clone() else {
                debug!("retry ignored: no active source image");
                return false;
            };
            let Some(ticket) = store.set_pending(style_id) else {
                return false;
            };
            (ticket, source)
        };

        info!("🔄 Retrying '{}' (dispatch #{})", style.display_name(language), ticket.seq);
        self.dispatch(ticket, source, language);
        true
    }

    pub fn snapshot(&self) -> Vec<GenerationTask> {
        self.store.read().snapshot()
    }

    pub fn task(&self, style_id: &str) -> Option<GenerationTask> {
        self.store.read().get(style_id).cloned()
    }

    pub fn phase(&self) -> SessionPhase {
        self.store.read().phase()
    }

    /// Reads the store under a single lock, for views that need several
    /// fields to agree with each other.
    pub fn inspect<R>(&self, f: impl FnOnce(&TaskStore) -> R) -> R {
        f(&self.store.read())
    }

    fn dispatch(&self, ticket: DispatchTicket, source: Arc<SourceImage>, language: Language) {
        let Some(instruction) = self.catalog.instruction(&ticket.style_id, language).map(str::to_owned) else {
            return;
        };
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let failure_message = translation(language).error_generic;

        tokio::spawn(async move {
            let generated = client.generate(&source, &instruction).await;
            let result = generated.as_ref().map(String::clone).map_err(|_| failure_message.to_string());

            // write back before anything else can fail in this task
            let (written, settled) = {
                let mut store = store.write();
                let written = store.set_result(&ticket, result);
                (written, store.phase() == SessionPhase::Settled)
            };

            match &generated {
                Ok(image) => info!("✅ Style '{}' generated: {}", ticket.style_id, preview(image)),
                Err(e) => error!("❌ Style '{}' generation failed: {}", ticket.style_id, e),
            }
            match written {
                WriteOutcome::Applied if settled => info!("🏁 All styles settled"),
                WriteOutcome::Applied => {}
                outcome => debug!("🗑️ Discarding result for '{}' (dispatch #{}): {:?}", ticket.style_id, ticket.seq, outcome),
            }
        });
    }
}
