#[cfg(test)]
#[path = "app_test.rs"]
mod tests;

use std::io::Write;
use std::sync::Arc;

use eyre::Result;
use tokio::sync::mpsc;

use crate::backend::ArcBackend;
use crate::config::{self, Configuration};
use crate::models::{ConversationSettings, Event, NoticeMessage, Ticket, WireEvent, catalog};
use crate::store::{ConversationStore, Repository, Seed, StoreError};
use crate::trace::split_final_answer;
use crate::{info_notice, warn_notice};

use super::render::Renderer;
use super::services::StreamService;
use super::session::{Applied, Session};
use super::shell::{self, Command, Setting};

pub struct InitProps {
    pub store: ConversationStore,
    pub repository: Repository,
    pub backend: ArcBackend,
    pub colored: bool,
}

/// Owns the store and the session. Every change arrives as an event on one
/// queue and is handled to completion before the next one is read.
pub struct App<W: Write> {
    store: ConversationStore,
    session: Session,
    repository: Repository,
    streams: StreamService,
    renderer: Renderer,
    out: W,

    event_tx: mpsc::UnboundedSender<Event>,
    event_rx: mpsc::UnboundedReceiver<Event>,
}

impl<W: Write> App<W> {
    pub fn new(props: InitProps, out: W) -> App<W> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        App {
            store: props.store,
            session: Session::new(Configuration::instance().general.language),
            repository: props.repository,
            streams: StreamService::new(props.backend, Arc::new(event_tx.clone())),
            renderer: Renderer::new(props.colored),
            out,
            event_tx,
            event_rx,
        }
    }

    pub fn event_tx(&self) -> mpsc::UnboundedSender<Event> {
        self.event_tx.clone()
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub async fn run(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "{} {} on {}. Type /help for commands.",
            config::APP_NAME,
            config::VERSION,
            self.streams.backend().name()
        )?;
        self.show_active()?;

        while let Some(event) = self.next_event().await {
            if self.handle_event(event).await? {
                break;
            }
        }

        self.stop().await?;
        self.streams.abort();
        Ok(())
    }

    pub async fn next_event(&mut self) -> Option<Event> {
        self.event_rx.recv().await
    }

    /// Returns true when the app should quit.
    pub async fn handle_event(&mut self, event: Event) -> Result<bool> {
        match event {
            Event::Notice(notice) => self.print_notice(&notice)?,
            Event::Stream(ticket, event) => self.handle_stream(ticket, event).await?,
            Event::StreamFinished(ticket) => {
                if self.session.complete(&ticket) {
                    self.finish_render(&ticket)?;
                }
            }
            Event::StreamFailed(ticket, detail) => {
                if let Some(notice) = self.session.fail(&mut self.store, &ticket, &detail) {
                    self.persist().await?;
                    self.finish_render(&ticket)?;
                    self.print_notice(&notice)?;
                }
            }
            Event::Input(line) => match shell::parse(&line) {
                Ok(Some(command)) => return self.handle_command(command).await,
                Ok(None) => {}
                Err(err) => self.print_notice(&warn_notice!(err.to_string()))?,
            },
            Event::Interrupt => {
                if !self.session.is_streaming() {
                    return Ok(true);
                }
                self.stop().await?;
            }
            Event::Quit => return Ok(true),
        }
        Ok(false)
    }

    async fn handle_stream(&mut self, ticket: Ticket, event: WireEvent) -> Result<()> {
        match self.session.apply(&mut self.store, &ticket, event) {
            Applied::Stale => {}
            Applied::Updated => {
                self.persist().await?;
                if self.renderer.is_rendering(&ticket.message_id) {
                    if let Some(content) = message_content(&self.store, &ticket) {
                        self.renderer.update(&mut self.out, content)?;
                    }
                }
            }
            Applied::Failed(notice) => {
                self.persist().await?;
                self.finish_render(&ticket)?;
                self.print_notice(&notice)?;
            }
        }
        Ok(())
    }

    async fn handle_command(&mut self, command: Command) -> Result<bool> {
        let active_id = self.store.active_id().to_string();
        let ret = match command {
            Command::Send(text) => return self.send(&text).await.map(|_| false),
            Command::New => {
                self.store.create(Seed::default());
                Ok(Some(Changed::Selection))
            }
            Command::List => {
                self.list()?;
                Ok(None)
            }
            Command::Switch(target) => match self.resolve(&target) {
                Some(id) => self.store.select(&id).map(|_| Some(Changed::Selection)),
                None => Err(StoreError::NotFound(target)),
            },
            Command::Rename(title) => self
                .store
                .rename(&active_id, &title)
                .map(|_| Some(Changed::Notice(info_notice!(format!(
                    "Renamed to {}",
                    self.store.active().title()
                ))))),
            Command::Pin => self.store.toggle_pin(&active_id).map(|pinned| {
                Some(Changed::Notice(info_notice!(if pinned {
                    "Pinned"
                } else {
                    "Unpinned"
                })))
            }),
            Command::Archive => self.store.toggle_archive(&active_id).map(|archived| {
                if archived {
                    Some(Changed::Selection)
                } else {
                    Some(Changed::Notice(info_notice!("Restored from archive")))
                }
            }),
            Command::Duplicate => self
                .store
                .duplicate(&active_id)
                .map(|_| Some(Changed::Selection)),
            Command::Delete => self.store.delete(&active_id).map(|_| Some(Changed::Selection)),
            Command::Search(query) => {
                self.search(&query)?;
                Ok(None)
            }
            Command::Model(None) => {
                writeln!(
                    self.out,
                    "model: {} (default for new conversations: {})",
                    self.store.active().model_id(),
                    self.store.default_model()
                )?;
                Ok(None)
            }
            Command::Model(Some(model_id)) => self
                .store
                .set_model(&active_id, &model_id)
                .and_then(|_| self.store.set_default_model(&model_id))
                .map(|_| Some(Changed::Notice(info_notice!(format!("Using model {}", model_id))))),
            Command::Models => {
                self.refresh_models().await?;
                self.list_models()?;
                Ok(None)
            }
            Command::Mode(None) => {
                self.list_modes()?;
                Ok(None)
            }
            Command::Mode(Some(mode_id)) => self
                .store
                .set_mode(&active_id, &mode_id)
                .map(|_| Some(Changed::Settings)),
            Command::Set(setting, enabled) => self
                .store
                .update_settings(&active_id, |s| match setting {
                    Setting::DeepThinking => s.deep_thinking = enabled,
                    Setting::WebSearch => s.allow_web_search = enabled,
                    Setting::ImageTool => s.allow_image_tool = enabled,
                })
                .map(|_| Some(Changed::Settings)),
            Command::Split => {
                self.split()?;
                Ok(None)
            }
            Command::Stop => {
                if self.session.is_streaming() {
                    self.stop().await?;
                } else {
                    self.print_notice(&info_notice!("Nothing to stop"))?;
                }
                Ok(None)
            }
            Command::Help => {
                writeln!(self.out, "{}", shell::HELP)?;
                Ok(None)
            }
            Command::Quit => return Ok(true),
        };

        match ret {
            Ok(None) => {}
            Ok(Some(changed)) => {
                self.persist().await?;
                match changed {
                    Changed::Selection => self.show_active()?,
                    Changed::Settings => self.print_settings()?,
                    Changed::Notice(notice) => self.print_notice(&notice)?,
                }
            }
            Err(err) => self.print_notice(&warn_notice!(err.to_string()))?,
        }
        Ok(false)
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        let Some(exchange) = self.session.submit(&mut self.store, text) else {
            if self.session.is_streaming() {
                self.print_notice(&warn_notice!(
                    "A response is still streaming, /stop it first"
                ))?;
            }
            return Ok(());
        };
        self.persist().await?;

        writeln!(self.out, "{}", self.renderer.assistant_prompt())?;
        self.renderer.begin(&exchange.ticket.message_id);
        self.streams.spawn(exchange);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(ticket) = self.session.ticket().cloned() else {
            return Ok(());
        };
        if let Some(notice) = self.session.stop(&mut self.store) {
            self.streams.abort();
            self.persist().await?;
            self.finish_render(&ticket)?;
            self.print_notice(&notice)?;
        }
        Ok(())
    }

    /// Save the whole store. Failures are reported and never end the session.
    async fn persist(&mut self) -> Result<()> {
        if let Err(err) = self.repository.save(&self.store.snapshot()).await {
            log::error!("Failed to save conversations: {:#}", err);
            self.print_notice(&warn_notice!("Failed to save conversations"))?;
        }
        Ok(())
    }

    fn finish_render(&mut self, ticket: &Ticket) -> Result<()> {
        if !self.renderer.is_rendering(&ticket.message_id) {
            return Ok(());
        }
        let content = message_content(&self.store, ticket).unwrap_or_default();
        self.renderer.finish(&mut self.out, content)?;
        Ok(())
    }

    /// Print the active conversation. A reply still streaming into it picks
    /// up live rendering where the history ends.
    fn show_active(&mut self) -> Result<()> {
        let streaming_id = self
            .session
            .ticket()
            .filter(|t| t.conversation_id == self.store.active_id())
            .map(|t| t.message_id.clone());
        self.renderer.reset();

        let convo = self.store.active();
        writeln!(
            self.out,
            "== {} ({}, {}) ==",
            convo.title(),
            convo.mode_id(),
            convo.model_id()
        )?;
        for message in convo.messages() {
            if streaming_id.as_deref() == Some(message.id()) {
                writeln!(self.out, "{}", self.renderer.assistant_prompt())?;
                self.renderer.begin(message.id());
                self.renderer.update(&mut self.out, message.content())?;
            } else {
                writeln!(self.out, "{}", self.renderer.render_message(message))?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    fn list(&mut self) -> Result<()> {
        let active_id = self.store.active_id();
        for (idx, convo) in self.store.sorted().into_iter().enumerate() {
            writeln!(
                self.out,
                "{}",
                self.renderer
                    .render_entry(idx + 1, convo, convo.id() == active_id)
            )?;
        }
        Ok(())
    }

    /// Matches keep their `/list` numbers so `/switch <n>` works on them.
    fn search(&mut self, query: &str) -> Result<()> {
        let active_id = self.store.active_id();
        let sorted = self.store.sorted();
        let hits = self.store.search(query);
        if hits.is_empty() {
            writeln!(self.out, "no conversation matches {:?}", query)?;
            return Ok(());
        }
        for hit in hits {
            let idx = sorted.iter().position(|c| c.id() == hit.id()).unwrap_or(0);
            writeln!(
                self.out,
                "{}",
                self.renderer
                    .render_entry(idx + 1, hit, hit.id() == active_id)
            )?;
        }
        Ok(())
    }

    /// A 1-based `/list` number or a unique id prefix.
    fn resolve(&self, target: &str) -> Option<String> {
        if let Ok(n) = target.parse::<usize>() {
            return self
                .store
                .sorted()
                .get(n.checked_sub(1)?)
                .map(|c| c.id().to_string());
        }
        let mut matches = self
            .store
            .conversations()
            .iter()
            .filter(|c| c.id().starts_with(target));
        match (matches.next(), matches.next()) {
            (Some(convo), None) => Some(convo.id().to_string()),
            _ => None,
        }
    }

    /// Adopt the server's current model list. Conversations on a model it no
    /// longer serves move to the default model.
    async fn refresh_models(&mut self) -> Result<()> {
        let backend = Arc::clone(self.streams.backend());
        match backend.list_models().await {
            Ok(models) if !models.is_empty() => {
                let reassigned = self.store.reconcile_models(models);
                if reassigned > 0 {
                    log::info!("Moved {} conversations off unserved models", reassigned);
                    self.persist().await?;
                    self.print_notice(&info_notice!(format!(
                        "{} conversations moved to {}",
                        reassigned,
                        self.store.default_model()
                    )))?;
                }
            }
            Ok(_) => log::warn!("{} returned no models", backend.name()),
            Err(err) => {
                log::warn!("Failed to list models from {}: {:#}", backend.name(), err);
                self.print_notice(&warn_notice!("Could not refresh the model list"))?;
            }
        }
        Ok(())
    }

    fn list_models(&mut self) -> Result<()> {
        let current = self.store.active().model_id();
        for model in self.store.catalog().models() {
            let marker = if model.id() == current { "*" } else { " " };
            let mut line = format!("{} {}", marker, model.id());
            if model.name() != model.id() {
                line.push_str(&format!(" ({})", model.name()));
            }
            if !model.tags().is_empty() {
                line.push_str(&format!(" [{}]", model.tags().join(", ")));
            }
            if let Some(description) = model.description() {
                line.push_str(&format!(" - {}", description));
            }
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }

    fn list_modes(&mut self) -> Result<()> {
        let current = self.store.active().mode_id();
        for mode in catalog::MODES {
            let marker = if mode.id == current { "*" } else { " " };
            writeln!(
                self.out,
                "{} {} ({}) - {}",
                marker, mode.id, mode.name, mode.description
            )?;
        }
        Ok(())
    }

    fn print_settings(&mut self) -> Result<()> {
        let convo = self.store.active();
        writeln!(
            self.out,
            "mode: {}, {}",
            convo.mode_id(),
            describe_settings(convo.settings())
        )?;
        Ok(())
    }

    fn split(&mut self) -> Result<()> {
        let reply = self
            .store
            .active()
            .messages()
            .iter()
            .rev()
            .find(|m| m.is_assistant() && !m.content().is_empty());
        match reply {
            Some(reply) => {
                let split = split_final_answer(reply.content());
                writeln!(self.out, "{}", self.renderer.render_split(&split))?;
            }
            None => self.print_notice(&info_notice!("No reply to split yet"))?,
        }
        Ok(())
    }

    fn print_notice(&mut self, notice: &NoticeMessage) -> Result<()> {
        writeln!(self.out, "{}", self.renderer.render_notice(notice))?;
        self.out.flush()?;
        Ok(())
    }
}

enum Changed {
    Selection,
    Settings,
    Notice(NoticeMessage),
}

fn message_content<'a>(store: &'a ConversationStore, ticket: &Ticket) -> Option<&'a str> {
    store
        .get(&ticket.conversation_id)?
        .message(&ticket.message_id)
        .map(|m| m.content())
}

fn describe_settings(settings: &ConversationSettings) -> String {
    let flag = |on: bool| if on { "on" } else { "off" };
    format!(
        "deep thinking: {}, web search: {}, image tool: {}",
        flag(settings.deep_thinking),
        flag(settings.allow_web_search),
        flag(settings.allow_image_tool)
    )
}
