//! The session controller.
//!
//! One actor task owns every piece of mutable session state: the active
//! mode, the cyclic selection, the guidance session with its capture and
//! listen tasks, the announcement deduplicator, the image context ring and
//! the question interrupt. Commands arrive on a single mpsc channel;
//! loop tasks talk back through the same channel, tagged with the session
//! epoch so stale messages from a torn-down loop are dropped.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::events::StateEvent;
use crate::gesture::GestureEvent;
use crate::guidance::{sanitize, AnnouncementDedup, ImageContextRing};
use crate::pairing;
use crate::prompts;
use crate::services::{
    AddressPrompt, AnswerService, CameraCapture, LocationProvider, SettingsStore,
    TranslationService, VisionService,
};
use crate::speech::{SpeechInput, SpeechOutput};

use super::{Mode, ModeSelection};

/// Collaborators handed to the controller at startup
#[derive(Clone)]
pub struct Services {
    pub speech_out: Arc<dyn SpeechOutput>,
    pub speech_in: Arc<dyn SpeechInput>,
    pub camera: Arc<dyn CameraCapture>,
    pub vision: Arc<dyn VisionService>,
    pub answers: Arc<dyn AnswerService>,
    pub translator: Arc<dyn TranslationService>,
    pub settings: Arc<dyn SettingsStore>,
    pub location: Arc<dyn LocationProvider>,
    pub address_prompt: Arc<dyn AddressPrompt>,
}

/// Commands processed by the controller actor
#[derive(Debug)]
pub enum Command {
    /// A hardware gesture from the platform layer
    Gesture(GestureEvent),

    /// A described frame from the capture task
    Frame {
        epoch: u64,
        path: PathBuf,
        description: String,
    },

    /// A recognized utterance from the listen task. The task holds its
    /// next listen until `done` fires, which keeps the voice cycle
    /// sequential: listen, handle, listen again.
    Utterance {
        epoch: u64,
        text: String,
        done: oneshot::Sender<()>,
    },

    /// Result of a background pairing wait
    PairingOutcome { peer: Option<std::net::IpAddr> },
}

/// Voice commands recognized inside a guidance loop
#[derive(Debug, PartialEq, Eq)]
enum VoiceCommand {
    Stop,
    Exam,
    Transcribe,
    Read,
    Usage,
    Size,
    Unrecognized,
}

/// A live guidance loop: one capture task, one listen task, both bound to
/// this epoch and torn down through the shutdown channel
struct GuidanceSession {
    mode: Mode,
    epoch: u64,
    shutdown: broadcast::Sender<()>,
    /// Joined on stop; the microphone is only free once this task is gone
    listen_task: JoinHandle<()>,
    started_at: Instant,
}

/// Connected exam-mode companion
struct ExamLink {
    endpoint: String,
    connected_at: Instant,
}

/// In-flight companion pairing
struct PendingPairing {
    cancel: broadcast::Sender<()>,
    cancelled: bool,
}

/// Question interrupt state; `previous` is restored exactly once
#[derive(Default)]
struct QuestionState {
    active: bool,
    previous: Option<Mode>,
}

/// The session/mode state machine
pub struct Controller {
    config: Config,
    services: Services,
    selection: ModeSelection,
    mode: Option<Mode>,
    session: Option<GuidanceSession>,
    exam: Option<ExamLink>,
    pairing: Option<PendingPairing>,
    question: QuestionState,
    dedup: AnnouncementDedup,
    context: ImageContextRing,
    /// Most recent speech output, for echo filtering
    last_spoken: String,
    /// Bumped for every new guidance session
    epoch: u64,
    cmd_tx: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<StateEvent>,
}

impl Controller {
    pub fn new(
        config: Config,
        services: Services,
        cmd_tx: mpsc::Sender<Command>,
        event_tx: broadcast::Sender<StateEvent>,
    ) -> Self {
        let dedup = AnnouncementDedup::new(config.announce_cooldown);
        Self {
            config,
            services,
            selection: ModeSelection::default(),
            mode: None,
            session: None,
            exam: None,
            pairing: None,
            question: QuestionState::default(),
            dedup,
            context: ImageContextRing::new(),
            last_spoken: String::new(),
            epoch: 0,
            cmd_tx,
            event_tx,
        }
    }

    /// Run the controller, processing commands until the channel closes
    pub async fn run(&mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        info!("controller started in idle state");

        while let Some(command) = cmd_rx.recv().await {
            self.handle_command(command).await;
        }

        info!("controller stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Gesture(gesture) => self.handle_gesture(gesture).await,
            Command::Frame {
                epoch,
                path,
                description,
            } => self.handle_frame(epoch, path, description).await,
            Command::Utterance { epoch, text, done } => {
                self.handle_utterance(epoch, text).await;
                let _ = done.send(());
            }
            Command::PairingOutcome { peer } => self.handle_pairing_outcome(peer).await,
        }
    }

    async fn handle_gesture(&mut self, gesture: GestureEvent) {
        debug!(?gesture, mode = ?self.mode, "gesture received");

        // Any gesture while pairing is waiting cancels the wait.
        if let Some(pending) = self.pairing.as_mut() {
            if !pending.cancelled {
                pending.cancelled = true;
                let _ = pending.cancel.send(());
                info!("pairing cancelled by gesture");
            }
        }

        match gesture {
            GestureEvent::VolumeUpDouble => self.start_selected_mode().await,
            GestureEvent::VolumeUpTriple => {
                let mode = self.selection.advance();
                info!(%mode, "selection cycled");
                self.start_selected_mode().await;
            }
            GestureEvent::VolumeDownDouble => match self.mode {
                // Exam and translate have no voice loop; the gesture is
                // their only way out.
                Some(Mode::Exam) | Some(Mode::Translate) => self.stop_current_mode(true).await,
                // During guidance (or when idle) the gesture opens the
                // question interrupt; guidance is paused and resumed by it.
                _ => self.ask_question().await,
            },
        }
    }

    /// Start whatever the cyclic selection points at
    async fn start_selected_mode(&mut self) {
        match self.selection.current() {
            mode if mode.is_guidance() => self.start_guidance(mode).await,
            Mode::Exam => self.start_exam_mode().await,
            _ => self.start_translate().await,
        }
    }

    /// Stop the active mode, if any. `announce` selects whether the stop
    /// confirmation is spoken; the question interrupt stops quietly.
    async fn stop_current_mode(&mut self, announce: bool) {
        let Some(mode) = self.mode else {
            return;
        };

        self.services.speech_out.stop();

        match mode {
            Mode::Visual | Mode::Road | Mode::Atm => {
                if let Some(session) = self.session.take() {
                    let _ = session.shutdown.send(());
                    // The listen task may be mid-listen and holding the
                    // microphone; a follow-up listen would be rejected
                    // until it has wound down.
                    let _ = session.listen_task.await;
                    let duration_ms = session.started_at.elapsed().as_millis() as u64;
                    info!(%mode, duration_ms, "guidance stopped");
                    self.emit(StateEvent::GuidanceStopped { mode, duration_ms });
                }
                self.mode = None;
                if announce {
                    self.say(prompts::GUIDANCE_STOPPED).await;
                }
            }
            Mode::Exam => {
                if let Some(link) = self.exam.take() {
                    let duration_ms = link.connected_at.elapsed().as_millis() as u64;
                    info!(endpoint = %link.endpoint, duration_ms, "exam disconnected");
                    self.emit(StateEvent::ExamDisconnected { duration_ms });
                }
                self.mode = None;
                if announce {
                    self.say(prompts::EXAM_DISCONNECTED).await;
                }
            }
            Mode::Translate => {
                // A translate round trip has no loop to tear down; halting
                // speech is the whole stop.
                self.mode = None;
                self.emit(StateEvent::TranslateStopped);
            }
        }
    }

    // ----- guidance -----

    async fn start_guidance(&mut self, mode: Mode) {
        if self.exam.is_some() {
            info!(%mode, "guidance rejected, exam connected");
            self.say(prompts::REJECT_GUIDANCE_DURING_EXAM).await;
            return;
        }

        // Starting a new mode always stops the previous one first.
        self.stop_current_mode(true).await;

        self.epoch += 1;
        let (shutdown_tx, _) = broadcast::channel(1);
        self.mode = Some(mode);

        info!(%mode, epoch = self.epoch, "guidance starting");
        self.say(intro(mode)).await;

        self.spawn_capture_task(self.epoch, shutdown_tx.subscribe());
        let listen_task = self.spawn_listen_task(self.epoch, shutdown_tx.subscribe());
        self.session = Some(GuidanceSession {
            mode,
            epoch: self.epoch,
            shutdown: shutdown_tx,
            listen_task,
            started_at: Instant::now(),
        });
        self.emit(StateEvent::GuidanceStarted { mode });
    }

    fn spawn_capture_task(&self, epoch: u64, mut shutdown: broadcast::Receiver<()>) {
        let camera = Arc::clone(&self.services.camera);
        let vision = Arc::clone(&self.services.vision);
        let settings = Arc::clone(&self.services.settings);
        let cmd_tx = self.cmd_tx.clone();
        let interval = self.config.capture_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // A slow capture+describe cycle skips ticks instead of
            // queueing them; captures never overlap.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        // Read the profile per tick: a language change
                        // takes effect without restarting the mode.
                        let language = settings.profile().language_code;
                        let path = match camera.capture_frame().await {
                            Ok(path) => path,
                            Err(e) => {
                                debug!(%e, "no frame this tick");
                                continue;
                            }
                        };
                        match vision.describe(&path, &language).await {
                            Ok(description) if !description.trim().is_empty() => {
                                let description = description.trim().to_string();
                                if cmd_tx
                                    .send(Command::Frame { epoch, path, description })
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!(%e, "frame description failed"),
                        }
                    }
                }
            }
            debug!(epoch, "capture task stopped");
        });
    }

    fn spawn_listen_task(
        &self,
        epoch: u64,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let mic = Arc::clone(&self.services.speech_in);
        let settings = Arc::clone(&self.services.settings);
        let cmd_tx = self.cmd_tx.clone();
        let window = self.config.listen_window;

        tokio::spawn(async move {
            loop {
                let language = settings.profile().language_code;
                tokio::select! {
                    _ = shutdown.recv() => break,
                    heard = mic.listen_once(window, &language) => {
                        if heard.trim().is_empty() {
                            continue;
                        }
                        let (done_tx, done_rx) = oneshot::channel();
                        if cmd_tx
                            .send(Command::Utterance { epoch, text: heard, done: done_tx })
                            .await
                            .is_err()
                        {
                            break;
                        }
                        // Block the next listen until the controller has
                        // handled this one; sub-interactions may need the
                        // microphone.
                        tokio::select! {
                            _ = shutdown.recv() => break,
                            _ = done_rx => {}
                        }
                    }
                }
            }
            debug!(epoch, "listen task stopped");
        })
    }

    async fn handle_frame(&mut self, epoch: u64, path: PathBuf, description: String) {
        let Some(current) = self.session.as_ref().map(|s| s.epoch) else {
            debug!("frame after session end dropped");
            return;
        };
        if current != epoch {
            debug!(epoch, current, "stale frame dropped");
            return;
        }

        // Retained for diagnostics, never spoken.
        if let Some(error) = self.services.vision.last_error() {
            debug!(error, "vision backend reported an earlier failure");
        }

        let speak = self.dedup.should_speak(&description);
        self.context.push(path, description.clone());
        if speak {
            self.say(&description).await;
        } else {
            debug!("announcement suppressed as duplicate");
        }
    }

    async fn handle_utterance(&mut self, epoch: u64, text: String) {
        let Some(current) = self.session.as_ref().map(|s| s.epoch) else {
            debug!("utterance after session end dropped");
            return;
        };
        if current != epoch {
            debug!(epoch, current, "stale utterance dropped");
            return;
        }

        let cleaned = sanitize(&text, &self.last_spoken);
        if cleaned.is_empty() {
            debug!(raw = %text, "utterance filtered as echo");
            return;
        }

        match classify(&cleaned) {
            VoiceCommand::Stop => {
                info!("voice command: stop");
                self.stop_current_mode(true).await;
            }
            VoiceCommand::Exam => {
                // Stop the loop first, then go straight into exam mode.
                info!("voice command: exam");
                self.stop_current_mode(false).await;
                self.start_exam_mode().await;
            }
            VoiceCommand::Transcribe => self.transcribe_and_replay().await,
            VoiceCommand::Read => self.read_latest_frame().await,
            VoiceCommand::Usage => self.object_query(true).await,
            VoiceCommand::Size => self.object_query(false).await,
            VoiceCommand::Unrecognized => {
                debug!(text = %cleaned, "unrecognized utterance ignored");
            }
        }
    }

    /// One-shot listen, translate, speak back
    async fn transcribe_and_replay(&mut self) {
        let language = self.services.settings.profile().language_code;
        self.say(prompts::LISTENING).await;
        let heard = self
            .services
            .speech_in
            .listen_once(self.config.listen_window, &language)
            .await;
        if heard.trim().is_empty() {
            self.say(prompts::NOT_UNDERSTOOD).await;
            return;
        }

        match self.services.translator.translate(heard.trim(), &language).await {
            Ok(translated) if !translated.trim().is_empty() => {
                let translated = translated.trim().to_string();
                self.say(&translated).await;
            }
            Ok(_) => self.say(prompts::TRANSLATE_FAILED).await,
            Err(e) => {
                warn!(%e, "transcribe translation failed");
                self.say(prompts::TRANSLATE_FAILED).await;
            }
        }
    }

    /// Read on-screen or printed text from the most recent frame
    async fn read_latest_frame(&mut self) {
        let Some(path) = self.context.latest().map(|e| e.path.clone()) else {
            self.say(prompts::READ_NOTHING).await;
            return;
        };

        let language = self.services.settings.profile().language_code;
        match self.services.vision.read_text(&path, &language).await {
            Ok(text) if !text.trim().is_empty() => {
                let text = text.trim().to_string();
                self.say(&text).await;
            }
            Ok(_) => self.say(prompts::READ_NOTHING).await,
            Err(e) => {
                warn!(%e, "text reading failed");
                self.say(prompts::READ_NOTHING).await;
            }
        }
    }

    /// Ask the vision service about the last-detected object
    async fn object_query(&mut self, usage: bool) {
        let language = self.services.settings.profile().language_code;
        let result = if usage {
            self.services.vision.object_usage(&language).await
        } else {
            self.services.vision.object_size(&language).await
        };

        match result {
            Ok(text) if !text.trim().is_empty() => {
                let text = text.trim().to_string();
                self.say(&text).await;
            }
            Ok(_) => self.say(prompts::QUESTION_NO_ANSWER).await,
            Err(e) => {
                warn!(%e, usage, "object query failed");
                self.say(prompts::QUESTION_NO_ANSWER).await;
            }
        }
    }

    // ----- question interrupt -----

    /// Preempt the active mode with a one-shot spoken question, then
    /// restore it. Idempotent while active.
    async fn ask_question(&mut self) {
        if self.question.active {
            debug!("question already in progress");
            return;
        }

        let previous = self.mode;
        self.question.active = true;
        self.question.previous = previous;
        info!(?previous, "question interrupt opened");
        self.emit(StateEvent::QuestionOpened { previous });

        self.services.speech_out.stop();
        self.stop_current_mode(false).await;

        self.say(prompts::QUESTION_INVITE).await;
        let language = self.services.settings.profile().language_code;
        let heard = self
            .services
            .speech_in
            .listen_once(self.config.question_listen_window, &language)
            .await;
        let question = heard.trim().to_string();

        let answered = if question.is_empty() {
            self.say(prompts::QUESTION_NOT_HEARD).await;
            false
        } else {
            let images = self.context.paths();
            // Location is optional, never blocking.
            let location = self.services.location.current_fix().await;
            match self
                .services
                .answers
                .answer(&question, &language, &images, location)
                .await
            {
                Ok(answer) if !answer.trim().is_empty() => {
                    let answer = answer.trim().to_string();
                    self.say(&answer).await;
                    true
                }
                Ok(_) => {
                    self.say(prompts::QUESTION_NO_ANSWER).await;
                    false
                }
                Err(e) => {
                    warn!(%e, "answer service failed");
                    self.say(prompts::QUESTION_NO_ANSWER).await;
                    false
                }
            }
        };

        // Restore the previous mode exactly once, on every exit path.
        self.question.active = false;
        if let Some(previous) = self.question.previous.take() {
            info!(%previous, "restoring interrupted mode");
            self.selection.select(previous);
            self.start_selected_mode().await;
        }
        self.emit(StateEvent::QuestionClosed { answered });
    }

    // ----- exam mode -----

    async fn start_exam_mode(&mut self) {
        if self.session.is_some() {
            info!("exam rejected, guidance active");
            self.say(prompts::REJECT_EXAM_DURING_GUIDANCE).await;
            return;
        }
        if self.exam.is_some() {
            debug!("exam already connected");
            return;
        }
        if self.pairing.is_some() {
            debug!("pairing already in progress");
            return;
        }

        self.stop_current_mode(true).await;
        self.say(prompts::EXAM_EXPLAINER).await;

        if let Some(endpoint) = self.services.settings.profile().companion_address {
            self.connect_exam(endpoint).await;
            return;
        }

        if !self.begin_pairing().await {
            self.manual_companion_fallback().await;
        }
    }

    async fn connect_exam(&mut self, endpoint: String) {
        self.services
            .settings
            .set_companion_address(Some(endpoint.clone()));
        self.mode = Some(Mode::Exam);
        self.exam = Some(ExamLink {
            endpoint: endpoint.clone(),
            connected_at: Instant::now(),
        });
        info!(%endpoint, "exam mode connected");
        self.emit(StateEvent::ExamConnected { endpoint });
        self.say(prompts::EXAM_CONNECTED).await;
    }

    /// Start serving the companion installer and wait for the peer in the
    /// background. Returns false when the listener could not be set up.
    async fn begin_pairing(&mut self) -> bool {
        let server = match pairing::prepare(&self.config.payload_path).await {
            Ok(server) => server,
            Err(e) => {
                warn!(%e, "pairing setup failed");
                self.say(prompts::PAIRING_FAILED).await;
                return false;
            }
        };

        let addr = server.local_addr();
        self.emit(StateEvent::PairingStarted {
            address: addr.to_string(),
        });
        self.say(&prompts::pairing_instructions(&addr)).await;

        let (cancel_tx, cancel_rx) = broadcast::channel(1);
        self.pairing = Some(PendingPairing {
            cancel: cancel_tx,
            cancelled: false,
        });

        let cmd_tx = self.cmd_tx.clone();
        let wait = self.config.pairing_wait;
        tokio::spawn(async move {
            let peer = server.wait_for_peer(wait, cancel_rx).await;
            let _ = cmd_tx.send(Command::PairingOutcome { peer }).await;
        });
        true
    }

    async fn handle_pairing_outcome(&mut self, peer: Option<std::net::IpAddr>) {
        let Some(pending) = self.pairing.take() else {
            debug!("pairing outcome without a pending pairing");
            return;
        };

        if pending.cancelled {
            info!("pairing ended after cancellation");
            self.emit(StateEvent::PairingFailed);
            self.say(prompts::CANCELLED).await;
            return;
        }

        match peer {
            Some(peer) => {
                let endpoint = pairing::companion_endpoint(peer);
                self.emit(StateEvent::PairingCompleted {
                    endpoint: endpoint.clone(),
                });
                self.connect_exam(endpoint).await;
            }
            None => {
                self.emit(StateEvent::PairingFailed);
                self.say(prompts::PAIRING_TIMED_OUT).await;
                self.manual_companion_fallback().await;
            }
        }
    }

    async fn manual_companion_fallback(&mut self) {
        let entered = self.services.address_prompt.companion_address().await;
        match entered.as_deref().and_then(pairing::normalize_manual_address) {
            Some(endpoint) => self.connect_exam(endpoint).await,
            None => self.say(prompts::EXAM_NO_COMPANION).await,
        }
    }

    // ----- translate mode -----

    async fn start_translate(&mut self) {
        if self.exam.is_some() {
            info!("translate rejected, exam connected");
            self.say(prompts::REJECT_TRANSLATE_DURING_EXAM).await;
            return;
        }

        self.stop_current_mode(true).await;
        self.mode = Some(Mode::Translate);
        self.emit(StateEvent::TranslateStarted);

        let language = self.services.settings.profile().language_code;
        self.say(prompts::TRANSLATE_INVITE).await;
        let heard = self
            .services
            .speech_in
            .listen_once(self.config.listen_window, &language)
            .await;
        if heard.trim().is_empty() {
            self.say(prompts::NOT_UNDERSTOOD).await;
            return;
        }

        match self.services.translator.translate(heard.trim(), &language).await {
            Ok(translated) if !translated.trim().is_empty() => {
                let translated = translated.trim().to_string();
                self.say(&translated).await;
            }
            Ok(_) => self.say(prompts::TRANSLATE_FAILED).await,
            Err(e) => {
                warn!(%e, "translation failed");
                self.say(prompts::TRANSLATE_FAILED).await;
            }
        }
    }

    // ----- helpers -----

    async fn say(&mut self, text: &str) {
        self.last_spoken = text.to_string();
        self.services.speech_out.speak(text).await;
    }

    fn emit(&self, event: StateEvent) {
        debug!(%event, "emitting event");
        let _ = self.event_tx.send(event);
    }
}

fn intro(mode: Mode) -> &'static str {
    match mode {
        Mode::Road => prompts::INTRO_ROAD,
        Mode::Atm => prompts::INTRO_ATM,
        _ => prompts::INTRO_VISUAL,
    }
}

/// Classify a sanitized utterance by whole-word keywords
fn classify(text: &str) -> VoiceCommand {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .collect();
    let has = |keyword: &str| words.iter().any(|&w| w == keyword);

    if has("stop") || has("exit") {
        VoiceCommand::Stop
    } else if has("exam") {
        VoiceCommand::Exam
    } else if has("transcribe") {
        VoiceCommand::Transcribe
    } else if has("read") {
        VoiceCommand::Read
    } else if has("use") || has("usage") {
        VoiceCommand::Usage
    } else if has("size") || has("big") {
        VoiceCommand::Size
    } else {
        VoiceCommand::Unrecognized
    }
}
