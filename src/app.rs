use crate::config::Config;
use crate::console;
use crate::controller::SessionController;
use crate::error::Alert;
use crate::messages::Command;
use crate::services::{
    ConsentGate, ConsentResponder, FileSlot, MicrophoneAccess, Recorder, RecorderHandle,
    RodioPlayer,
};
use crate::session::Action;

use anyhow::Result;
use tokio::sync::mpsc;

pub struct App {
    controller: SessionController,
    consent: ConsentResponder,
    prompt_for_access: bool,
    command_rx: mpsc::Receiver<Command>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let capture = Self::setup_recorder();
        let gate = ConsentGate::new(config.microphone_access);
        let consent = gate.responder();

        let recording_path = config.recording_path();
        let controller = SessionController::new(
            recording_path.clone(),
            config.audio_format(),
            Box::new(capture),
            Box::new(RodioPlayer::new()),
            Box::new(gate),
            Box::new(FileSlot),
        );

        let command_rx = Self::setup_console();

        tracing::info!("Ready, recording to {}", recording_path.display());

        Self {
            controller,
            consent,
            prompt_for_access: config.microphone_access == MicrophoneAccess::Prompt,
            command_rx,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        println!("{}", console::HELP);
        console::show(&self.controller.view());

        loop {
            tracing::debug!("Main loop: waiting for event");
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(Command::Quit) | None => break,
                    Some(command) => self.handle_command(command).await,
                },

                granted = self.controller.permission_response(), if self.controller.awaiting_permission() => {
                    tracing::debug!("Main loop: permission answered: {}", granted);
                    let alerts = self.controller.resolve_permission(granted).await;
                    self.present(alerts);
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.controller.shutdown().await;
        tracing::info!("voice-memo shutdown complete");
        Ok(())
    }

    async fn handle_command(&mut self, command: Command) {
        tracing::debug!(
            "handle_command: {:?} in {:?}",
            command,
            self.controller.phase()
        );

        let action = match command {
            Command::Record => Action::Record,
            Command::Stop => Action::Stop,
            Command::Play => Action::Play,
            Command::Clear => Action::Clear,
            Command::Allow | Command::Deny => {
                // The answer reaches the controller through the permission branch
                if !self.consent.answer(command == Command::Allow) {
                    println!("No microphone access request is pending");
                }
                return;
            }
            Command::Status => {
                console::show(&self.controller.view());
                return;
            }
            Command::Help => {
                println!("{}", console::HELP);
                return;
            }
            Command::Quit => return,
        };

        let alerts = self.controller.handle(action).await;
        self.present(alerts);

        if self.prompt_for_access && self.controller.awaiting_permission() {
            console::show_permission_prompt();
        }
    }

    fn present(&self, alerts: Vec<Alert>) {
        for alert in &alerts {
            console::show_alert(alert);
        }
        console::show(&self.controller.view());
    }

    fn setup_recorder() -> RecorderHandle {
        // Recorder holds cpal::Stream which is !Send
        let (recorder_tx, recorder_rx) = mpsc::channel(10);
        tokio::task::spawn_local(Recorder::new(recorder_rx).run());
        RecorderHandle::new(recorder_tx)
    }

    fn setup_console() -> mpsc::Receiver<Command> {
        let (command_tx, command_rx) = mpsc::channel(10);
        std::thread::spawn(move || {
            if let Err(e) = console::read_commands(command_tx) {
                tracing::error!("Console input failed: {:#}", e);
            }
        });
        command_rx
    }
}
