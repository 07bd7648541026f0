//! Action collaborators - the side of the pipeline that touches the system.
//!
//! The dispatcher only decides; an [`ActionSink`] carries the decision out.
//! [`SystemActions`] is dry-run unless constructed with `live = true`, in
//! which case it spawns the platform programs.

use crate::error::ActionError;
use crate::types::{ActionInvocation, Outcome, UnrecognizedReason};
use std::process::Command;

/// Receives the outcome of every cycle
pub trait ActionSink {
    /// Carry out an `Act` outcome
    fn invoke(&mut self, invocation: &ActionInvocation) -> Result<(), ActionError>;

    /// Surface a non-acting outcome to the user
    fn report(&mut self, outcome: &Outcome) {
        log::info!("{}", describe(outcome));
    }
}

/// Human-readable line for a non-acting outcome
pub fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Act(invocation) => match &invocation.parameter {
            Some(p) => format!("Running {} ({})", invocation.action, p),
            None => format!("Running {}", invocation.action),
        },
        Outcome::ReportUnrecognized {
            reason: UnrecognizedReason::LowConfidence,
        } => "I'm not sure what you mean. Please try a different command.".to_string(),
        Outcome::ReportUnrecognized {
            reason: UnrecognizedReason::NoneIntent,
        } => "Not a recognized command.".to_string(),
        Outcome::ReportUnrecognized {
            reason: UnrecognizedReason::NoAction,
        } => "Recognized that, but no action is defined for it.".to_string(),
        Outcome::ReportMissingParameter { intent } => {
            format!("You asked for '{}', but I don't know which destination.", intent)
        }
    }
}

/// Local desktop actions
#[derive(Debug, Clone, Default)]
pub struct SystemActions {
    live: bool,
}

impl SystemActions {
    pub fn new(live: bool) -> Self {
        Self { live }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<(), ActionError> {
        if !self.live {
            log::info!("[dry-run] {} {}", program, args.join(" "));
            return Ok(());
        }

        log::debug!("Spawning {} {:?}", program, args);
        Command::new(program)
            .args(args)
            .spawn()
            .map(|_| ())
            .map_err(|source| ActionError::Launch {
                program: program.to_string(),
                source,
            })
    }

    fn open_editor(&self) -> Result<(), ActionError> {
        println!("Opening text editor...");
        if cfg!(target_os = "windows") {
            self.run("notepad.exe", &[])
        } else if cfg!(target_os = "macos") {
            self.run("open", &["-a", "TextEdit"])
        } else {
            self.run("gedit", &[])
        }
    }

    fn open_url(&self, url: &str) -> Result<(), ActionError> {
        println!("Opening {}", url);
        if cfg!(target_os = "windows") {
            self.run("cmd", &["/C", "start", "", url])
        } else if cfg!(target_os = "macos") {
            self.run("open", &[url])
        } else {
            self.run("xdg-open", &[url])
        }
    }

    fn shutdown(&self) -> Result<(), ActionError> {
        println!("Initiating shutdown sequence...");
        if cfg!(target_os = "windows") {
            self.run("shutdown", &["/s", "/t", "60"])?;
            println!("Shutdown scheduled in 60 seconds. Run 'shutdown /a' to cancel.");
        } else {
            self.run("shutdown", &["-h", "+1"])?;
            println!("Shutdown scheduled in 1 minute. Run 'shutdown -c' to cancel.");
        }
        Ok(())
    }
}

impl ActionSink for SystemActions {
    fn invoke(&mut self, invocation: &ActionInvocation) -> Result<(), ActionError> {
        match invocation.action.as_str() {
            "open_notepad" => self.open_editor(),
            "open_destination" => {
                let url = invocation
                    .parameter
                    .as_deref()
                    .ok_or_else(|| ActionError::MissingParameter(invocation.action.to_string()))?;
                self.open_url(url)
            }
            "shutdown" => self.shutdown(),
            "report_time" => {
                println!("The current time is {}", current_time());
                Ok(())
            }
            "greet" => {
                println!("Hello to you too!");
                Ok(())
            }
            other => Err(ActionError::Unsupported(other.to_string())),
        }
    }

    fn report(&mut self, outcome: &Outcome) {
        println!("{}", describe(outcome));
    }
}

/// Local wall-clock time, e.g. "03:07 PM"
pub fn current_time() -> String {
    chrono::Local::now().format("%I:%M %p").to_string()
}

/// Sink that only remembers what it was asked to do
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub invocations: Vec<ActionInvocation>,
    pub reports: Vec<Outcome>,
}

impl ActionSink for RecordingSink {
    fn invoke(&mut self, invocation: &ActionInvocation) -> Result<(), ActionError> {
        self.invocations.push(invocation.clone());
        Ok(())
    }

    fn report(&mut self, outcome: &Outcome) {
        self.reports.push(outcome.clone());
    }
}
