use std::fmt::Write as _;
use std::str::FromStr;

use log::{debug, error};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, BufReader};

use crate::beacon::Beacon;
use crate::configure::Configurator;
use crate::controller::{ScanSessionController, ScanState};
use crate::messages::{EventReceiver, ServiceEvent};
use crate::ranging::RangingService;

const HELP: &str = "Commands: start, stop, list, select <n>, help, quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    List,
    /// One-based position in the displayed list.
    Select(usize),
    Answer(bool),
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default().to_lowercase();
        let command = match command.as_str() {
            "start" => Command::Start,
            "stop" => Command::Stop,
            "list" | "ls" => Command::List,
            "y" | "yes" => Command::Answer(true),
            "n" | "no" => Command::Answer(false),
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            "select" | "s" => {
                let position = words
                    .next()
                    .and_then(|w| w.parse::<usize>().ok())
                    .filter(|&n| n > 0)
                    .ok_or_else(|| "Usage: select <n>".to_string())?;
                Command::Select(position)
            }
            "" => return Err(HELP.to_string()),
            other => return Err(format!("Unknown command '{other}'. {HELP}")),
        };
        Ok(command)
    }
}

/// What the terminal shows, captured from the controller's projections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct View {
    pub state: ScanState,
    pub subtitle: String,
    pub beacons: Vec<Beacon>,
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub progress_visible: bool,
    pub awaiting_enable: bool,
}

impl View {
    pub fn capture<S: RangingService>(controller: &ScanSessionController<S>) -> Self {
        View {
            state: controller.state(),
            subtitle: controller.subtitle().to_string(),
            beacons: controller.beacons().to_vec(),
            start_enabled: controller.start_enabled(),
            stop_enabled: controller.stop_enabled(),
            progress_visible: controller.progress_visible(),
            awaiting_enable: controller.awaiting_enable(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let spinner = match (self.state, self.progress_visible) {
            (ScanState::Connecting, _) => " (connecting)",
            (_, true) => " ...",
            _ => "",
        };
        let _ = writeln!(out, "== {}{spinner}", self.subtitle);
        for (i, beacon) in self.beacons.iter().enumerate() {
            let _ = writeln!(out, "{:>3}. {beacon}", i + 1);
        }

        let mut actions = Vec::new();
        if self.start_enabled {
            actions.push("start");
        }
        if self.stop_enabled {
            actions.push("stop");
        }
        if !self.beacons.is_empty() {
            actions.push("select <n>");
        }
        let _ = write!(out, "[{}]", actions.join(" | "));

        if self.awaiting_enable {
            let _ = write!(
                out,
                "\nBluetooth is disabled. Turn it on and answer 'y', or 'n' to cancel."
            );
        }
        out
    }
}

enum Input {
    Line(std::io::Result<Option<String>>),
    Event(ServiceEvent),
}

/// The UI loop. All controller calls happen here, one at a time.
pub struct Terminal<S, C> {
    controller: ScanSessionController<S>,
    configurator: C,
    events: EventReceiver,
    shown: Option<View>,
}

impl<S: RangingService, C: Configurator> Terminal<S, C> {
    pub fn new(controller: ScanSessionController<S>, configurator: C, events: EventReceiver) -> Self {
        Terminal {
            controller,
            configurator,
            events,
            shown: None,
        }
    }

    pub async fn run(mut self, scan_on_start: bool) -> anyhow::Result<()> {
        self.run_with(BufReader::new(tokio::io::stdin()), scan_on_start).await;
        Ok(())
    }

    /// Drive the loop from `input` until quit, end of input or a read error.
    /// The session is always shut down on the way out.
    async fn run_with<R: AsyncBufRead + Unpin>(&mut self, input: R, scan_on_start: bool) {
        let mut lines = input.lines();
        println!("{HELP}");

        if scan_on_start {
            self.dispatch(Command::Start).await;
        }
        self.refresh(false);

        loop {
            let input = tokio::select! {
                line = lines.next_line() => Input::Line(line),
                Some(event) = self.events.recv() => Input::Event(event),
            };

            match input {
                Input::Line(Ok(None)) => {
                    debug!("stdin closed");
                    break;
                }
                Input::Line(Err(err)) => {
                    error!("Error reading commands: {err}");
                    break;
                }
                Input::Line(Ok(Some(line))) => match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => self.dispatch(command).await,
                    Err(message) => println!("{message}"),
                },
                Input::Event(event) => {
                    if let Err(err) = self.controller.handle_event(event).await {
                        debug!("Service event failed: {err}");
                    }
                }
            }
            self.refresh(false);
        }

        self.controller.shutdown().await;
        println!("Exiting");
    }

    async fn dispatch(&mut self, command: Command) {
        let result = match command {
            Command::Start => self.controller.request_start().await.map(|_| ()),
            Command::Stop => self.controller.request_stop().await,
            Command::Answer(granted) => self.controller.on_external_enable_result(granted).await,
            Command::List => {
                self.refresh(true);
                Ok(())
            }
            Command::Help => {
                println!("{HELP}");
                Ok(())
            }
            Command::Select(position) => {
                self.configure(position).await;
                Ok(())
            }
            Command::Quit => Ok(()),
        };
        if let Err(err) = result {
            debug!("{command:?} failed: {err}");
        }
    }

    async fn configure(&mut self, position: usize) {
        let selected = position.checked_sub(1).and_then(|i| self.controller.select(i));
        let Some(beacon) = selected.cloned() else {
            println!("No beacon at position {position}");
            return;
        };

        let outcome = match self.configurator.configure(&beacon) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("Error configuring beacon {}: {err:#}", beacon.address);
                return;
            }
        };
        if let Err(err) = self.controller.on_configuration_result(outcome).await {
            debug!("Refresh after configuration failed: {err}");
        }
    }

    fn refresh(&mut self, force: bool) {
        for notice in self.controller.take_notices() {
            println!("! {notice}");
        }

        let view = View::capture(&self.controller);
        if force || self.shown.as_ref() != Some(&view) {
            println!("{}", view.render());
            self.shown = Some(view);
        }
    }
}
