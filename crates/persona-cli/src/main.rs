use std::fmt;
use std::io::{self, BufRead, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use persona_contracts::catalog::{
    archetypes_in_group, Archetype, ArchetypeGroup, ArtStyle, ARCHETYPES, ART_STYLES,
};
use persona_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use persona_contracts::studio::{
    GenerationRequest, GenerationState, History, ImagePayload, SelectionAxis, StudioError,
};
use persona_engine::config::DEFAULT_OUT_DIR;
use persona_engine::{
    CompletedGeneration, CredentialSlot, EngineConfig, HostKeyCapability, KeyGate, Studio,
};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(
    name = "persona-gen",
    version,
    about = "Personality character sheet generator"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive studio session.
    Chat(ChatArgs),
    /// Generate one character sheet and save it.
    Run(RunArgs),
    /// List personality types and art styles.
    Catalog(CatalogArgs),
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long, default_value = DEFAULT_OUT_DIR)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    /// Skip the startup API key prompt.
    #[arg(long)]
    no_key_gate: bool,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long = "type")]
    archetype: Option<String>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    size: Option<String>,
    #[arg(long, default_value = DEFAULT_OUT_DIR)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    /// Print the full image as a data URI instead of saving it.
    #[arg(long)]
    data_uri: bool,
}

#[derive(Debug, Parser)]
struct CatalogArgs {
    #[arg(long)]
    json: bool,
}

const DATA_URI_PREVIEW_CHARS: usize = 48;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("persona-gen error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Run(args) => run_once(args),
        Command::Catalog(args) => run_catalog(args),
    }
}

fn engine_config(out: PathBuf, events: Option<PathBuf>, model: Option<String>) -> EngineConfig {
    EngineConfig::from_env()
        .with_out_dir(out)
        .with_events_path(events)
        .with_model(model)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let config = engine_config(args.out, args.events, args.model);
    let credentials = CredentialSlot::new();
    let gate = if args.no_key_gate {
        KeyGate::permissive()
    } else {
        KeyGate::new(Some(Box::new(TerminalKeyPicker {
            credentials: credentials.clone(),
        })))
    };
    let mut studio = Studio::new(&config, gate, credentials)?;
    if !unlock_key_gate(&mut studio)? {
        studio.finish()?;
        return Ok(());
    }

    let (sender, receiver) = mpsc::channel();
    spawn_input_reader(sender.clone())?;
    let mut session = ChatSession::new(studio, io::stdout(), sender);
    session.start()?;
    while let Ok(event) = receiver.recv() {
        if session.handle_event(event)? == Flow::Quit {
            break;
        }
    }
    session.finish()
}

/// Keeps the user on the key prompt until the gate reports usable. Returns
/// false when input ends first.
fn unlock_key_gate(studio: &mut Studio) -> Result<bool> {
    studio.check_key_gate()?;
    while !studio.is_key_usable() {
        println!("Persona Gen needs a Gemini API key before it can generate.");
        println!("Paste a key below, or restart with GEMINI_API_KEY set.");
        match studio.request_key_selection() {
            Ok(_) => {}
            Err(err) if err.downcast_ref::<InputClosed>().is_some() => return Ok(false),
            Err(err) => println!("Key selection failed: {err:#}"),
        }
    }
    Ok(true)
}

fn run_once(args: RunArgs) -> Result<i32> {
    let config = engine_config(args.out, args.events, args.model);
    let mut studio = Studio::new(&config, KeyGate::permissive(), CredentialSlot::new())?;
    studio.check_key_gate()?;
    let axes = [
        (SelectionAxis::Archetype, args.archetype),
        (SelectionAxis::Style, args.style),
        (SelectionAxis::Gender, args.gender),
        (SelectionAxis::Size, args.size),
    ];
    for (axis, raw) in axes {
        if let Some(raw) = raw {
            studio.select_from_str(axis, &raw)?;
        }
    }

    println!(
        "Generating {} with {}...",
        describe_selection(studio.selection()),
        studio.model().name
    );
    let failure = studio.generate()?.error().map(str::to_string);
    if let Some(message) = failure {
        eprintln!("{message}");
        studio.finish()?;
        return Ok(1);
    }
    if args.data_uri {
        if let Some(payload) = studio.generation().payload() {
            println!("{}", payload.data_uri());
        }
    } else {
        let path = studio.download(None)?;
        println!("Saved {}", path.display());
    }
    studio.finish()?;
    Ok(0)
}

fn run_catalog(args: CatalogArgs) -> Result<i32> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog_json())?);
    } else {
        print!("{}", render_types(None));
        println!();
        print!("{}", render_styles(None));
    }
    Ok(0)
}

#[derive(Debug)]
struct InputClosed;

impl fmt::Display for InputClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("input closed before a key was entered")
    }
}

impl std::error::Error for InputClosed {}

/// Key picker for a terminal host: the key is pasted on stdin.
struct TerminalKeyPicker {
    credentials: CredentialSlot,
}

impl HostKeyCapability for TerminalKeyPicker {
    fn has_selected_key(&self) -> Result<bool> {
        Ok(self.credentials.has_key())
    }

    fn open_select_key(&self) -> Result<()> {
        print!("API key: ");
        io::stdout().flush()?;
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(InputClosed.into());
        }
        let key = line.trim();
        if key.is_empty() {
            bail!("no key entered");
        }
        self.credentials.select(key);
        Ok(())
    }
}

enum UiEvent {
    Line(String),
    InputClosed,
    Generated(CompletedGeneration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn spawn_input_reader(sender: mpsc::Sender<UiEvent>) -> Result<()> {
    thread::Builder::new()
        .name("persona-gen-input".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.lock().read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = line.trim_end_matches(['\n', '\r']).to_string();
                        if sender.send(UiEvent::Line(text)).is_err() {
                            return;
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            let _ = sender.send(UiEvent::InputClosed);
        })
        .context("failed to spawn input reader")?;
    Ok(())
}

/// Control side of the REPL. Input lines and finished generations arrive on
/// one channel, so state only changes on this thread.
struct ChatSession<W: Write> {
    studio: Studio,
    out: W,
    sender: mpsc::Sender<UiEvent>,
    closing: bool,
}

impl<W: Write> ChatSession<W> {
    fn new(studio: Studio, out: W, sender: mpsc::Sender<UiEvent>) -> Self {
        Self {
            studio,
            out,
            sender,
            closing: false,
        }
    }

    fn start(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "Persona Gen started. Type /help for commands, or a line like `ENFP watercolor` to generate."
        )?;
        writeln!(
            self.out,
            "Model: {} | events: {}",
            self.studio.model().name,
            self.studio.events_path().display()
        )?;
        writeln!(self.out, "{}", describe_selection(self.studio.selection()))?;
        self.prompt()
    }

    fn prompt(&mut self) -> Result<()> {
        write!(self.out, "> ")?;
        self.out.flush()?;
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        let summary_path = self.studio.finish()?;
        writeln!(self.out)?;
        writeln!(
            self.out,
            "Session saved to {}. {} image(s) in history.",
            summary_path.display(),
            self.studio.history().len()
        )?;
        Ok(())
    }

    fn handle_event(&mut self, event: UiEvent) -> Result<Flow> {
        let flow = match event {
            UiEvent::Line(line) => self.handle_line(&line)?,
            UiEvent::InputClosed => Flow::Quit,
            UiEvent::Generated(completed) => {
                self.studio.complete(completed)?;
                writeln!(self.out)?;
                writeln!(self.out, "{}", describe_generation(self.studio.generation()))?;
                if self.closing {
                    return Ok(Flow::Quit);
                }
                Flow::Continue
            }
        };
        if flow == Flow::Quit {
            if !self.studio.is_loading() {
                return Ok(Flow::Quit);
            }
            if !self.closing {
                self.closing = true;
                writeln!(self.out, "Waiting for the current generation to finish...")?;
            }
            return Ok(Flow::Continue);
        }
        self.prompt()?;
        Ok(Flow::Continue)
    }

    fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let intent = parse_intent(line);
        match intent.action.as_str() {
            "noop" => {}
            "quit" => return Ok(Flow::Quit),
            "help" => {
                writeln!(self.out, "Commands: {}", CHAT_HELP_COMMANDS.join(" "))?;
                writeln!(
                    self.out,
                    "Any other text picks matching values (e.g. `infp oil nb 2k`) and generates."
                )?;
            }
            "select" => self.apply_selection_updates(&intent)?,
            "generate" => {
                self.apply_selection_updates(&intent)?;
                let ignored = string_list(intent.command_args.get("unmatched"));
                if !ignored.is_empty() {
                    writeln!(self.out, "Ignored: {}", ignored.join(", "))?;
                }
                self.start_generation()?;
            }
            "dismiss" => {
                let message = if self.studio.dismiss_error()? {
                    "Error dismissed."
                } else {
                    "Nothing to dismiss."
                };
                writeln!(self.out, "{message}")?;
            }
            "history" => write!(self.out, "{}", render_history(self.studio.history()))?,
            "restore" => {
                let reference = command_arg(&intent, "entry");
                if reference.is_empty() {
                    writeln!(self.out, "/restore requires a history number or id.")?;
                } else {
                    match self.studio.restore(&reference) {
                        Ok(entry) => {
                            let text = describe_selection(&entry.request);
                            writeln!(self.out, "Restored {text}")?;
                        }
                        Err(err) => self.report(err)?,
                    }
                }
            }
            "download" => {
                let dir = command_arg(&intent, "path");
                let dir = (!dir.is_empty()).then(|| PathBuf::from(dir));
                match self.studio.download(dir.as_deref()) {
                    Ok(path) => writeln!(self.out, "Saved {}", path.display())?,
                    Err(err) => self.report(err)?,
                }
            }
            "info" => write!(self.out, "{}", render_info(self.studio.selection()))?,
            "list_types" => write!(
                self.out,
                "{}",
                render_types(Some(self.studio.selection().archetype))
            )?,
            "list_styles" => write!(
                self.out,
                "{}",
                render_styles(Some(self.studio.selection().style))
            )?,
            "status" => self.render_status()?,
            "set_model" => self.set_model(&command_arg(&intent, "model"))?,
            "select_key" => {
                let key = command_arg(&intent, "key");
                if key.is_empty() {
                    writeln!(self.out, "/key requires a value.")?;
                } else if self.studio.select_key(&key)? {
                    writeln!(self.out, "API key selected; it applies to the next generation.")?;
                }
            }
            _ => {
                let command = command_arg(&intent, "command");
                writeln!(
                    self.out,
                    "Unknown command /{command}. Type /help for commands."
                )?;
            }
        }
        Ok(Flow::Continue)
    }

    fn apply_selection_updates(&mut self, intent: &Intent) -> Result<()> {
        for (key, value) in &intent.settings_update {
            let Some(axis) = SelectionAxis::from_key(key) else {
                continue;
            };
            let raw = value.as_str().unwrap_or_default();
            if raw.trim().is_empty() {
                writeln!(self.out, "/{} requires a value.", axis_command(axis))?;
                continue;
            }
            match self.studio.select_from_str(axis, raw) {
                Ok(changed) => {
                    let current = describe_axis(self.studio.selection(), axis);
                    if changed {
                        writeln!(self.out, "{}: {current}", axis_title(axis))?;
                    } else {
                        writeln!(self.out, "{} is already {current}.", axis_title(axis))?;
                    }
                }
                Err(err) => self.report(err)?,
            }
        }
        Ok(())
    }

    fn start_generation(&mut self) -> Result<()> {
        let job = match self.studio.begin_generation() {
            Ok(job) => job,
            Err(err) => return self.report(err),
        };
        writeln!(
            self.out,
            "Generating {} with {}...",
            describe_selection(job.request()),
            self.studio.model().name
        )?;
        let sender = self.sender.clone();
        thread::Builder::new()
            .name("persona-gen-worker".to_string())
            .spawn(move || {
                let _ = sender.send(UiEvent::Generated(job.run()));
            })
            .context("failed to spawn generation worker")?;
        Ok(())
    }

    fn set_model(&mut self, requested: &str) -> Result<()> {
        if requested.is_empty() {
            let current = self.studio.model().name.clone();
            for model in self.studio.available_models() {
                let marker = if model.name == current { '*' } else { ' ' };
                writeln!(
                    self.out,
                    "{marker} {} ({}, {})",
                    model.name, model.label, model.provider
                )?;
            }
            return Ok(());
        }
        let name = self.studio.set_model(Some(requested))?.name.clone();
        writeln!(self.out, "Image model: {name}")?;
        if let Some(reason) = self.studio.last_fallback_reason() {
            writeln!(self.out, "{reason}")?;
        }
        Ok(())
    }

    fn render_status(&mut self) -> Result<()> {
        let generation = self.studio.generation().label();
        let key = if self.studio.has_credential() {
            "available"
        } else {
            "missing"
        };
        writeln!(
            self.out,
            "Selection: {}",
            describe_selection(self.studio.selection())
        )?;
        writeln!(self.out, "State: {generation}")?;
        writeln!(
            self.out,
            "Model: {} ({})",
            self.studio.model().name,
            self.studio.model().provider
        )?;
        writeln!(self.out, "History: {} image(s)", self.studio.history().len())?;
        writeln!(self.out, "API key: {key}")?;
        writeln!(self.out, "Events: {}", self.studio.events_path().display())?;
        Ok(())
    }

    /// Studio-level refusals are shown to the user; anything else is fatal.
    fn report(&mut self, err: anyhow::Error) -> Result<()> {
        match err.downcast_ref::<StudioError>() {
            Some(studio_err) => {
                writeln!(self.out, "{studio_err}")?;
                Ok(())
            }
            None => Err(err),
        }
    }
}

fn command_arg(intent: &Intent, key: &str) -> String {
    intent
        .command_args
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn axis_command(axis: SelectionAxis) -> &'static str {
    match axis {
        SelectionAxis::Archetype => "type",
        SelectionAxis::Style => "style",
        SelectionAxis::Gender => "gender",
        SelectionAxis::Size => "size",
    }
}

fn axis_title(axis: SelectionAxis) -> &'static str {
    match axis {
        SelectionAxis::Archetype => "Type",
        SelectionAxis::Style => "Style",
        SelectionAxis::Gender => "Gender",
        SelectionAxis::Size => "Resolution",
    }
}

fn describe_axis(selection: &GenerationRequest, axis: SelectionAxis) -> String {
    match axis {
        SelectionAxis::Archetype => format!(
            "{} {}",
            selection.archetype.code, selection.archetype.name
        ),
        SelectionAxis::Style => selection.style.name.to_string(),
        SelectionAxis::Gender => selection.gender.label().to_string(),
        SelectionAxis::Size => selection.size.label().to_string(),
    }
}

fn describe_selection(selection: &GenerationRequest) -> String {
    format!(
        "{} {} | {} | {} | {}",
        selection.archetype.code,
        selection.archetype.name,
        selection.style.name,
        selection.gender.label(),
        selection.size.label()
    )
}

fn describe_generation(state: &GenerationState) -> String {
    match state {
        GenerationState::Idle => "No image yet. Type /generate to create one.".to_string(),
        GenerationState::Loading { request } => {
            format!("Generating {}...", describe_selection(request))
        }
        GenerationState::Success { payload } => format!(
            "Image ready ({} bytes): {}\nType /download to save it.",
            payload.len(),
            preview_data_uri(payload, DATA_URI_PREVIEW_CHARS)
        ),
        GenerationState::Failed { message } => format!("{message}\nType /dismiss to clear."),
    }
}

fn preview_data_uri(payload: &ImagePayload, max_chars: usize) -> String {
    let total = payload.data_uri_len();
    let head = payload.data_uri_prefix(max_chars);
    if total <= max_chars {
        return head;
    }
    format!("{head}... ({total} chars)")
}

fn render_history(history: &History) -> String {
    if history.is_empty() {
        return "History is empty.\n".to_string();
    }
    let mut out = String::new();
    for (idx, entry) in history.iter().enumerate() {
        out.push_str(&format!(
            "{:>2}. {}  [{}] {}\n",
            idx + 1,
            describe_selection(&entry.request),
            entry.id,
            entry.created_at.format("%H:%M:%S")
        ));
    }
    out
}

fn render_info(selection: &GenerationRequest) -> String {
    let archetype = selection.archetype;
    format!(
        "{} {} ({})\n{}\nTraits: {}\nPalette: {} ({})\nStyle: {} - {}\n",
        archetype.code,
        archetype.name,
        archetype.group,
        archetype.description,
        archetype.keywords.join(", "),
        archetype.color,
        archetype.gradient,
        selection.style.name,
        selection.style.prompt_modifier
    )
}

fn render_types(current: Option<&Archetype>) -> String {
    let mut out = String::new();
    for group in ArchetypeGroup::ALL {
        out.push_str(&format!("{group}\n"));
        for archetype in archetypes_in_group(group) {
            let marker = if current.map(|item| item.code) == Some(archetype.code) {
                '*'
            } else {
                ' '
            };
            out.push_str(&format!(
                " {marker} {}  {:<12} {}\n",
                archetype.code,
                archetype.name,
                archetype.keywords.join(", ")
            ));
        }
    }
    out
}

fn render_styles(current: Option<&ArtStyle>) -> String {
    let mut out = String::from("Art styles\n");
    for style in ART_STYLES.iter() {
        let marker = if current.map(|item| item.id) == Some(style.id) {
            '*'
        } else {
            ' '
        };
        out.push_str(&format!(" {marker} {:<11} {}\n", style.id, style.name));
    }
    out
}

fn catalog_json() -> Value {
    let archetypes: Vec<Value> = ARCHETYPES
        .iter()
        .map(|archetype| {
            json!({
                "code": archetype.code,
                "name": archetype.name,
                "group": archetype.group.label(),
                "description": archetype.description,
                "keywords": archetype.keywords,
                "color": archetype.color,
                "gradient": archetype.gradient,
            })
        })
        .collect();
    let styles: Vec<Value> = ART_STYLES
        .iter()
        .map(|style| {
            json!({
                "id": style.id,
                "name": style.name,
                "prompt_modifier": style.prompt_modifier,
            })
        })
        .collect();
    json!({ "archetypes": archetypes, "styles": styles })
}
