use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dashboard::config::DashboardConfig;
use dashboard::consts::SCREENS_KEY;
use dashboard::engine::{Action, Dashboard};
use dashboard::error::{DashboardError, StoreError};
use dashboard::geom::Point;
use dashboard::registry;
use dashboard::store::{FileStore, Store};
use dashboard::surface::HitPart;
use dashboard::widget::{Answers, LiveWidget};
use serde_json::Value;
use tracing::info;


/// Grab point inside a widget header, relative to its top-left corner.
const HEADER_GRAB: Point = Point { x: 1.0, y: 1.0 };

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error("screen `{0}` is empty or already exists")]
    ScreenRejected(String),
    #[error("no widget at index {0}")]
    NoSuchIndex(usize),
    #[error("widget {0} has no free header to grab")]
    NotDraggable(usize),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("output failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "dashctl", about = "Inspect and edit a widget dashboard store")]
struct Cli {
    #[arg(long, env = "DASHBOARD_STORE", default_value = "dashboard.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List screens; the active one is marked with `*`.
    Screens,
    Screen(ScreenCommand),
    Widget(WidgetCommand),
    /// Print the persisted screens mapping.
    Dump,
}

#[derive(Args, Debug)]
struct ScreenCommand {
    #[command(subcommand)]
    command: ScreenSubcommand,
}

#[derive(Subcommand, Debug)]
enum ScreenSubcommand {
    Create { name: String },
    Switch { name: String },
}

#[derive(Args, Debug)]
struct WidgetCommand {
    #[command(subcommand)]
    command: WidgetSubcommand,
}

#[derive(Subcommand, Debug)]
enum WidgetSubcommand {
    /// List registered widget types.
    Types,
    /// List widgets on the active screen, bottom to top.
    List,
    Add {
        kind: String,
        #[arg(long = "param", value_parser = parse_param, help = "Initial parameter as key=value")]
        params: Vec<(String, String)>,
    },
    Remove {
        index: usize,
    },
    /// Run the widget's header edit control.
    Edit {
        index: usize,
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Drag a widget by its header so its top-left lands at (x, y).
    Move {
        index: usize,
        #[arg(long, allow_negative_numbers = true)]
        x: f64,
        #[arg(long, allow_negative_numbers = true)]
        y: f64,
    },
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let store = FileStore::open(cli.store)?;
    info!(path = %store.path().display(), "opened store");
    let mut dashboard = Dashboard::initialize(store, DashboardConfig::from_env());
    run(&mut dashboard, cli.command, &mut io::stdout().lock())
}

fn run<S: Store>(dashboard: &mut Dashboard<S>, command: Command, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        Command::Screens => {
            for tab in dashboard.tabs() {
                let marker = if tab.active { '*' } else { ' ' };
                writeln!(out, "{marker} {}", tab.name)?;
            }
            Ok(())
        }
        Command::Screen(screen) => run_screen(dashboard, screen),
        Command::Widget(widget) => run_widget(dashboard, widget, out),
        Command::Dump => {
            let raw = dashboard.store().load(SCREENS_KEY).unwrap_or_default();
            let json = serde_json::from_str::<Value>(&raw)?;
            print_json(out, &json)
        }
    }
}

fn run_screen<S: Store>(dashboard: &mut Dashboard<S>, screen: ScreenCommand) -> Result<(), CliError> {
    match screen.command {
        ScreenSubcommand::Create { name } => {
            if dashboard.create_screen(&name) {
                Ok(())
            } else {
                Err(CliError::ScreenRejected(name))
            }
        }
        ScreenSubcommand::Switch { name } => Ok(dashboard.switch_screen(&name)?),
    }
}

fn run_widget<S: Store>(
    dashboard: &mut Dashboard<S>,
    widget: WidgetCommand,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match widget.command {
        WidgetSubcommand::Types => {
            for variant in registry::variants() {
                writeln!(out, "{:<16} {}", variant.name(), variant.label())?;
            }
            Ok(())
        }
        WidgetSubcommand::List => {
            for (index, widget) in dashboard.widgets().iter().enumerate() {
                writeln!(out, "{index:>3} {}", describe(widget))?;
            }
            Ok(())
        }
        WidgetSubcommand::Add { kind, params } => {
            let mut answers = answers(params);
            dashboard.add_widget(&kind, &mut answers)?;
            let index = dashboard.widgets().len().saturating_sub(1);
            writeln!(out, "{index}")?;
            Ok(())
        }
        WidgetSubcommand::Remove { index } => {
            let id = widget_at(dashboard, index)?.id;
            Ok(dashboard.remove_widget(&id)?)
        }
        WidgetSubcommand::Edit { index, params } => {
            let id = widget_at(dashboard, index)?.id;
            let changed = dashboard.edit_widget(&id, &mut answers(params))?;
            writeln!(out, "{}", if changed { "changed" } else { "unchanged" })?;
            Ok(())
        }
        WidgetSubcommand::Move { index, x, y } => drag_to(dashboard, index, Point::new(x, y)),
    }
}

/// Replay a header drag: press inside the header, move once, release.
fn drag_to<S: Store>(dashboard: &mut Dashboard<S>, index: usize, target: Point) -> Result<(), CliError> {
    let widget = widget_at(dashboard, index)?;
    let id = widget.id;
    let grab = widget.geometry.origin() + HEADER_GRAB;
    match dashboard.surface().hit_test(grab) {
        Some(hit) if hit.widget_id == id && hit.part == HitPart::Header => {}
        _ => return Err(CliError::NotDraggable(index)),
    }
    if dashboard.pointer_down(grab) != (Action::DragStarted { id }) {
        return Err(CliError::NotDraggable(index));
    }
    dashboard.pointer_move(target + HEADER_GRAB);
    dashboard.pointer_up();
    Ok(())
}

fn widget_at<S: Store>(dashboard: &Dashboard<S>, index: usize) -> Result<&LiveWidget, CliError> {
    dashboard.widgets().get(index).ok_or(CliError::NoSuchIndex(index))
}

fn describe(widget: &LiveWidget) -> String {
    let g = &widget.geometry;
    format!("{:<16} left={} top={} width={} height={}", widget.kind(), g.left, g.top, g.width, g.height)
}

fn answers(params: Vec<(String, String)>) -> Answers {
    Answers(params.into_iter().collect())
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

fn print_json(out: &mut impl Write, value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    writeln!(out, "{rendered}")?;
    Ok(())
}
