use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use nalgebra::Vector3;
use tracing::info;

use tag_runners::core::world::{ActionIntent, Game, Snapshot};
use tag_runners::data::config::{load_config, GameConfig};
use tag_runners::data::maps::{default_layout_text, default_map, grid_settings_for_map, load_terrain_map};
use tag_runners::logger;
use tag_runners::pathfinding::astar::Pathfinder;
use tag_runners::pathfinding::grid::NavGrid;
use tag_runners::pathfinding::terrain::TerrainMap;
use tag_runners::project::ProjectManifest;
use tag_runners::world::WorldDb;

const DEFAULT_DB_PATH: &str = "tag_runners.db";

#[derive(Parser, Debug)]
#[command(name = "tag-runners", version, about = "Grid navigation tag game, headless")]
struct Cli {
    #[arg(long, global = true, help = "Game config JSON (defaults are used when omitted)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Terrain map: text layout or .json")]
    map: Option<PathBuf>,
    #[arg(long, global = true, default_value = DEFAULT_DB_PATH, help = "SQLite file for layouts and session history")]
    db: PathBuf,
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "More log output (-v debug, -vv trace)")]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the simulation without input and print a summary.
    Run {
        #[arg(long, default_value_t = 30.0)]
        seconds: f32,
        #[arg(long, default_value_t = 0.1)]
        dt: f32,
        #[arg(long, default_value_t = false, help = "Store the result in the session history")]
        record: bool,
    },
    /// Interactive loop reading commands from stdin.
    Play {
        #[arg(long, default_value_t = 0.1)]
        dt: f32,
    },
    /// Print the waypoints between two world points.
    Path {
        #[arg(long, value_parser = parse_point)]
        from: (f32, f32),
        #[arg(long, value_parser = parse_point)]
        to: (f32, f32),
    },
    /// Render the navigation grid as text.
    Grid {
        #[arg(long, default_value_t = false)]
        edges: bool,
    },
    Layouts {
        #[command(subcommand)]
        command: LayoutCommands,
    },
    /// Show recent sessions and the best one.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print the project build declarations as JSON.
    Manifest,
}

#[derive(Subcommand, Debug)]
enum LayoutCommands {
    /// Store the current map and grid settings under a name.
    Save { name: String },
    List,
}

fn parse_point(raw: &str) -> Result<(f32, f32), String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got {}", raw))?;
    let x = x.trim().parse::<f32>().map_err(|err| format!("bad x in {}: {}", raw, err))?;
    let y = y.trim().parse::<f32>().map_err(|err| format!("bad y in {}: {}", raw, err))?;
    Ok((x, y))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose)?;

    match &cli.command {
        Commands::Run { seconds, dt, record } => cmd_run(&cli, *seconds, *dt, *record),
        Commands::Play { dt } => cmd_play(&cli, *dt),
        Commands::Path { from, to } => cmd_path(&cli, *from, *to),
        Commands::Grid { edges } => cmd_grid(&cli, *edges),
        Commands::Layouts { command } => match command {
            LayoutCommands::Save { name } => cmd_layout_save(&cli, name),
            LayoutCommands::List => cmd_layout_list(&cli),
        },
        Commands::History { limit } => cmd_history(&cli, *limit),
        Commands::Manifest => cmd_manifest(),
    }
}

fn load_setup(cli: &Cli) -> anyhow::Result<(GameConfig, TerrainMap)> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GameConfig::default(),
    };
    let map = match &cli.map {
        Some(path) => load_terrain_map(path)?,
        None => default_map().context("built-in map is invalid")?,
    };
    config.grid = grid_settings_for_map(&map, &config.grid);
    Ok((config, map))
}

fn open_db(cli: &Cli) -> anyhow::Result<WorldDb> {
    WorldDb::open(&cli.db).with_context(|| format!("failed to open {}", cli.db.display()))
}

fn cmd_run(cli: &Cli, seconds: f32, dt: f32, record: bool) -> anyhow::Result<()> {
    if !(dt > 0.0) {
        bail!("--dt must be positive");
    }
    let (config, map) = load_setup(cli)?;
    let mut game = Game::new(config, &map)?;
    let ticks = (seconds / dt).ceil() as u64;

    let mut last = None;
    for _ in 0..ticks {
        let snapshot = game.tick(dt, Vec::new());
        let over = snapshot.game_over;
        last = Some(snapshot);
        if over {
            break;
        }
    }
    if let Some(snapshot) = &last {
        print_summary(snapshot);
    }

    if record {
        let mut db = open_db(cli)?;
        let id = db.record_session(&game.session_result())?;
        println!("recorded session {}", id);
    }
    Ok(())
}

fn cmd_play(cli: &Cli, dt: f32) -> anyhow::Result<()> {
    let (config, map) = load_setup(cli)?;
    let mut game = Game::new(config, &map)?;
    println!("Commands: tick [n], move dx dy, grid, runners, save <path>, load <path>, quit");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => continue,
            ["quit"] | ["exit"] => break,
            ["tick"] => print_summary(&game.tick(dt, Vec::new())),
            ["tick", n] => match n.parse::<u32>() {
                Ok(n) => {
                    let mut snapshot = None;
                    for _ in 0..n.max(1) {
                        snapshot = Some(game.tick(dt, Vec::new()));
                    }
                    if let Some(snapshot) = snapshot {
                        print_summary(&snapshot);
                    }
                }
                Err(_) => println!("tick expects a number"),
            },
            ["move", dx, dy] => match (dx.parse::<f32>(), dy.parse::<f32>()) {
                (Ok(dx), Ok(dy)) => {
                    let snapshot = game.tick(dt, vec![ActionIntent::MovePlayer { dx, dy }]);
                    print_summary(&snapshot);
                }
                _ => println!("move expects two numbers"),
            },
            ["grid"] => print!("{}", game.render_grid()),
            ["runners"] => {
                for runner in &game.snapshot().runners {
                    println!(
                        "#{} at ({:.0}, {:.0}) following={} waypoints={}",
                        runner.id,
                        runner.position.x,
                        runner.position.y,
                        runner.following,
                        runner.waypoints
                    );
                }
            }
            ["save", path] => match game.save_to_path(path) {
                Ok(()) => println!("saved to {}", path),
                Err(err) => println!("save failed: {}", err),
            },
            ["load", path] => match game.load_from_path(path) {
                Ok(()) => println!("loaded {}", path),
                Err(err) => println!("load failed: {}", err),
            },
            _ => println!("unknown command: {}", line.trim()),
        }
    }
    info!("play session ended");
    Ok(())
}

fn cmd_path(cli: &Cli, from: (f32, f32), to: (f32, f32)) -> anyhow::Result<()> {
    let (config, map) = load_setup(cli)?;
    let grid = NavGrid::build(config.grid, &map);
    let start = Vector3::new(from.0, from.1, 0.0);
    let end = Vector3::new(to.0, to.1, 0.0);
    let cancel = AtomicBool::new(false);
    let waypoints = Pathfinder::new(&grid)
        .find_path(start, end, &cancel)
        .context("no path")?;
    for (index, point) in waypoints.iter().enumerate() {
        println!("{:>3}: {:.1}, {:.1}, {:.1}", index, point.x, point.y, point.z);
    }
    println!("{} waypoints", waypoints.len());
    Ok(())
}

fn cmd_grid(cli: &Cli, edges: bool) -> anyhow::Result<()> {
    let (mut config, map) = load_setup(cli)?;
    if edges {
        config.debug.show_any = true;
        config.debug.show_edges = true;
    }
    let game = Game::new(config, &map)?;
    print!("{}", game.render_grid());
    Ok(())
}

fn cmd_layout_save(cli: &Cli, name: &str) -> anyhow::Result<()> {
    let (config, _) = load_setup(cli)?;
    let layout = match &cli.map {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => default_layout_text().to_string(),
    };
    let mut db = open_db(cli)?;
    db.save_layout(name, &config.grid, &layout, 0)?;
    println!("saved layout {}", name);
    Ok(())
}

fn cmd_layout_list(cli: &Cli) -> anyhow::Result<()> {
    let db = open_db(cli)?;
    let names = db.list_layouts()?;
    if names.is_empty() {
        println!("no layouts stored");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_history(cli: &Cli, limit: usize) -> anyhow::Result<()> {
    let db = open_db(cli)?;
    let sessions = db.recent_sessions(limit)?;
    if sessions.is_empty() {
        println!("no sessions recorded");
        return Ok(());
    }
    for record in &sessions {
        println!(
            "#{} seed {} caught {} in {:.0}s",
            record.id, record.result.seed, record.result.runners_caught, record.result.run_time
        );
    }
    if let Some(best) = db.best_session()? {
        println!(
            "best: #{} with {} caught",
            best.id, best.result.runners_caught
        );
    }
    Ok(())
}

fn cmd_manifest() -> anyhow::Result<()> {
    let manifest = ProjectManifest::gamejam2026();
    manifest.validate()?;
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}

fn print_summary(snapshot: &Snapshot) {
    println!(
        "{} | remaining {:.0}s | caught {} | runners {} | pickups {}{}",
        snapshot.time_str,
        snapshot.time_remaining.max(0.0),
        snapshot.runners_caught,
        snapshot.runners.len(),
        snapshot.pickups,
        if snapshot.game_over { " | GAME OVER" } else { "" }
    );
    for event in &snapshot.events {
        println!("  {}", event);
    }
}
