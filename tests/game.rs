use tag_runners::core::world::{ActionIntent, Game, Snapshot};
use tag_runners::data::config::GameConfig;
use tag_runners::data::maps::{default_map, grid_settings_for_map};
use tag_runners::pathfinding::grid::{GridSettings, ResolutionMode};
use tag_runners::pathfinding::terrain::FlatSurface;

fn flat_config(runners: u32) -> GameConfig {
    let mut config = GameConfig::default();
    config.grid = GridSettings {
        resolution_mode: ResolutionMode::ByNodeCount,
        grid_size_x: 10,
        grid_size_y: 10,
        node_radius: 50.0,
        ..GridSettings::default()
    };
    config.navigation.worker_threads = 0;
    config.navigation.runners_always_active = runners;
    config.spawn.enabled = false;
    config
}

fn flat_game(config: GameConfig) -> Game {
    Game::new(config, &FlatSurface { z: 0.0 }).unwrap()
}

fn run(game: &mut Game, ticks: usize, dt: f32) -> Snapshot {
    let mut last = game.snapshot();
    for _ in 0..ticks {
        last = game.tick(dt, Vec::new());
    }
    last
}

#[test]
fn runners_spawn_and_start_following_paths() {
    let mut game = flat_game(flat_config(3));
    assert_eq!(game.snapshot().runners.len(), 0);

    let first = game.tick(0.1, Vec::new());
    assert_eq!(first.runners.len(), 3);
    assert!(first.events.iter().any(|e| e.contains("joined the chase")));

    let later = run(&mut game, 4, 0.1);
    assert_eq!(later.runners.len(), 3);
    assert!(later.runners.iter().any(|runner| runner.following));
    assert_eq!(game.navigation().agents_in_use(), 3);
}

#[test]
fn countdown_ends_the_round() {
    let mut config = flat_config(0);
    config.tag.round_seconds = 2.0;
    let mut game = flat_game(config);

    let snapshot = game.tick(1.0, Vec::new());
    assert!(!snapshot.game_over);
    assert_eq!(snapshot.time_remaining, 1.0);

    let snapshot = game.tick(1.0, Vec::new());
    assert!(snapshot.game_over);
    assert!(game.is_over());
    assert_eq!(game.tag_state().run_time, 2.0);
    assert!(snapshot.events.iter().any(|e| e.contains("time's up")));

    let after = game.tick(1.0, Vec::new());
    assert_eq!(after.time_remaining, snapshot.time_remaining);
}

#[test]
fn catching_a_runner_adds_time_and_replaces_it() {
    let mut config = flat_config(1);
    config.tag.catch_grace_seconds = 0.0;
    let mut game = flat_game(config);
    let snapshot = run(&mut game, 2, 0.1);
    let caught_before = snapshot.runners_caught;
    let runner = snapshot.runners[0].clone();

    let snapshot = game.tick(
        0.01,
        vec![ActionIntent::TeleportPlayer {
            x: runner.position.x,
            y: runner.position.y,
        }],
    );

    assert!(snapshot.runners_caught > caught_before);
    assert!(snapshot.time_remaining > 60.0);
    let caught = format!("runner {} was caught", runner.id);
    assert!(snapshot.events.iter().any(|e| e.contains(&caught)));
    assert_eq!(snapshot.runners.len(), 1);
    assert_ne!(snapshot.runners[0].id, runner.id);
}

#[test]
fn grace_period_protects_runners_early_in_the_round() {
    let mut config = flat_config(1);
    config.tag.catch_grace_seconds = 30.0;
    let mut game = flat_game(config);
    let snapshot = game.tick(0.1, Vec::new());
    let runner = snapshot.runners[0].clone();

    let snapshot = game.tick(
        0.01,
        vec![ActionIntent::TeleportPlayer {
            x: runner.position.x,
            y: runner.position.y,
        }],
    );
    assert_eq!(snapshot.runners_caught, 0);
    assert_eq!(snapshot.runners[0].id, runner.id);
}

#[test]
fn replacement_runner_can_be_caught_right_away() {
    let mut game = flat_game(flat_config(1));
    let snapshot = run(&mut game, 12, 0.1);
    assert!(game.time().elapsed >= 1.0);
    let first = snapshot.runners[0].clone();

    let snapshot = game.tick(
        0.01,
        vec![ActionIntent::TeleportPlayer {
            x: first.position.x,
            y: first.position.y,
        }],
    );
    assert_eq!(snapshot.runners_caught, 1);
    let replacement = snapshot.runners[0].clone();
    assert_ne!(replacement.id, first.id);

    let snapshot = game.tick(
        0.01,
        vec![ActionIntent::TeleportPlayer {
            x: replacement.position.x,
            y: replacement.position.y,
        }],
    );
    assert_eq!(snapshot.runners_caught, 2);
    let caught = format!("runner {} was caught", replacement.id);
    assert!(snapshot.events.iter().any(|e| e.contains(&caught)));
    assert!(snapshot.runners.iter().all(|runner| runner.id != replacement.id));
}

fn pickup_config() -> GameConfig {
    let mut config = flat_config(0);
    config.spawn.enabled = true;
    config.spawn.interval_seconds = 5.0;
    config.spawn.max_concurrent = 1;
    config.spawn.bonus_seconds = 5.0;
    config
}

#[test]
fn walking_onto_a_pickup_adds_its_bonus() {
    let mut game = flat_game(pickup_config());
    let snapshot = game.tick(5.0, Vec::new());
    assert_eq!(snapshot.pickups, 1);
    assert_eq!(snapshot.time_remaining, 55.0);
    let pickup = game.save_state().pickups[0].clone();

    let snapshot = game.tick(
        0.01,
        vec![ActionIntent::TeleportPlayer {
            x: pickup.position.x,
            y: pickup.position.y,
        }],
    );
    assert_eq!(snapshot.pickups, 0);
    assert_eq!(snapshot.time_remaining, 60.0);
    let collected = format!("pickup {} collected (+5s)", pickup.uid);
    assert!(snapshot.events.iter().any(|e| e.contains(&collected)));
}

#[test]
fn loading_a_live_save_restarts_pickup_spawning() {
    let mut config = pickup_config();
    config.spawn.interval_seconds = 0.5;
    config.spawn.max_concurrent = 5;
    config.tag.round_seconds = 3.0;
    let mut game = flat_game(config);
    let live = game.save_state();

    run(&mut game, 3, 1.0);
    assert!(game.is_over());

    game.load_state(live);
    assert!(!game.is_over());
    let snapshot = game.tick(1.0, Vec::new());
    assert_eq!(snapshot.pickups, 1);
    assert!(!snapshot.game_over);
}

#[test]
fn player_cannot_walk_into_walls() {
    let map = default_map().unwrap();
    let mut config = GameConfig::default();
    config.grid = grid_settings_for_map(&map, &config.grid);
    config.navigation.worker_threads = 0;
    config.navigation.runners_always_active = 0;
    let mut game = Game::new(config, &map).unwrap();
    let start = game.snapshot().player_pos;

    let moved = game.tick(0.1, vec![ActionIntent::MovePlayer { dx: 50.0, dy: 0.0 }]);
    assert_eq!(moved.player_pos.x, start.x + 50.0);

    let grid = game.grid();
    let wall = grid
        .all_nodes()
        .iter()
        .find(|node| !node.walkable)
        .map(|node| node.world_position)
        .unwrap();
    let blocked = game.tick(
        0.1,
        vec![ActionIntent::TeleportPlayer {
            x: wall.x,
            y: wall.y,
        }],
    );
    assert_eq!(blocked.player_pos, moved.player_pos);
}

#[test]
fn tagger_changes_are_logged_once() {
    let mut game = flat_game(flat_config(0));
    let id = game.get_player_id();
    game.tick(0.1, vec![ActionIntent::SetTagger { entity_id: Some(id) }]);
    let snapshot = game.tick(0.1, vec![ActionIntent::SetTagger { entity_id: Some(id) }]);
    assert!(game.tag_state().is_tagger(id));
    let changes = snapshot
        .events
        .iter()
        .filter(|e| e.contains("is now the tagger"))
        .count();
    assert_eq!(changes, 1);
}

#[test]
fn save_and_load_restore_the_round() {
    let mut game = flat_game(flat_config(2));
    run(&mut game, 5, 0.2);
    let saved = game.save_state();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("save.json");
    game.save_to_path(&path).unwrap();

    let mut restored = flat_game(flat_config(2));
    restored.load_from_path(&path).unwrap();
    let state = restored.save_state();
    assert_eq!(state.runners, saved.runners);
    assert_eq!(state.tag, saved.tag);
    assert_eq!(state.player, saved.player);
    assert_eq!(state.time.tick, saved.time.tick);
    assert_eq!(restored.navigation().agents_in_use(), 2);

    let snapshot = restored.tick(0.2, Vec::new());
    assert_eq!(snapshot.runners.len(), 2);

    assert!(restored.load_from_path(dir.path().join("missing.json")).is_err());
}

#[test]
fn plaza_round_keeps_runner_population_with_worker_threads() {
    let map = default_map().unwrap();
    let mut config = GameConfig::default();
    config.grid = grid_settings_for_map(&map, &config.grid);
    config.navigation.worker_threads = 2;
    config.navigation.runners_always_active = 8;
    let mut game = Game::new(config, &map).unwrap();

    for _ in 0..100 {
        let snapshot = game.tick(0.1, Vec::new());
        assert_eq!(snapshot.runners.len(), 8);
    }
    let overlay = game.debug_overlay();
    assert_eq!(overlay.runners.len(), 8);
    assert!(game.render_grid().contains('P'));
}
