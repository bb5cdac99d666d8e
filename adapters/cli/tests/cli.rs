use std::process::{Command, Output};

fn freeserf(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_freeserf"))
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to invoke the freeserf binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn path_prints_a_road_on_generated_terrain() {
    let output = freeserf(&["path", "--from", "2,2", "--to", "9,5", "--size", "2", "--seed", "4"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let text = stdout(&output);
    assert!(
        text.starts_with("road from") || text.starts_with("no road"),
        "unexpected output: {text}"
    );
    if text.starts_with("road from") {
        assert!(text.contains("total cost"));
    }
}

#[test]
fn tiles_outside_the_map_are_refused() {
    let output = freeserf(&["path", "--from", "0,0", "--to", "500,1", "--size", "1"]);
    assert!(!output.status.success());
}

#[test]
fn saved_games_can_be_inspected_and_synced() {
    let folder = tempfile::tempdir().expect("temp dir");
    let saves = folder.path().to_str().expect("utf-8 temp path");

    let created = freeserf(&["--save-folder", saves, "new-game", "--name", "duel", "--players", "2"]);
    assert!(created.status.success(), "stderr: {}", String::from_utf8_lossy(&created.stderr));

    let listed = freeserf(&["--save-folder", saves, "list"]);
    assert_eq!(stdout(&listed).trim(), "duel");

    let inspected = freeserf(&["--save-folder", saves, "inspect", "duel"]);
    assert!(inspected.status.success());
    let text = stdout(&inspected);
    assert!(text.contains("players:     2"), "{text}");
    assert!(text.contains("buildings:   2"), "{text}");
    assert!(text.contains("serfs:       6"), "{text}");

    let synced = freeserf(&["--save-folder", saves, "sync", "duel", "--ticks", "3"]);
    assert!(synced.status.success(), "stderr: {}", String::from_utf8_lossy(&synced.stderr));
    let lines: Vec<String> = stdout(&synced).lines().map(str::to_owned).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("freeserf:v1:full:"));
    assert!(lines[1].starts_with("freeserf:v1:delta:"));
    assert!(lines[1].len() < lines[0].len());
}

#[test]
fn missing_saves_fail_cleanly() {
    let folder = tempfile::tempdir().expect("temp dir");
    let saves = folder.path().to_str().expect("utf-8 temp path");
    let output = freeserf(&["--save-folder", saves, "inspect", "ghost"]);
    assert!(!output.status.success());
}
