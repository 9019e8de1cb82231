mod common;

use common::{run_annotool, TestEnv};

#[test]
fn annotool_help_shows_usage() {
    let output = run_annotool(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        output.status.success(),
        "--help should succeed\nstdout:\n{}\nstderr:\n{}",
        stdout,
        stderr
    );
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("tracks"));
    assert!(stdout.contains("loops"));
}

#[test]
fn annotool_version_shows_version() {
    let output = run_annotool(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("annotool "));
}

#[test]
fn completions_bash_outputs_script() {
    let output = run_annotool(&["completions", "bash"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        output.status.success(),
        "completions bash should succeed\nstdout:\n{}\nstderr:\n{}",
        stdout,
        stderr
    );
    assert!(
        stdout.contains("annotool"),
        "expected completion output to reference command name\nstdout:\n{}",
        stdout
    );
    assert!(
        !stderr.contains("No config file found"),
        "completions should not load configuration\nstderr:\n{}",
        stderr
    );
}

#[test]
fn loops_prints_default_partition() {
    let output = run_annotool(&["loops", "--duration", "10"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr:\n{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("Loop length: 5s (2 loops)"), "stdout:\n{}", stdout);
    assert!(stdout.contains("00:05.0"));
    assert!(stdout.contains("00:10.0"));
}

#[test]
fn loops_rejects_length_longer_than_video() {
    let output = run_annotool(&["loops", "--duration", "10", "--length", "30"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(
        stderr.contains("must not exceed the video duration"),
        "stderr:\n{}",
        stderr
    );
}

#[test]
fn loops_respects_configured_defaults() {
    let env = TestEnv::new();
    env.write_config("[looping]\ndefault_loop_count = 4\nminimal_loop = 1.0\n");

    let output = env.run(&["loops", "--duration", "20"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr:\n{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("Loop length: 5s (4 loops)"), "stdout:\n{}", stdout);
}

#[test]
fn config_path_points_into_xdg_config_home() {
    let env = TestEnv::new();
    let path = env.config_path();

    assert!(path.ends_with("annotool/config.toml"), "{}", path.display());
}

#[test]
fn config_init_refuses_to_overwrite() {
    let env = TestEnv::new();

    let first = env.run(&["config", "init"]);
    assert!(first.status.success());
    assert!(env.config_path().exists());

    let second = env.run(&["config", "init"]);
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("--force"));

    let forced = env.run(&["config", "init", "--force"]);
    assert!(forced.status.success());
}

#[test]
fn config_show_prints_sections() {
    let output = run_annotool(&["config", "show"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("[backend]"));
    assert!(stdout.contains("profile = \"local\""));
    assert!(stdout.contains("[looping]"));
}

#[test]
fn tracks_on_empty_local_store() {
    let env = TestEnv::new();

    let output = env.run(&["tracks", "--video", "1"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr:\n{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("No tracks found"), "stdout:\n{}", stdout);
    assert!(env.data_dir().join("annotool.db").exists());
}

#[test]
fn annotations_on_empty_local_store() {
    let output = run_annotool(&["annotations", "--video", "1", "--track", "2"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr:\n{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("No annotations found"));
}
