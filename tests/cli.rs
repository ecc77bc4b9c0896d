//! Command-line scenarios run against an isolated `NEW_ICON_HOME`.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    /// A root with the sidecar icon store and an optional cargo override.
    fn new(cargo: Option<&str>) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("home");
        fs::create_dir_all(&root).unwrap();
        let mut config = String::from("icon-store = \"sidecar\"\n");
        if let Some(cargo) = cargo {
            config.push_str(&format!("cargo = \"{cargo}\"\n"));
        }
        fs::write(root.join("config.toml"), config).unwrap();
        fs::create_dir_all(dir.path().join("Projects")).unwrap();
        Self { dir }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    fn target(&self) -> PathBuf {
        self.dir.path().join("Projects")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("new-icon").unwrap();
        cmd.current_dir(self.dir.path())
            .env("NEW_ICON_HOME", self.root())
            .env_remove("RUST_LOG");
        cmd
    }

    fn entries(&self, sub: &str) -> usize {
        count_entries(&self.root().join(sub))
    }
}

fn count_entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn text_sets_icon_and_reset_clears_it() {
    let sandbox = Sandbox::new(None);

    sandbox
        .cmd()
        .arg("text")
        .arg(sandbox.target())
        .arg("WIP")
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated the icon"));
    assert_eq!(sandbox.entries("icons"), 1);
    assert_eq!(sandbox.entries("temp"), 0);

    sandbox
        .cmd()
        .arg("reset")
        .arg(sandbox.target())
        .assert()
        .success();
    assert_eq!(sandbox.entries("icons"), 0);
}

#[test]
fn text_with_output_writes_file_only() {
    let sandbox = Sandbox::new(None);
    let out = sandbox.dir.path().join("preview.png");

    sandbox
        .cmd()
        .arg("text")
        .arg(sandbox.target())
        .arg("v2")
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let image = image::open(&out).unwrap();
    assert_eq!((image.width(), image.height()), (1024, 1024));
    assert_eq!(sandbox.entries("icons"), 0);
}

#[test]
fn text_over_provided_image() {
    let sandbox = Sandbox::new(None);
    let base = sandbox.dir.path().join("base.png");
    image::RgbaImage::from_pixel(32, 32, image::Rgba([20, 120, 220, 255]))
        .save(&base)
        .unwrap();
    let out = sandbox.dir.path().join("out.jpg");

    sandbox
        .cmd()
        .args(["text", "Projects", "Draft", "--image", "base.png", "--output", "out.jpg"])
        .assert()
        .success();
    assert!(out.exists());
}

#[test]
fn missing_target_fails() {
    let sandbox = Sandbox::new(None);
    sandbox
        .cmd()
        .args(["text", "Nowhere", "WIP"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no such file or directory"));
}

#[test]
fn template_init_refuses_to_overwrite() {
    let sandbox = Sandbox::new(None);

    sandbox
        .cmd()
        .args(["template", "init"])
        .assert()
        .success();
    let written = fs::read_to_string(sandbox.dir.path().join("template.rs")).unwrap();
    assert!(written.contains("export_templates!"));

    sandbox
        .cmd()
        .args(["template", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn failed_build_keeps_icon_and_cache_clean() {
    let sandbox = Sandbox::new(Some("false"));
    sandbox
        .cmd()
        .args(["text", "Projects", "mine"])
        .assert()
        .success();
    let icon = fs::read_dir(sandbox.root().join("icons"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    let before = fs::read(&icon).unwrap();

    sandbox.cmd().args(["template", "init"]).assert().success();
    sandbox
        .cmd()
        .args(["template", "icon", "template.rs", "Projects", "WIP"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed"));

    assert_eq!(fs::read(&icon).unwrap(), before);
    assert_eq!(sandbox.entries("cache"), 0);
    assert_eq!(sandbox.entries("temp"), 0);
}

#[test]
fn plugin_commands_without_plugins() {
    let sandbox = Sandbox::new(None);

    sandbox
        .cmd()
        .args(["plugin", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No plugins installed"));

    sandbox
        .cmd()
        .args(["plugin", "uninstall", "NewHue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn unknown_template_is_reported() {
    let sandbox = Sandbox::new(None);
    sandbox
        .cmd()
        .args(["template", "icon", "NoSuchPlugin", "Projects"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NoSuchPlugin"));
}

#[test]
fn cache_clear_succeeds_on_empty_root() {
    let sandbox = Sandbox::new(None);
    sandbox
        .cmd()
        .args(["template", "cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared"));
}

#[test]
fn invalid_config_is_reported() {
    let sandbox = Sandbox::new(None);
    fs::write(sandbox.root().join("config.toml"), "icon-store = 3\n").unwrap();
    sandbox
        .cmd()
        .args(["reset", "Projects"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

/// Builds the sample template with the real toolchain. Needs network access
/// for the support crate's dependencies.
#[test]
#[ignore]
fn sample_template_builds_loads_and_renders() {
    let sandbox = Sandbox::new(None);
    sandbox.cmd().args(["template", "init"]).assert().success();
    let out = sandbox.dir.path().join("label.png");

    sandbox
        .cmd()
        .args(["template", "icon", "template.rs", "Projects", "WIP", "-o"])
        .arg(&out)
        .assert()
        .success();
    assert!(out.exists());
    assert_eq!(sandbox.entries("cache"), 1);

    // Image templates render through `text --template`.
    sandbox
        .cmd()
        .args(["text", "Projects", "WIP", "-t", "template.rs", "-o", "caption.png"])
        .assert()
        .success();

    sandbox
        .cmd()
        .args(["plugin", "install", "template.rs", "--name", "Label"])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["template", "icon", "Label", "Projects", "WIP"])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["plugin", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Label"));
    sandbox
        .cmd()
        .args(["plugin", "uninstall", "Label"])
        .assert()
        .success();
    assert!(!sandbox.root().join("plugins/Label").exists());
}
