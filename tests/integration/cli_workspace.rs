use dbafs::tooling::cli::{CliContext, Commands};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CONFIG: &str = r#"
[sync]
use_last_modified = false

[storage]
store_path = "state/db"

[[mounts]]
root = "site"
database_path_prefix = "site"

[[mounts]]
prefix = "assets"
root = "assets"
database_path_prefix = "assets"
"#;

fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("dbafs.toml"), CONFIG).unwrap();
    write(temp.path(), "site/index.html", "<html/>");
    write(temp.path(), "assets/logo.png", "png");
    temp
}

fn write(root: &Path, path: &str, content: &str) {
    let target = root.join(path);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(target, content).unwrap();
}

fn sync() -> Commands {
    Commands::Sync {
        paths: vec![],
        format: "text".to_string(),
    }
}

fn diff() -> Commands {
    Commands::Diff {
        paths: vec![],
        format: "text".to_string(),
    }
}

#[test]
fn mounts_share_a_table_under_separate_prefixes() {
    let temp = workspace();
    let context = CliContext::new(temp.path().to_path_buf(), None).unwrap();
    assert_eq!(context.manager().prefixes(), vec!["assets", ""]);

    let output = context.execute(&sync()).unwrap();
    assert!(output.contains("index.html"));
    assert!(output.contains("logo.png"));

    let listing = context
        .execute(&Commands::Ls {
            path: String::new(),
            deep: true,
            format: "json".to_string(),
        })
        .unwrap();
    let records: serde_json::Value = serde_json::from_str(&listing).unwrap();
    let paths: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["assets/logo.png", "index.html"]);
}

#[test]
fn state_persists_between_invocations() {
    let temp = workspace();
    {
        let context = CliContext::new(temp.path().to_path_buf(), None).unwrap();
        context.execute(&sync()).unwrap();
    }

    let context = CliContext::new(temp.path().to_path_buf(), None).unwrap();
    assert_eq!(context.execute(&diff()).unwrap(), "Already in sync.");

    write(temp.path(), "assets/logo.png", "new png");
    let pending = context.execute(&diff()).unwrap();
    assert!(pending.contains("logo.png"));
    assert!(!pending.contains("index.html"));
}

#[test]
fn scoped_sync_through_cli() {
    let temp = workspace();
    let context = CliContext::new(temp.path().to_path_buf(), None).unwrap();
    context
        .execute(&Commands::Sync {
            paths: vec!["assets".to_string()],
            format: "text".to_string(),
        })
        .unwrap();

    let shown = context
        .execute(&Commands::Show {
            path: "index.html".to_string(),
            format: "text".to_string(),
        })
        .unwrap();
    assert_eq!(shown, "No record for \"index.html\"");
}
