// Integration tests for the fetch pipeline
//
// Archives are served from a local wiremock server; nothing here touches the
// network. Tests that need a Go toolchain are #[ignore]d.


use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use test_helpers::{TestEnvironment, script, tar_gz, zip};
use tokio_util::sync::CancellationToken;
use toolpin::{Error, FetchState, Recipe, Registry};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLIFF_TEMPLATE: &str =
    "/v{{ .Version }}/git-cliff-{{ .Version }}-{{ .Arch }}-{{ .OS }}.tar.gz";

fn git_cliff(server: &MockServer) -> Recipe {
    Recipe::archive("git-cliff", &format!("{}{}", server.uri(), CLIFF_TEMPLATE))
        .with_os_map(&[("darwin", "apple-darwin"), ("linux", "unknown-linux-gnu")])
        .with_arch_map(&[("arm64", "aarch64"), ("amd64", "x86_64")])
        .with_test(["--version"])
}

fn registry(recipes: Vec<Recipe>) -> Registry {
    Registry::new(recipes).unwrap()
}

async fn serve_cliff(server: &MockServer, version: &str, exit_code: i32) {
    let entry = format!("git-cliff-{version}/git-cliff");
    let binary = script(exit_code);
    let body = tar_gz(&[(entry.as_str(), binary.as_str(), 0o755)]);
    Mock::given(method("GET"))
        .and(path(format!(
            "/v{version}/git-cliff-{version}-x86_64-unknown-linux-gnu.tar.gz"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_git_cliff_end_to_end() {
    let server = MockServer::start().await;
    serve_cliff(&server, "2.2.1", 0).await;

    let env = TestEnvironment::new();
    env.pin("git-cliff: github.com/orhun/git-cliff@2.2.1\n");
    let manager = env.manager(registry(vec![git_cliff(&server)]));

    let outcome = manager
        .fetch("git-cliff", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.name, "git-cliff");
    assert_eq!(outcome.version, "2.2.1");
    assert_eq!(outcome.state, FetchState::Installed);
    assert_eq!(outcome.path, env.bin.join("git-cliff"));

    let link = env.bin.join("git-cliff");
    assert!(link.symlink_metadata().unwrap().is_symlink());
    assert_eq!(
        fs::read_link(&link).unwrap(),
        PathBuf::from(".store/git-cliff_2.2.1/git-cliff")
    );
    assert_eq!(fs::read_to_string(&link).unwrap(), script(0));
}

#[tokio::test]
async fn test_double_fetch_installs_once() {
    let server = MockServer::start().await;
    // expect(1) is verified when the server drops
    serve_cliff(&server, "2.2.1", 0).await;

    let env = TestEnvironment::new();
    env.pin("git-cliff: github.com/orhun/git-cliff@2.2.1\n");
    let manager = env.manager(registry(vec![git_cliff(&server)]));
    let cancel = CancellationToken::new();

    let first = manager.fetch("git-cliff", &cancel).await.unwrap();
    let second = manager.fetch("git-cliff", &cancel).await.unwrap();

    assert_eq!(first.state, FetchState::Installed);
    assert_eq!(second.state, FetchState::AlreadyLinked);
    assert_eq!(first.path, second.path);
}

#[tokio::test]
async fn test_version_bump_keeps_old_versions() {
    let server = MockServer::start().await;
    serve_cliff(&server, "2.2.1", 0).await;
    serve_cliff(&server, "2.3.0", 0).await;

    let env = TestEnvironment::new();
    let manager = env.manager(registry(vec![git_cliff(&server)]));
    let cancel = CancellationToken::new();

    env.pin("git-cliff: github.com/orhun/git-cliff@2.2.1\n");
    manager.fetch("git-cliff", &cancel).await.unwrap();

    env.pin("git-cliff: github.com/orhun/git-cliff@2.3.0\n");
    let bumped = manager.fetch("git-cliff", &cancel).await.unwrap();
    assert_eq!(bumped.state, FetchState::Installed);
    assert_eq!(
        fs::read_link(env.bin.join("git-cliff")).unwrap(),
        PathBuf::from(".store/git-cliff_2.3.0/git-cliff")
    );
    assert!(env.store.join("git-cliff_2.2.1/git-cliff").exists());

    // Going back is a relink, not a download
    env.pin("git-cliff: github.com/orhun/git-cliff@2.2.1\n");
    let back = manager.fetch("git-cliff", &cancel).await.unwrap();
    assert_eq!(back.state, FetchState::Relinked);
    assert_eq!(
        fs::read_link(env.bin.join("git-cliff")).unwrap(),
        PathBuf::from(".store/git-cliff_2.2.1/git-cliff")
    );
}

#[tokio::test]
async fn test_smoke_test_failure_is_verification_error() {
    let server = MockServer::start().await;
    serve_cliff(&server, "2.2.1", 1).await;

    let env = TestEnvironment::new();
    env.pin("git-cliff: github.com/orhun/git-cliff@2.2.1\n");
    let manager = env.manager(registry(vec![git_cliff(&server)]));

    let err = manager
        .fetch("git-cliff", &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Verification { tool, .. } => assert_eq!(tool, "git-cliff@2.2.1"),
        other => panic!("unexpected error: {other}"),
    }
    // Installed and linked before the test ran
    assert!(env.store.join("git-cliff_2.2.1/git-cliff").exists());
}

#[tokio::test]
async fn test_download_failure_leaves_no_trace() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let env = TestEnvironment::new();
    env.pin("git-cliff: github.com/orhun/git-cliff@2.2.1\n");
    let manager = env.manager(registry(vec![git_cliff(&server)]));

    let err = manager
        .fetch("git-cliff", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_installation(), "unexpected error: {err}");
    assert!(err.to_string().contains("git-cliff@2.2.1"));
    assert!(!env.store.join("git-cliff_2.2.1").exists());
    assert!(env.bin.join("git-cliff").symlink_metadata().is_err());
}

#[tokio::test]
async fn test_rar_archive_rejected_as_unknown_format() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let env = TestEnvironment::new();
    env.pin("unrar: example.com/unrar@7.0\n");
    let recipe = Recipe::archive(
        "unrar",
        &format!("{}/unrar-{{{{ .Version }}}}.rar", server.uri()),
    );
    let manager = env.manager(registry(vec![recipe]));

    let err = manager
        .fetch("unrar", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_installation());
    assert!(
        err.to_string().contains("unknown archive format"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_zip_archive_with_bin_path() {
    let server = MockServer::start().await;
    let binary = script(0);
    Mock::given(method("GET"))
        .and(path("/jq-1.7.1-linux-amd64.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(zip(&[("jq-1.7.1/bin/jq", binary.as_str(), 0o755)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let env = TestEnvironment::new();
    env.pin("jq: github.com/jqlang/jq@1.7.1\n");
    let recipe = Recipe::archive(
        "jq",
        &format!(
            "{}/jq-{{{{ .Version }}}}-{{{{ .OS }}}}-{{{{ .Arch }}}}.zip",
            server.uri()
        ),
    )
    .with_bin_path("jq-1.7.1/bin/jq")
    .with_test(["--version"]);
    let manager = env.manager(registry(vec![recipe]));

    let outcome = manager.fetch("jq", &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.state, FetchState::Installed);
    assert_eq!(
        fs::read_link(env.bin.join("jq")).unwrap(),
        PathBuf::from(".store/jq_1.7.1/jq-1.7.1/bin/jq")
    );
}

#[tokio::test]
async fn test_tar_xz_archive() {
    let work = tempfile::TempDir::new().unwrap();
    let src = work.path().join("yq-4.44.1");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("yq"), script(0)).unwrap();
    fs::set_permissions(src.join("yq"), fs::Permissions::from_mode(0o755)).unwrap();

    let archive = work.path().join("yq.tar.xz");
    let created = std::process::Command::new("tar")
        .arg("-cJf")
        .arg(&archive)
        .arg("-C")
        .arg(work.path())
        .arg("yq-4.44.1")
        .status();
    if !created.is_ok_and(|s| s.success()) {
        eprintln!("skipping: tar with xz support is not available");
        return;
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/yq-4.44.1.tar.xz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(fs::read(&archive).unwrap()))
        .expect(1)
        .mount(&server)
        .await;

    let env = TestEnvironment::new();
    env.pin("yq: github.com/mikefarah/yq@4.44.1\n");
    let recipe = Recipe::archive(
        "yq",
        &format!("{}/yq-{{{{ .Version }}}}.tar.xz", server.uri()),
    )
    .with_test(["--version"]);
    let manager = env.manager(registry(vec![recipe]));

    let outcome = manager.fetch("yq", &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.state, FetchState::Installed);
    assert!(env.store.join("yq_4.44.1/yq").is_file());
}

#[tokio::test]
async fn test_cancelled_fetch_installs_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let env = TestEnvironment::new();
    env.pin("git-cliff: github.com/orhun/git-cliff@2.2.1\n");
    let manager = env.manager(registry(vec![git_cliff(&server)]));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = manager.fetch("git-cliff", &cancel).await.unwrap_err();

    assert!(err.is_cancelled(), "unexpected error: {err}");
    assert!(!env.store.join("git-cliff_2.2.1").exists());
}

#[tokio::test]
async fn test_unknown_tool_suggests_recipe() {
    let env = TestEnvironment::new();
    let manager = env.manager(Registry::builtin());

    let err = manager
        .fetch("gitcliff", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "unknown tool 'gitcliff' (did you mean 'git-cliff'?)"
    );
}

#[tokio::test]
#[ignore] // Requires a Go toolchain and network access
async fn test_toolchain_install_gotestsum() {
    let env = TestEnvironment::new();
    env.pin("gotestsum: gotest.tools/gotestsum@v1.11.0\n");
    let manager = env.manager(Registry::builtin());

    let outcome = manager
        .fetch("gotestsum", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.state, FetchState::Installed);
    assert!(env.store.join("gotestsum_v1.11.0").is_file());
}

#[tokio::test]
async fn test_cancel_during_toolchain_install_leaves_no_entry() {
    let env = TestEnvironment::new();
    env.pin("gotestsum: gotest.tools/gotestsum@v1.11.0\n");

    let slow_go = env.root.join("slow-go");
    fs::write(&slow_go, "#!/bin/sh\nexec sleep 30\n").unwrap();
    fs::set_permissions(&slow_go, fs::Permissions::from_mode(0o755)).unwrap();

    let config = toolpin::Config {
        toolchain: slow_go.to_string_lossy().into_owned(),
        ..env.config()
    };
    let manager = toolpin::ToolManager::new(config)
        .unwrap()
        .with_registry(registry(vec![Recipe::toolchain(
            "gotestsum",
            "gotest.tools/gotestsum",
        )]));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let start = std::time::Instant::now();
    let err = manager.fetch("gotestsum", &cancel).await.unwrap_err();

    assert!(err.is_cancelled(), "unexpected error: {err}");
    assert!(start.elapsed() < std::time::Duration::from_secs(10));
    assert!(!env.store.join("gotestsum_v1.11.0").exists());
    assert!(!env.store.join(".gotestsum_v1.11.0.partial").exists());
    assert!(env.bin.join("gotestsum").symlink_metadata().is_err());
}
