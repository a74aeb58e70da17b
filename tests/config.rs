// tests/config.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use buildwatch::apps::AppName;
use buildwatch::cli::CliArgs;
use buildwatch::config::{
    BuildEnv, ConfigFile, Settings, check_root_dir_name, load_from_str, parse_duration,
};
use buildwatch::errors::BuildError;
use buildwatch::fs::mock::MockFileSystem;
use buildwatch::libraries::{Consumer, Library};
use buildwatch::tasks::Purpose;
use buildwatch::types::EmptyInputPolicy;
use buildwatch_test_utils::builders::ConfigFileBuilder;

fn config_error(result: Result<ConfigFile, BuildError>) -> String {
    match result {
        Err(BuildError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn empty_file_gives_defaults() {
    let config = load_from_str("").unwrap();
    assert_eq!(config.orchestrator.concurrency, 8);
    assert_eq!(config.orchestrator.debounce, Duration::from_secs(1));
    assert_eq!(config.orchestrator.empty_inputs, EmptyInputPolicy::UpToDate);
    assert_eq!(config.orchestrator.root_dir_name, "client");
    assert!(config.proxy.is_none());

    // Every library gets a rebuild; only rebuildable consumers do.
    assert!(Library::ALL.iter().all(|l| config.library_rebuild(*l).is_some()));
    assert!(config.consumer_rebuild(Consumer::Setup).is_some());
    assert!(config.consumer_rebuild(Consumer::Client).is_none());
}

#[test]
fn full_file_is_parsed() {
    let config = load_from_str(
        r#"
        [orchestrator]
        concurrency = 2
        debounce = "250ms"
        empty_inputs = "rebuild"
        root_dir_name = ""

        [tools]
        cssstyle = "true {file}"

        [libraries.assets]
        rebuild = "make -C ../webapp assets"

        [consumers.setup]
        rebuild = "make -C ../setup"

        [proxy]
        listen = "127.0.0.1:8080"
        upstream = "127.0.0.1:8081"
        "#,
    )
    .unwrap();

    assert_eq!(config.orchestrator.concurrency, 2);
    assert_eq!(config.orchestrator.debounce, Duration::from_millis(250));
    assert_eq!(config.orchestrator.empty_inputs, EmptyInputPolicy::Rebuild);
    assert_eq!(config.orchestrator.root_dir_name, "");
    assert_eq!(config.tools.cssstyle.to_string(), "true {file}");
    assert_eq!(
        config.library_rebuild(Library::Assets).unwrap().to_string(),
        "make -C ../webapp assets"
    );
    assert_eq!(
        config.consumer_rebuild(Consumer::Setup).unwrap().to_string(),
        "make -C ../setup"
    );
    assert_eq!(config.proxy.unwrap().upstream, "127.0.0.1:8081");
}

#[test]
fn zero_concurrency_is_rejected() {
    let msg = config_error(ConfigFile::try_from(ConfigFileBuilder::new().concurrency(0).raw()));
    assert!(msg.contains("concurrency"), "{msg}");
}

#[test]
fn debounce_must_parse_and_stay_bounded() {
    let msg = config_error(ConfigFile::try_from(ConfigFileBuilder::new().debounce("5 parsecs").raw()));
    assert!(msg.contains("debounce"), "{msg}");

    let msg = config_error(ConfigFile::try_from(ConfigFileBuilder::new().debounce("2m").raw()));
    assert!(msg.contains("at most"), "{msg}");
}

#[test]
fn durations_parse_with_units() {
    assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
    assert_eq!(parse_duration(" 3s ").unwrap(), Duration::from_secs(3));
    assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("ms").is_err());
    assert!(parse_duration("3h").is_err());
}

#[test]
fn huge_minute_counts_are_an_error_not_an_overflow() {
    let err = parse_duration("307445734561825861m").unwrap_err();
    assert!(err.contains("too large"), "{err}");

    let msg = config_error(ConfigFile::try_from(
        ConfigFileBuilder::new().debounce("307445734561825861m").raw(),
    ));
    assert!(msg.contains("debounce"), "{msg}");
}

#[test]
fn unknown_projects_are_rejected() {
    let msg = config_error(ConfigFile::try_from(
        ConfigFileBuilder::new().library_rebuild("left-pad", "true").raw(),
    ));
    assert!(msg.contains("left-pad"), "{msg}");

    let msg = config_error(ConfigFile::try_from(
        ConfigFileBuilder::new().consumer_rebuild("client", "true").raw(),
    ));
    assert!(msg.contains("no rebuild step"), "{msg}");
}

#[test]
fn bad_command_templates_name_their_section() {
    let msg = config_error(load_from_str("[tools]\nless = \"lessc {input}\"\n"));
    assert!(msg.starts_with("[tools].less"), "{msg}");

    let msg = config_error(ConfigFile::try_from(
        ConfigFileBuilder::new().library_rebuild("assets", "  ").raw(),
    ));
    assert!(msg.contains("[libraries.assets]"), "{msg}");
}

#[test]
fn proxy_addresses_must_differ() {
    let msg = config_error(ConfigFile::try_from(
        ConfigFileBuilder::new().proxy("127.0.0.1:9000", "127.0.0.1:9000").raw(),
    ));
    assert!(msg.contains("same address"), "{msg}");
}

#[test]
fn invalid_toml_is_a_toml_error() {
    assert!(matches!(load_from_str("[orchestrator"), Err(BuildError::TomlError(_))));
}

#[test]
fn environment_toggles_need_the_literal_true() {
    let env = BuildEnv::from_lookup(|key| match key {
        "BUILDWATCH_APP" => Some(" admin ".to_string()),
        "BUILDWATCH_MINIFY" => Some("true".to_string()),
        "BUILDWATCH_ANALYZE" => Some("1".to_string()),
        "BUILDWATCH_PROD_SOURCEMAP" => Some("TRUE".to_string()),
        "BUILDWATCH_PATH" => Some("   ".to_string()),
        _ => None,
    });
    assert_eq!(env.app.as_deref(), Some("admin"));
    assert!(env.minify);
    assert!(!env.analyze);
    assert!(!env.prod_sourcemap);
    assert!(env.path.is_none());
    assert!(env.library_path.is_none());
}

fn client_root() -> (MockFileSystem, CliArgs) {
    let fs = MockFileSystem::new();
    fs.add_dir("/repo/client");
    let args = CliArgs {
        root: Some("/repo/client".to_string()),
        ..CliArgs::default()
    };
    (fs, args)
}

#[test]
fn cli_values_win_over_the_environment() {
    let (fs, mut args) = client_root();
    args.app = Some("jetstream".to_string());
    args.only = Some("check_messages".to_string());
    args.analyze = true;
    let env = BuildEnv {
        app: Some("admin".to_string()),
        minify: true,
        library_path: Some(PathBuf::from("../dx-gui")),
        ..BuildEnv::default()
    };

    let settings = Settings::resolve(&args, &env, &fs).unwrap();
    assert_eq!(settings.app, AppName::Jetstream);
    assert_eq!(settings.only, Some(Purpose::CheckMessages));
    assert!(settings.flags.minify && settings.flags.analyze);
    assert!(!settings.flags.production_source_maps);
    assert_eq!(settings.library_path, Some(PathBuf::from("/repo/client/../dx-gui")));
    assert_eq!(settings.config_path, Path::new("/repo/client/Buildwatch.toml"));
}

#[test]
fn config_file_is_read_from_the_root() {
    let (fs, mut args) = client_root();
    fs.add_file("/repo/client/Buildwatch.toml", "[orchestrator]\nconcurrency = 3\n");
    args.app = Some("login".to_string());

    let settings = Settings::resolve(&args, &BuildEnv::default(), &fs).unwrap();
    assert_eq!(settings.config.orchestrator.concurrency, 3);
}

#[test]
fn missing_or_unknown_app_is_an_error() {
    let (fs, mut args) = client_root();
    let err = Settings::resolve(&args, &BuildEnv::default(), &fs).unwrap_err();
    assert!(err.to_string().contains("BUILDWATCH_APP"), "{err}");

    args.app = Some("intranet".to_string());
    assert!(Settings::resolve(&args, &BuildEnv::default(), &fs).is_err());
}

#[test]
fn proxy_flags_come_in_pairs() {
    let (fs, mut args) = client_root();
    args.app = Some("admin".to_string());
    args.proxy_listen = Some("127.0.0.1:8080".to_string());
    assert!(Settings::resolve(&args, &BuildEnv::default(), &fs).is_err());

    args.proxy_upstream = Some("127.0.0.1:8081".to_string());
    let settings = Settings::resolve(&args, &BuildEnv::default(), &fs).unwrap();
    assert_eq!(settings.proxy.unwrap().listen, "127.0.0.1:8080");
}

#[test]
fn root_directory_name_is_enforced() {
    let fs = MockFileSystem::new();
    assert!(check_root_dir_name(&fs, Path::new("/repo/client"), "client").is_ok());
    assert!(check_root_dir_name(&fs, Path::new("/repo/server"), "").is_ok());

    let err = check_root_dir_name(&fs, Path::new("/repo/server"), "client").unwrap_err();
    assert!(err.to_string().contains("'client'"), "{err}");

    let args = CliArgs {
        root: Some("/repo/server".to_string()),
        app: Some("admin".to_string()),
        ..CliArgs::default()
    };
    assert!(Settings::resolve(&args, &BuildEnv::default(), &fs).is_err());
}
