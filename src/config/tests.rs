use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        public_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_are_usable_without_any_file() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), DEFAULT_PUBLIC_PORT);
    assert_eq!(settings.server.admin_addr.port(), DEFAULT_ADMIN_PORT);
    assert!(settings.database.url.is_none());
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.ttl, Duration::from_secs(20));
    assert_eq!(settings.cache.max_entries.get(), 1024);
    assert_eq!(settings.feed.page_size.get(), 10);
    assert_eq!(settings.identity.header.as_str(), "x-fernlog-user");
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn cache_settings_can_be_overridden_via_cli() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_seconds = Some(60);
    let overrides = ServeOverrides {
        cache_enabled: Some(false),
        cache_ttl_seconds: Some(5),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(!settings.cache.enabled);
    assert_eq!(settings.cache.ttl, Duration::from_secs(5));
    assert_eq!(settings.cache.max_entries.get(), 1024);
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.ttl_seconds",
            ..
        }
    ));
}

#[test]
fn non_positive_page_size_is_rejected() {
    for size in [0, -5] {
        let mut raw = RawSettings::default();
        raw.feed.page_size = Some(size);

        let err = Settings::from_raw(raw).expect_err("invalid page size");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "feed.page_size",
                ..
            }
        ));
    }
}

#[test]
fn identity_header_is_normalised_and_validated() {
    let mut raw = RawSettings::default();
    raw.identity.header = Some(" X-Remote-User ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.identity.header.as_str(), "x-remote-user");

    let mut raw = RawSettings::default();
    raw.identity.header = Some("not a header".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "identity.header",
            ..
        })
    ));
}

#[test]
fn blank_database_url_means_in_memory() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["fernlog"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "fernlog",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cache-enabled=false",
        "--feed-page-size",
        "25",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.cache_enabled, Some(false));
            assert_eq!(serve.overrides.feed_page_size, Some(25));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from([
        "fernlog",
        "migrate",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
