use super::*;

#[test]
fn defaults_resolve_without_any_source() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert!(settings.backend.url.is_none());
    assert_eq!(settings.backend.timeout, Duration::from_secs(10));
    assert_eq!(settings.backend.revalidate, Duration::from_secs(3600));
    assert_eq!(settings.regions.default_region.as_deref(), Some("us"));
    assert_eq!(settings.regions.refresh_interval, Duration::from_secs(3600));
    assert_eq!(settings.regions.fallback_name, "United States");
    assert_eq!(settings.storefront.cache_id_cookie, "_medusa_cache_id");
    assert_eq!(
        settings.storefront.cache_id_max_age,
        Duration::from_secs(86_400)
    );
    assert!(
        settings
            .storefront
            .excluded_prefixes
            .iter()
            .any(|p| p == "api")
    );
}

#[test]
fn settings_defaults_agree_with_runtime_defaults() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    let regions = crate::cache::RegionCacheConfig::from(&settings.regions);
    let cache_defaults = crate::cache::RegionCacheConfig::default();
    assert_eq!(regions.default_region, cache_defaults.default_region);
    assert_eq!(regions.refresh_interval, cache_defaults.refresh_interval);
    assert_eq!(regions.fallback_name, cache_defaults.fallback_name);

    let policy = crate::cache::RoutingPolicy::from(&settings.storefront);
    let policy_defaults = crate::cache::RoutingPolicy::default();
    assert_eq!(policy.cache_id_cookie, policy_defaults.cache_id_cookie);
    assert_eq!(policy.cache_id_max_age, policy_defaults.cache_id_max_age);
    assert_eq!(policy.excluded_prefixes, policy_defaults.excluded_prefixes);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.backend.url = Some("http://file-backend:9000".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        backend: BackendOverrides {
            backend_url: Some("http://cli-backend:9000".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(
        settings.backend.url.as_ref().map(Url::as_str),
        Some("http://cli-backend:9000/")
    );
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
fn blank_backend_url_means_unconfigured() {
    let mut raw = RawSettings::default();
    raw.backend.url = Some("   ".to_string());
    raw.backend.publishable_key = Some(String::new());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.backend.url.is_none());
    assert!(settings.backend.publishable_key.is_none());
}

#[test]
fn backend_url_must_be_http() {
    let mut raw = RawSettings::default();
    raw.backend.url = Some("ftp://backend".to_string());

    let err = Settings::from_raw(raw).expect_err("ftp is rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "backend.url",
            ..
        }
    ));
}

#[test]
fn default_region_is_normalized() {
    let mut raw = RawSettings::default();
    raw.regions.default_region = Some(" DK ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.regions.default_region.as_deref(), Some("dk"));
}

#[test]
fn blank_default_region_disables_preference() {
    let mut raw = RawSettings::default();
    raw.regions.default_region = Some(String::new());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.regions.default_region.is_none());
}

#[test]
fn default_region_must_be_alpha_2() {
    let mut raw = RawSettings::default();
    raw.regions.default_region = Some("usa".to_string());

    let err = Settings::from_raw(raw).expect_err("three letters are rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "regions.default_region",
            ..
        }
    ));
}

#[test]
fn zero_refresh_interval_is_rejected() {
    let mut raw = RawSettings::default();
    raw.regions.refresh_interval_seconds = Some(0);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn zero_transport_cache_is_rejected() {
    let mut raw = RawSettings::default();
    raw.backend.transport_cache_entries = Some(0);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn invalid_cookie_name_is_rejected() {
    let mut raw = RawSettings::default();
    raw.storefront.cache_id_cookie = Some("cache id;".to_string());

    let err = Settings::from_raw(raw).expect_err("invalid cookie name");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "storefront.cache_id_cookie",
            ..
        }
    ));
}

#[test]
fn excluded_prefixes_are_trimmed() {
    let mut raw = RawSettings::default();
    raw.storefront.excluded_prefixes = Some(vec![
        "/api".to_string(),
        " static ".to_string(),
        "/".to_string(),
    ]);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.storefront.excluded_prefixes, vec!["api", "static"]);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["storefront-edge"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "storefront-edge",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--backend-url",
        "http://localhost:9000",
        "--upstream-url",
        "http://localhost:3000",
        "--default-region",
        "dk",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.backend.backend_url.as_deref(),
                Some("http://localhost:9000")
            );
            assert_eq!(
                serve.overrides.upstream_url.as_deref(),
                Some("http://localhost:3000")
            );
            assert_eq!(serve.overrides.backend.default_region.as_deref(), Some("dk"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_regions_arguments() {
    let args = CliArgs::parse_from([
        "storefront-edge",
        "regions",
        "--backend-url",
        "http://localhost:9000",
        "--resolve",
        "fr",
    ]);

    match args.command.expect("regions command") {
        Command::Regions(regions) => {
            assert_eq!(
                regions.backend.backend_url.as_deref(),
                Some("http://localhost:9000")
            );
            assert_eq!(regions.resolve.as_deref(), Some("fr"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
#[serial_test::serial]
fn serve_args_from_env_read_storefront_variables() {
    // SAFETY: serialized with every other test touching these variables.
    unsafe {
        std::env::set_var("MEDUSA_BACKEND_URL", "http://backend.internal:9000");
        std::env::set_var("NEXT_PUBLIC_DEFAULT_REGION", "dk");
    }
    let args = ServeArgs::from_env();
    unsafe {
        std::env::remove_var("MEDUSA_BACKEND_URL");
        std::env::remove_var("NEXT_PUBLIC_DEFAULT_REGION");
    }

    let args = args.expect("environment-only serve args");
    assert_eq!(
        args.overrides.backend.backend_url.as_deref(),
        Some("http://backend.internal:9000")
    );
    assert_eq!(args.overrides.backend.default_region.as_deref(), Some("dk"));
    assert!(args.overrides.server_port.is_none());
}
