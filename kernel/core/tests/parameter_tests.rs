// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Parameter calculation from operator configuration and memory budgets.
//!
//! Budgets are in bytes; derived values are 128 blocks per MB and the
//! `shared_buffers` override is in 8kB blocks, so a 10⁹-byte budget allows
//! at most 50000 override blocks (40%).

use kernel_postgresql_core::domain::parameters::{EFFECTIVE_CACHE_SIZE, SHARED_BUFFERS};
use kernel_postgresql_core::{
    build_postgresql_parameters, ConfigOptions, ParameterError, ParameterValue, PostgreSql, Profile,
};
use serde_json::json;

const ONE_GB: u64 = 1_000_000_000;

fn config_options() -> serde_json::Value {
    json!({
        "durability_test_config_option_1": true,
        "instance_test_config_option_2": false,
        "logging_test_config_option_3": "on",
        "memory_test_config_option_4": 1024,
        "optimizer_test_config_option_5": "scheduled",
        "other_test_config_option_6": "test-value",
        "profile": "production",
        "request_date_style": "ISO, DMY",
        "request_time_zone": "UTC",
        "request_test_config_option_7": "off",
        "response_test_config_option_8": "partial",
        "vacuum_test_config_option_9": 10.5
    })
}

fn parse(value: serde_json::Value) -> ConfigOptions {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_parameters_without_memory_limit() {
    let parameters = build_postgresql_parameters(&parse(config_options()), ONE_GB, None).unwrap();

    let expected = [
        ("test_config_option_1", ParameterValue::Bool(true)),
        ("test_config_option_2", ParameterValue::Bool(false)),
        ("test_config_option_3", ParameterValue::from("on")),
        ("test_config_option_4", ParameterValue::Integer(1024)),
        ("test_config_option_5", ParameterValue::from("scheduled")),
        ("test_config_option_7", ParameterValue::from("off")),
        ("DateStyle", ParameterValue::from("ISO, DMY")),
        ("TimeZone", ParameterValue::from("UTC")),
        ("test_config_option_8", ParameterValue::from("partial")),
        ("test_config_option_9", ParameterValue::Float(10.5)),
        (SHARED_BUFFERS, ParameterValue::Integer(250 * 128)),
        (EFFECTIVE_CACHE_SIZE, ParameterValue::Integer(750 * 128)),
    ];
    assert_eq!(parameters.len(), expected.len());
    for (name, value) in expected {
        assert_eq!(parameters.get(name), Some(&value), "{name}");
    }
    assert!(!parameters.contains("test_config_option_6"));
    assert!(!parameters.contains("profile"));
}

#[test]
fn test_parameters_with_memory_limit() {
    let parameters = build_postgresql_parameters(&parse(config_options()), ONE_GB, Some(600_000_000)).unwrap();

    assert_eq!(parameters.get(SHARED_BUFFERS), Some(&ParameterValue::Integer(150 * 128)));
    assert_eq!(parameters.get(EFFECTIVE_CACHE_SIZE), Some(&ParameterValue::Integer(450 * 128)));
}

#[test]
fn test_limit_above_available_memory_is_ignored() {
    let parameters = build_postgresql_parameters(&parse(config_options()), ONE_GB, Some(2 * ONE_GB)).unwrap();
    assert_eq!(parameters.get(SHARED_BUFFERS), Some(&ParameterValue::Integer(250 * 128)));
}

#[test]
fn test_shared_buffers_above_forty_percent_is_rejected() {
    let mut raw = config_options();
    raw["memory_shared_buffers"] = json!(50001);

    let result = build_postgresql_parameters(&parse(raw), ONE_GB, None);

    assert_eq!(
        result,
        Err(ParameterError::SharedBuffersTooLarge {
            requested: 50001,
            max_blocks: 50000,
            max_mb: 400,
        })
    );
}

#[test]
fn test_shared_buffers_at_forty_percent_is_accepted() {
    let mut raw = config_options();
    raw["memory_shared_buffers"] = json!(50000);

    let parameters = build_postgresql_parameters(&parse(raw), ONE_GB, None).unwrap();

    assert_eq!(parameters.get(SHARED_BUFFERS), Some(&ParameterValue::Integer(50000)));
    assert_eq!(parameters.get(EFFECTIVE_CACHE_SIZE), Some(&ParameterValue::Integer(600 * 128)));
}

#[test]
fn test_shared_buffers_limit_uses_capped_budget() {
    let options = parse(config_options()).with_shared_buffers(Some(40000));

    let result = build_postgresql_parameters(&options, ONE_GB, Some(600_000_000));

    assert!(matches!(
        result,
        Err(ParameterError::SharedBuffersTooLarge { max_blocks: 30000, .. })
    ));
}

#[test]
fn test_testing_profile_skips_derived_parameters() {
    let mut raw = config_options();
    raw["memory_shared_buffers"] = json!(50000);
    raw["profile"] = json!("testing");
    let options = parse(raw);

    let parameters = build_postgresql_parameters(&options, ONE_GB, None).unwrap();
    assert_eq!(parameters.get(SHARED_BUFFERS), Some(&ParameterValue::Integer(50000)));
    assert!(!parameters.contains(EFFECTIVE_CACHE_SIZE));

    let parameters = build_postgresql_parameters(&options.with_shared_buffers(None), ONE_GB, None).unwrap();
    assert!(!parameters.contains(SHARED_BUFFERS));
    assert!(!parameters.contains(EFFECTIVE_CACHE_SIZE));
}

#[test]
fn test_testing_profile_still_checks_override() {
    let options = parse(config_options())
        .with_profile(Profile::Testing)
        .with_shared_buffers(Some(50001));

    assert!(build_postgresql_parameters(&options, ONE_GB, None).is_err());
}

#[test]
fn test_invalid_profile_rejected_at_boundary() {
    let mut raw = config_options();
    raw["profile"] = json!("staging");

    let result: Result<ConfigOptions, _> = serde_json::from_value(raw);
    assert!(result.is_err());
}

#[test]
fn test_options_from_yaml() {
    let options: ConfigOptions = serde_yaml::from_str(
        "profile: production\nmemory_shared_buffers: 1000\nvacuum_autovacuum_naptime: 60\n",
    )
    .unwrap();

    assert_eq!(options.profile, Profile::Production);
    assert_eq!(options.shared_buffers, Some(1000));

    let parameters = PostgreSql::build_postgresql_parameters(&options, ONE_GB, None).unwrap();
    assert_eq!(parameters.get("autovacuum_naptime"), Some(&ParameterValue::Integer(60)));
    assert_eq!(parameters.get(SHARED_BUFFERS), Some(&ParameterValue::Integer(1000)));
}

#[test]
fn test_derived_values_scale_with_budget() {
    let options = parse(json!({ "profile": "production" }));

    for budget in [ONE_GB, 2 * ONE_GB, 8 * ONE_GB, 64 * ONE_GB] {
        let parameters = build_postgresql_parameters(&options, budget, None).unwrap();
        let mb = (budget / 1_000_000) as i64;
        assert_eq!(parameters.get(SHARED_BUFFERS), Some(&ParameterValue::Integer(mb / 4 * 128)));
        assert_eq!(parameters.get(EFFECTIVE_CACHE_SIZE), Some(&ParameterValue::Integer(mb * 3 / 4 * 128)));
    }
}

#[test]
fn test_huge_budgets_do_not_overflow() {
    let options = parse(json!({ "profile": "production" }));

    let parameters = build_postgresql_parameters(&options, 1_000_000_000_000_000_000, None).unwrap();
    assert_eq!(parameters.get(SHARED_BUFFERS), Some(&ParameterValue::Integer(32_000_000_000_000)));
    assert_eq!(parameters.get(EFFECTIVE_CACHE_SIZE), Some(&ParameterValue::Integer(96_000_000_000_000)));

    let parameters = build_postgresql_parameters(&options, u64::MAX, None).unwrap();
    assert_eq!(parameters.get(SHARED_BUFFERS), Some(&ParameterValue::Integer(590_295_810_358_705)));
    assert_eq!(parameters.get(EFFECTIVE_CACHE_SIZE), Some(&ParameterValue::Integer(1_770_887_431_076_096)));

    let options = options.with_shared_buffers(Some(922_337_203_685_375));
    let parameters = build_postgresql_parameters(&options, u64::MAX, None).unwrap();
    assert_eq!(parameters.get(SHARED_BUFFERS), Some(&ParameterValue::Integer(922_337_203_685_375)));

    let options = options.with_shared_buffers(Some(922_337_203_685_376));
    assert!(matches!(
        build_postgresql_parameters(&options, u64::MAX, None),
        Err(ParameterError::SharedBuffersTooLarge { max_blocks: 922_337_203_685_375, .. })
    ));
}
