//! Environment-based configuration loader.

use std::{num::NonZeroU64, path::PathBuf, time::Duration};

use {secrecy::Secret, tracing::warn};

use crate::{
    error::{Error, Result},
    schema::{ConnectConfig, InstanceGuardSpec, PolicyConfig, Target, TetherConfig},
    validate::{self, Severity},
};

pub const TOKEN_VAR: &str = "BOT_TOKEN";
pub const GUILD_VAR: &str = "GUILD_ID";
pub const CHANNEL_VAR: &str = "VC_CHANNEL_ID";
pub const POLL_INTERVAL_VAR: &str = "TETHER_POLL_INTERVAL_SECS";
pub const BASE_BACKOFF_VAR: &str = "TETHER_BASE_BACKOFF_SECS";
pub const MAX_BACKOFF_VAR: &str = "TETHER_MAX_BACKOFF_SECS";
pub const JITTER_VAR: &str = "TETHER_JITTER_MS";
pub const SIGNATURE_THRESHOLD_VAR: &str = "TETHER_SIGNATURE_THRESHOLD";
pub const COOLDOWN_VAR: &str = "TETHER_COOLDOWN_SECS";
pub const COOLDOWN_SLICE_VAR: &str = "TETHER_COOLDOWN_SLICE_SECS";
pub const CONNECT_TIMEOUT_VAR: &str = "TETHER_CONNECT_TIMEOUT_SECS";
pub const FAULT_DELAY_VAR: &str = "TETHER_FAULT_DELAY_SECS";
pub const SIGNATURE_CODES_VAR: &str = "TETHER_SIGNATURE_CODES";
pub const SELF_DEAF_VAR: &str = "TETHER_SELF_DEAF";
pub const INSTANCE_LOCK_VAR: &str = "TETHER_INSTANCE_LOCK";

/// Load and validate configuration from the process environment.
pub fn load_from_env() -> Result<TetherConfig> {
    load_with(|name| std::env::var(name).ok())
}

/// Load and validate configuration using a custom variable lookup.
///
/// Empty values are treated the same as absent ones. Validation warnings are
/// logged; the first validation error is returned.
pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<TetherConfig> {
    let env = Env { lookup: &lookup };

    let token = env.required(TOKEN_VAR)?;
    let target = Target::new(env.id(GUILD_VAR)?, env.id(CHANNEL_VAR)?);

    let defaults = PolicyConfig::default();
    let policy = PolicyConfig {
        poll_interval: env.secs(POLL_INTERVAL_VAR, defaults.poll_interval)?,
        base_backoff: env.secs(BASE_BACKOFF_VAR, defaults.base_backoff)?,
        max_backoff: env.secs(MAX_BACKOFF_VAR, defaults.max_backoff)?,
        max_jitter: env.millis(JITTER_VAR, defaults.max_jitter)?,
        signature_threshold: env
            .number(SIGNATURE_THRESHOLD_VAR)?
            .map_or(Ok(defaults.signature_threshold), |n| {
                u32::try_from(n).map_err(|e| {
                    Error::invalid(SIGNATURE_THRESHOLD_VAR, n.to_string(), e)
                })
            })?,
        cooldown: env.secs(COOLDOWN_VAR, defaults.cooldown)?,
        cooldown_slice: env.secs(COOLDOWN_SLICE_VAR, defaults.cooldown_slice)?,
        fault_delay: env.secs(FAULT_DELAY_VAR, defaults.fault_delay)?,
    };

    let connect_defaults = ConnectConfig::default();
    let connect = ConnectConfig {
        timeout: env.secs(CONNECT_TIMEOUT_VAR, connect_defaults.timeout)?,
        self_deaf: env.flag(SELF_DEAF_VAR, connect_defaults.self_deaf)?,
        signature_codes: match env.get(SIGNATURE_CODES_VAR) {
            Some(raw) => parse_codes(&raw)?,
            None => connect_defaults.signature_codes,
        },
    };

    let instance_guard = match env.get(INSTANCE_LOCK_VAR) {
        Some(raw) => parse_guard(&raw)?,
        None => InstanceGuardSpec::default_for(&target),
    };

    let config = TetherConfig {
        token: Secret::new(token),
        target,
        policy,
        connect,
        instance_guard,
    };

    let result = validate::validate(&config);
    for diag in &result.diagnostics {
        if diag.severity == Severity::Warning {
            warn!(variable = diag.variable, "{}", diag.message);
        }
    }
    if let Some(err) = result.into_error() {
        return Err(err);
    }

    Ok(config)
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String> {
        self.get(name).ok_or(Error::Missing { name })
    }

    fn id(&self, name: &'static str) -> Result<NonZeroU64> {
        let raw = self.required(name)?;
        let value: u64 = raw
            .parse()
            .map_err(|e| Error::invalid(name, raw.clone(), e))?;
        NonZeroU64::new(value).ok_or_else(|| Error::invalid(name, raw, "must be non-zero"))
    }

    fn number(&self, name: &'static str) -> Result<Option<u64>> {
        self.get(name)
            .map(|raw| raw.parse().map_err(|e| Error::invalid(name, raw.clone(), e)))
            .transpose()
    }

    fn secs(&self, name: &'static str, default: Duration) -> Result<Duration> {
        Ok(self.number(name)?.map_or(default, Duration::from_secs))
    }

    fn millis(&self, name: &'static str, default: Duration) -> Result<Duration> {
        Ok(self.number(name)?.map_or(default, Duration::from_millis))
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool> {
        let Some(raw) = self.get(name) else {
            return Ok(default);
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::invalid(name, raw, "expected a boolean")),
        }
    }
}

fn parse_codes(raw: &str) -> Result<Vec<u16>> {
    let codes = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>()
                .map_err(|e| Error::invalid(SIGNATURE_CODES_VAR, raw, e))
        })
        .collect::<Result<Vec<_>>>()?;
    if codes.is_empty() {
        return Err(Error::invalid(
            SIGNATURE_CODES_VAR,
            raw,
            "expected at least one close code",
        ));
    }
    Ok(codes)
}

fn parse_guard(raw: &str) -> Result<InstanceGuardSpec> {
    if let Some(path) = raw.strip_prefix("file:") {
        if path.is_empty() {
            return Err(Error::invalid(INSTANCE_LOCK_VAR, raw, "empty lock file path"));
        }
        return Ok(InstanceGuardSpec::LockFile(PathBuf::from(path)));
    }
    if let Some(port) = raw.strip_prefix("port:") {
        let port: u16 = port
            .parse()
            .map_err(|e| Error::invalid(INSTANCE_LOCK_VAR, raw, e))?;
        if port == 0 {
            return Err(Error::invalid(INSTANCE_LOCK_VAR, raw, "port must be non-zero"));
        }
        return Ok(InstanceGuardSpec::Port(port));
    }
    Err(Error::invalid(
        INSTANCE_LOCK_VAR,
        raw,
        "expected file:<path> or port:<number>",
    ))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use {rstest::rstest, secrecy::ExposeSecret};

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("BOT_TOKEN", "abc.def"),
        ("GUILD_ID", "1234"),
        ("VC_CHANNEL_ID", "5678"),
    ];

    #[test]
    fn loads_required_values_with_defaults() {
        let cfg = load_with(env(BASE)).unwrap();
        assert_eq!(cfg.token.expose_secret(), "abc.def");
        assert_eq!(cfg.target.guild_id.get(), 1234);
        assert_eq!(cfg.target.channel_id.get(), 5678);
        assert_eq!(cfg.policy, PolicyConfig::default());
        assert_eq!(cfg.connect, ConnectConfig::default());
        assert_eq!(
            cfg.instance_guard,
            InstanceGuardSpec::default_for(&cfg.target)
        );
    }

    #[rstest]
    #[case("BOT_TOKEN")]
    #[case("GUILD_ID")]
    #[case("VC_CHANNEL_ID")]
    fn missing_required_value_fails(#[case] absent: &str) {
        let pairs: Vec<_> = BASE.iter().copied().filter(|(k, _)| *k != absent).collect();
        match load_with(env(&pairs)) {
            Err(Error::Missing { name }) => assert_eq!(name, absent),
            other => panic!("expected missing {absent}, got {other:?}"),
        }
    }

    #[rstest]
    #[case("GUILD_ID", "0")]
    #[case("GUILD_ID", "-4")]
    #[case("VC_CHANNEL_ID", "voice")]
    #[case("VC_CHANNEL_ID", "12.5")]
    fn bad_ids_are_rejected(#[case] var: &str, #[case] value: &str) {
        let mut pairs: Vec<_> = BASE.iter().copied().filter(|(k, _)| *k != var).collect();
        pairs.push((var, value));
        assert!(matches!(
            load_with(env(&pairs)),
            Err(Error::Invalid { name, .. }) if name == var
        ));
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let mut pairs = BASE.to_vec();
        pairs.retain(|(k, _)| *k != "BOT_TOKEN");
        pairs.push(("BOT_TOKEN", "   "));
        assert!(matches!(
            load_with(env(&pairs)),
            Err(Error::Missing { name: "BOT_TOKEN" })
        ));
    }

    #[test]
    fn tuning_overrides_are_applied() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("TETHER_POLL_INTERVAL_SECS", "20"),
            ("TETHER_MAX_BACKOFF_SECS", "120"),
            ("TETHER_JITTER_MS", "0"),
            ("TETHER_SIGNATURE_THRESHOLD", "5"),
            ("TETHER_COOLDOWN_SECS", "900"),
            ("TETHER_SIGNATURE_CODES", "4006, 4009"),
            ("TETHER_SELF_DEAF", "no"),
            ("TETHER_INSTANCE_LOCK", "port:47123"),
        ]);
        let cfg = load_with(env(&pairs)).unwrap();
        assert_eq!(cfg.policy.poll_interval, Duration::from_secs(20));
        assert_eq!(cfg.policy.max_backoff, Duration::from_secs(120));
        assert_eq!(cfg.policy.max_jitter, Duration::ZERO);
        assert_eq!(cfg.policy.signature_threshold, 5);
        assert_eq!(cfg.policy.cooldown, Duration::from_secs(900));
        assert_eq!(cfg.connect.signature_codes, vec![4006, 4009]);
        assert!(!cfg.connect.self_deaf);
        assert_eq!(cfg.instance_guard, InstanceGuardSpec::Port(47123));
    }

    #[rstest]
    #[case("file:")]
    #[case("port:0")]
    #[case("port:http")]
    #[case("socket:/tmp/x")]
    fn bad_instance_guard_is_rejected(#[case] raw: &str) {
        assert!(parse_guard(raw).is_err());
    }

    #[test]
    fn lock_file_guard_parses_path() {
        assert_eq!(
            parse_guard("file:/run/tether.lock").unwrap(),
            InstanceGuardSpec::LockFile(PathBuf::from("/run/tether.lock"))
        );
    }

    #[test]
    fn inverted_backoff_bounds_fail_validation() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("TETHER_BASE_BACKOFF_SECS", "30"),
            ("TETHER_MAX_BACKOFF_SECS", "10"),
        ]);
        assert!(matches!(
            load_with(env(&pairs)),
            Err(Error::Invalid {
                name: "TETHER_BASE_BACKOFF_SECS",
                ..
            })
        ));
    }
}
