use panel_core::{BacklightMode, HealthPolicy, PanelConfig, IDLE_TIMEOUT_CYCLES};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{flag} expects a value")]
    MissingValue { flag: String },
    #[error("invalid value {value:?} for {flag}")]
    InvalidValue { flag: String, value: String },
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    /// `host:port` of a ser2net-style serial bridge; simulated panel when unset.
    pub serial_addr: Option<String>,
    pub read_timeout_ms: u64,
    /// File holding the ALARM1 register; simulated fan controller when unset.
    pub alarm_file: Option<PathBuf>,
    pub idle_timeout_cycles: u32,
    pub backlight_mode: BacklightMode,
    pub health_policy: HealthPolicy,
    pub json_logs: bool,
    pub log_dir: Option<PathBuf>,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            run_seconds: None,
            serial_addr: None,
            read_timeout_ms: 100,
            alarm_file: None,
            idle_timeout_cycles: IDLE_TIMEOUT_CYCLES,
            backlight_mode: BacklightMode::Toggle,
            health_policy: HealthPolicy::Latching,
            json_logs: false,
            log_dir: None,
            metrics_addr: None,
            audit_path: None,
        }
    }
}

/// Advances past `flag` and returns the argument that follows it.
fn take_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, ConfigError> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::MissingValue {
            flag: flag.to_string(),
        })
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}

fn parse_backlight_mode(value: &str) -> Result<BacklightMode, ConfigError> {
    match value {
        "toggle" => Ok(BacklightMode::Toggle),
        "direct" => Ok(BacklightMode::Direct),
        _ => Err(ConfigError::InvalidValue {
            flag: "--backlight-mode".to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_health_policy(value: &str) -> Result<HealthPolicy, ConfigError> {
    match value {
        "latching" => Ok(HealthPolicy::Latching),
        "follow" => Ok(HealthPolicy::FollowAlarm),
        _ => Err(ConfigError::InvalidValue {
            flag: "--health-policy".to_string(),
            value: value.to_string(),
        }),
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--run-seconds" => {
                    cfg.run_seconds = Some(parse_number(flag, take_value(args, &mut i, flag)?)?);
                }
                "--serial" => {
                    cfg.serial_addr = Some(take_value(args, &mut i, flag)?.to_string());
                }
                "--read-timeout-ms" => {
                    cfg.read_timeout_ms = parse_number(flag, take_value(args, &mut i, flag)?)?;
                }
                "--alarm-file" => {
                    cfg.alarm_file = Some(PathBuf::from(take_value(args, &mut i, flag)?));
                }
                "--idle-timeout-cycles" => {
                    cfg.idle_timeout_cycles = parse_number(flag, take_value(args, &mut i, flag)?)?;
                }
                "--backlight-mode" => {
                    cfg.backlight_mode = parse_backlight_mode(take_value(args, &mut i, flag)?)?;
                }
                "--health-policy" => {
                    cfg.health_policy = parse_health_policy(take_value(args, &mut i, flag)?)?;
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--log-dir" => {
                    cfg.log_dir = Some(PathBuf::from(take_value(args, &mut i, flag)?));
                }
                "--metrics-addr" => {
                    cfg.metrics_addr = Some(take_value(args, &mut i, flag)?.to_string());
                }
                "--audit-log" => {
                    cfg.audit_path = Some(PathBuf::from(take_value(args, &mut i, flag)?));
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        Ok(cfg)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn panel_config(&self) -> PanelConfig {
        PanelConfig {
            idle_timeout_cycles: self.idle_timeout_cycles,
            backlight_mode: self.backlight_mode,
            health_policy: self.health_policy,
            ..PanelConfig::default()
        }
    }

    pub fn print_help() {
        println!(
            r#"front-panel - Serial LCD front panel runtime

USAGE:
    front-panel [OPTIONS]

OPTIONS:
    --serial <ADDR>             Serial bridge (ser2net) address, e.g. 192.168.1.20:4001
                                [default: simulated panel]
    --read-timeout-ms <MS>      Keypress read timeout per cycle [default: 100]
    --alarm-file <PATH>         File holding the fan controller ALARM1 register
                                [default: simulated fan controller]
    --idle-timeout-cycles <N>   Empty reads before returning to the home menu [default: 1200]
    --backlight-mode <MODE>     toggle|direct [default: toggle]
    --health-policy <POLICY>    latching|follow [default: latching]
    --run-seconds <SECS>        Run for a fixed duration then exit
    --json-logs                 Output logs in JSON format (for log aggregation)
    --log-dir <DIR>             Also write JSON logs to a daily rolling file in DIR
    --metrics-addr <ADDR>       Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --audit-log <PATH>          Enable audit logging to specified JSONL file
    -h, --help                  Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                    Set log filter (e.g., RUST_LOG=debug,panel_core=trace)

EXAMPLES:
    # Simulated panel for ten seconds
    front-panel --run-seconds 10

    # Real panel behind ser2net with full observability
    front-panel --serial 10.0.0.5:4001 --alarm-file /sys/class/hwmon/hwmon0/alarm1 \
        --json-logs --metrics-addr 0.0.0.0:9090 --audit-log /var/log/front-panel/audit.jsonl
"#
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("front-panel")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_run_simulated() {
        let cfg = RuntimeConfig::from_args(&args(&[])).unwrap();
        assert!(cfg.serial_addr.is_none());
        assert!(cfg.alarm_file.is_none());
        assert_eq!(cfg.idle_timeout_cycles, 1200);
        assert_eq!(cfg.read_timeout(), Duration::from_millis(100));

        let panel = cfg.panel_config();
        assert_eq!(panel.backlight_mode, BacklightMode::Toggle);
        assert_eq!(panel.health_policy, HealthPolicy::Latching);
    }

    #[test]
    fn parses_all_options() {
        let cfg = RuntimeConfig::from_args(&args(&[
            "--serial",
            "10.0.0.5:4001",
            "--read-timeout-ms",
            "25",
            "--alarm-file",
            "/tmp/alarm1",
            "--idle-timeout-cycles",
            "50",
            "--backlight-mode",
            "direct",
            "--health-policy",
            "follow",
            "--run-seconds",
            "3",
            "--json-logs",
            "--log-dir",
            "/tmp/logs",
            "--metrics-addr",
            "127.0.0.1:9090",
            "--audit-log",
            "/tmp/audit.jsonl",
        ]))
        .unwrap();

        assert_eq!(cfg.serial_addr.as_deref(), Some("10.0.0.5:4001"));
        assert_eq!(cfg.read_timeout_ms, 25);
        assert_eq!(cfg.alarm_file, Some(PathBuf::from("/tmp/alarm1")));
        assert_eq!(cfg.run_seconds, Some(3));
        assert!(cfg.json_logs);
        assert_eq!(cfg.log_dir, Some(PathBuf::from("/tmp/logs")));
        assert_eq!(cfg.metrics_addr.as_deref(), Some("127.0.0.1:9090"));
        assert_eq!(cfg.audit_path, Some(PathBuf::from("/tmp/audit.jsonl")));

        let panel = cfg.panel_config();
        assert_eq!(panel.idle_timeout_cycles, 50);
        assert_eq!(panel.backlight_mode, BacklightMode::Direct);
        assert_eq!(panel.health_policy, HealthPolicy::FollowAlarm);
    }

    #[test]
    fn help_stops_parsing() {
        let cfg = RuntimeConfig::from_args(&args(&["-h", "--backlight-mode", "bogus"])).unwrap();
        assert!(cfg.show_help);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            RuntimeConfig::from_args(&args(&["--backlight-mode", "bright"])).unwrap_err(),
            ConfigError::InvalidValue {
                flag: "--backlight-mode".to_string(),
                value: "bright".to_string(),
            }
        );
        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--run-seconds", "soon"])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            RuntimeConfig::from_args(&args(&["--serial"])).unwrap_err(),
            ConfigError::MissingValue {
                flag: "--serial".to_string(),
            }
        );
    }
}
