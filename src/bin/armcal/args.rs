use anyhow::{Result, anyhow};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use armcal::ConfigOverrides;

pub const USAGE: &str = "\
Usage: armcal [OPTIONS]

Runs the arm calibration sequence against the robot-control service.

Options:
  --host <HOST>               Service host, optionally with scheme [env: ARMCAL_HOST]
  --port <PORT>               Service port [env: ARMCAL_PORT]
  --robot-id <ID>             Robot identifier [env: ARMCAL_ROBOT_ID]
  --poll-interval <SECS>      Seconds between calibration polls [env: ARMCAL_POLL_INTERVAL]
  --max-polls <N>             Give up after N polls, 0 = unbounded [env: ARMCAL_MAX_POLLS]
  --poll-timeout <SECS>       Give up after SECS of polling, 0 = unbounded [env: ARMCAL_POLL_TIMEOUT]
  --request-timeout <SECS>    Per-request HTTP timeout [env: ARMCAL_REQUEST_TIMEOUT]
  --retries <N>               Extra attempts on transport errors [env: ARMCAL_RETRIES]
  --diagnostics-dir <DIR>     Where invalid responses are saved [env: ARMCAL_DIAGNOSTICS_DIR]
  --config <FILE>             JSON config file [env: ARMCAL_CONFIG]
  --force                     Continue past invalid responses with a warning [env: ARMCAL_FORCE]
  --dry-run                   Print requests instead of sending them [env: ARMCAL_DRY_RUN]
  --simulate                  Answer from canned responses [env: ARMCAL_SIMULATE]
  -h, --help                  Print this help
";

#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub overrides: ConfigOverrides,
    pub help: bool, // -h/--help
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse() -> Result<Self> {
        Self::parse_argv(env::args())
    }

    /// Parse a full argv, program name first.
    fn parse_argv(argv: impl IntoIterator<Item = String>) -> Result<Self> {
        let args: Vec<String> = argv.into_iter().skip(1).collect();
        Self::parse_from(&args)
    }

    /// Parse from a slice of arguments (for testing)
    pub fn parse_from(args: &[String]) -> Result<Self> {
        let mut result = CliArgs::default();
        let o = &mut result.overrides;

        let mut i = 0;
        while i < args.len() {
            let arg = args[i].as_str();

            match arg {
                "--host" => o.host = Some(value_of(args, &mut i)?.to_string()),
                "--port" => o.port = Some(parsed(args, &mut i)?),
                "--robot-id" => o.robot_id = Some(parsed(args, &mut i)?),
                "--poll-interval" => o.poll_interval_secs = Some(parsed(args, &mut i)?),
                "--max-polls" => o.max_polls = Some(parsed(args, &mut i)?),
                "--poll-timeout" => o.poll_timeout_secs = Some(parsed(args, &mut i)?),
                "--request-timeout" => o.request_timeout_secs = Some(parsed(args, &mut i)?),
                "--retries" => o.retries = Some(parsed(args, &mut i)?),
                "--diagnostics-dir" => {
                    o.diagnostics_dir = Some(PathBuf::from(value_of(args, &mut i)?))
                }
                "--config" => o.config_path = Some(PathBuf::from(value_of(args, &mut i)?)),
                "--force" => o.force = Some(true),
                "--dry-run" => o.dry_run = Some(true),
                "--simulate" => o.simulate = Some(true),
                "-h" | "--help" => result.help = true,
                unknown => {
                    return Err(anyhow!("Unknown argument: {unknown}"));
                }
            }

            i += 1;
        }

        Ok(result)
    }
}

fn value_of<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{flag} requires a value"))
}

fn parsed<T: FromStr>(args: &[String], i: &mut usize) -> Result<T> {
    let flag = args[*i].clone();
    let raw = value_of(args, i)?;
    raw.parse::<T>()
        .map_err(|_| anyhow!("{flag}: invalid value '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_no_args() {
        let parsed = CliArgs::parse_from(&args(&[])).unwrap();
        assert_eq!(parsed.overrides, ConfigOverrides::default());
        assert!(!parsed.help);
    }

    #[test]
    fn parse_argv_tolerates_missing_program_name() {
        let parsed = CliArgs::parse_argv(Vec::new()).unwrap();
        assert_eq!(parsed.overrides, ConfigOverrides::default());

        let parsed = CliArgs::parse_argv(args(&["armcal", "--force"])).unwrap();
        assert_eq!(parsed.overrides.force, Some(true));
    }

    #[test]
    fn parse_connection_flags() {
        let parsed = CliArgs::parse_from(&args(&[
            "--host",
            "arm.local",
            "--port",
            "8020",
            "--robot-id",
            "1",
        ]))
        .unwrap();
        assert_eq!(parsed.overrides.host.as_deref(), Some("arm.local"));
        assert_eq!(parsed.overrides.port, Some(8020));
        assert_eq!(parsed.overrides.robot_id, Some(1));
    }

    #[test]
    fn parse_poll_flags() {
        let parsed = CliArgs::parse_from(&args(&[
            "--poll-interval",
            "0.5",
            "--max-polls",
            "0",
            "--poll-timeout",
            "90",
        ]))
        .unwrap();
        assert_eq!(parsed.overrides.poll_interval_secs, Some(0.5));
        assert_eq!(parsed.overrides.max_polls, Some(0));
        assert_eq!(parsed.overrides.poll_timeout_secs, Some(90.0));
    }

    #[test]
    fn parse_switches() {
        let parsed = CliArgs::parse_from(&args(&["--force", "--simulate"])).unwrap();
        assert_eq!(parsed.overrides.force, Some(true));
        assert_eq!(parsed.overrides.simulate, Some(true));
        assert_eq!(parsed.overrides.dry_run, None);
    }

    #[test]
    fn parse_paths() {
        let parsed = CliArgs::parse_from(&args(&[
            "--diagnostics-dir",
            "/tmp/diag",
            "--config",
            "armcal.json",
        ]))
        .unwrap();
        assert_eq!(
            parsed.overrides.diagnostics_dir,
            Some(PathBuf::from("/tmp/diag"))
        );
        assert_eq!(
            parsed.overrides.config_path,
            Some(PathBuf::from("armcal.json"))
        );
    }

    #[test]
    fn parse_help() {
        assert!(CliArgs::parse_from(&args(&["-h"])).unwrap().help);
        assert!(CliArgs::parse_from(&args(&["--help"])).unwrap().help);
    }

    #[test]
    fn parse_error_on_unknown_arg() {
        let result = CliArgs::parse_from(&args(&["--unknown"]));
        assert!(result.unwrap_err().to_string().contains("Unknown argument"));
    }

    #[test]
    fn parse_error_on_missing_value() {
        let result = CliArgs::parse_from(&args(&["--port"]));
        assert!(result.unwrap_err().to_string().contains("requires a value"));
    }

    #[test]
    fn parse_error_on_bad_number() {
        let result = CliArgs::parse_from(&args(&["--port", "eighty"]));
        assert!(result.unwrap_err().to_string().contains("invalid value"));
    }
}
