use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// P2P Sweep - run a simulated point-to-point benchmark for several message
/// sizes in parallel, repeating each until its throughput estimate is precise
/// enough.
///
/// Options must come before the positional arguments: everything after
/// BYTE_SIZES is forwarded verbatim to the simulation launcher.
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Platform description loaded by the simulator
    pub platform_file: PathBuf,

    /// Hostfile passed to the launcher
    pub hostfile: PathBuf,

    /// Benchmark executable run under the launcher (e.g. IMB-P2P)
    pub executable: PathBuf,

    /// Benchmark name passed to the executable (e.g. PingPong)
    pub benchmark: String,

    /// Comma-separated relative standard error targets, one per byte size;
    /// a negative value runs the full iteration budget
    #[clap(allow_hyphen_values = true)]
    pub thresholds: String,

    /// Maximum number of trials per byte size
    pub max_iters: usize,

    /// Comma-separated message sizes in bytes, one worker each
    pub byte_sizes: String,

    /// Extra arguments appended to every launcher invocation
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub extra_args: Vec<String>,

    /// Simulation launcher used to start the benchmark executable
    #[clap(long, default_value = crate::defaults::LAUNCHER)]
    pub launcher: String,

    /// Directory holding the per-worker trial result files
    #[clap(long, default_value = ".")]
    pub work_dir: PathBuf,

    /// Kill a trial that runs longer than this (e.g. "30s", "5m"); no limit by default
    #[clap(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Pin each worker's launcher to its own core with taskset
    #[clap(long, default_value_t = false)]
    pub pin_cpus: bool,

    /// Write a JSON summary of every worker to this file
    #[clap(long)]
    pub json_output: Option<PathBuf>,

    /// Also append log events to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse duration from string (e.g., "10s", "5m", "1h", "250ms")
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (number, seconds_per_unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, 0.001)
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, 1.0)
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, 60.0)
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, 3600.0)
    } else {
        (s, 1.0)
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", number))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("Duration must be positive: {}", s));
    }

    Duration::try_from_secs_f64(value * seconds_per_unit)
        .map_err(|_| format!("Duration out of range: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSITIONALS: [&str; 7] = [
        "platform.so",
        "hostfile.txt",
        "/usr/local/bin/IMB-P2P",
        "PingPong",
        "0.1,0.1,-1",
        "10",
        "64,1024,8192",
    ];

    fn argv(prefix: &[&str], suffix: &[&str]) -> Vec<String> {
        std::iter::once("p2p-sweep")
            .chain(prefix.iter().copied())
            .chain(POSITIONALS.iter().copied())
            .chain(suffix.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("-3s").is_err());
        assert!(parse_duration("1e300h").is_err());
        assert!(parse_duration("1e20").is_err());
    }

    #[test]
    fn test_oversized_timeout_rejected() {
        let err = Args::try_parse_from(argv(&["--timeout", "1e300h"], &[])).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_positionals() {
        let args = Args::try_parse_from(argv(&[], &[])).unwrap();
        assert_eq!(args.platform_file, PathBuf::from("platform.so"));
        assert_eq!(args.benchmark, "PingPong");
        assert_eq!(args.thresholds, "0.1,0.1,-1");
        assert_eq!(args.max_iters, 10);
        assert_eq!(args.byte_sizes, "64,1024,8192");
        assert!(args.extra_args.is_empty());
        assert_eq!(args.launcher, "smpirun");
        assert_eq!(args.timeout, None);
        assert!(!args.pin_cpus);
    }

    #[test]
    fn test_extra_args_forwarded_verbatim() {
        let args = Args::try_parse_from(argv(
            &[],
            &[
                "--log=root.threshold:error",
                "--cfg=smpi/host-speed:6103515625f",
                "-v",
            ],
        ))
        .unwrap();
        assert_eq!(
            args.extra_args,
            vec![
                "--log=root.threshold:error",
                "--cfg=smpi/host-speed:6103515625f",
                "-v",
            ]
        );
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_negative_threshold_list() {
        let mut raw = argv(&[], &[]);
        raw[5] = "-1,-1,-1".to_string();
        let args = Args::try_parse_from(raw).unwrap();
        assert_eq!(args.thresholds, "-1,-1,-1");
    }

    #[test]
    fn test_options_before_positionals() {
        let args = Args::try_parse_from(argv(
            &["--launcher", "mpirun", "--timeout", "90s", "--pin-cpus", "-vv"],
            &[],
        ))
        .unwrap();
        assert_eq!(args.launcher, "mpirun");
        assert_eq!(args.timeout, Some(Duration::from_secs(90)));
        assert!(args.pin_cpus);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_missing_positionals_rejected() {
        let raw = vec!["p2p-sweep", "platform.so", "hostfile.txt", "IMB-P2P", "PingPong", "0.1", "10"];
        assert!(Args::try_parse_from(raw).is_err());
    }
}
