//! # Utility Functions
//!
//! Small helpers shared by the CLI, the harness and the result writers:
//!
//! - **List parsing**: comma-separated CLI lists with positional error reporting
//! - **System information**: core counts and the process affinity mask
//! - **Formatting**: the fixed-precision rendering of result values

use crate::error::ConfigError;
use std::str::FromStr;

/// Parse a comma-separated list such as `"64,1024,8192"`.
///
/// Whitespace around each entry is ignored, so `"64, 1024"` is accepted.
///
/// ## Errors
///
/// - [`ConfigError::EmptyList`] when `raw` is empty or only whitespace
/// - [`ConfigError::InvalidEntry`] naming the first entry that does not
///   parse as `T`, including empty entries (`"64,,128"`)
pub fn parse_list<T: FromStr>(raw: &str, list: &'static str) -> Result<Vec<T>, ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::EmptyList { list });
    }

    raw.split(',')
        .enumerate()
        .map(|(position, entry)| {
            let entry = entry.trim();
            entry.parse().map_err(|_| ConfigError::InvalidEntry {
                list,
                position,
                value: entry.to_string(),
            })
        })
        .collect()
}

/// Get the number of logical CPU cores
///
/// Uses `num_cpus`, which respects cgroup quotas when running inside a
/// container.
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}

/// Cores this process may run on, in ascending order.
///
/// Reads the affinity mask through `core_affinity`. An empty vector means
/// the mask could not be read.
pub fn available_cores() -> Vec<usize> {
    let mut cores: Vec<usize> = core_affinity::get_core_ids()
        .unwrap_or_default()
        .into_iter()
        .map(|core| core.id)
        .collect();
    cores.sort_unstable();
    cores
}

/// Render a result value with the fixed two-decimal precision of the
/// final result line.
pub fn format_value(value: f64) -> String {
    format!("{:.*}", crate::defaults::RESULT_PRECISION, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list::<usize>("64,1024,8192", "byte size").unwrap(),
            vec![64, 1024, 8192]
        );
        assert_eq!(
            parse_list::<f64>(" 0.1 , -1 ", "threshold").unwrap(),
            vec![0.1, -1.0]
        );
    }

    #[test]
    fn test_parse_list_errors() {
        assert_eq!(
            parse_list::<usize>("", "byte size"),
            Err(ConfigError::EmptyList { list: "byte size" })
        );
        assert_eq!(
            parse_list::<usize>("64,,128", "byte size"),
            Err(ConfigError::InvalidEntry {
                list: "byte size",
                position: 1,
                value: String::new(),
            })
        );
        assert_eq!(
            parse_list::<usize>("64,1k", "byte size"),
            Err(ConfigError::InvalidEntry {
                list: "byte size",
                position: 1,
                value: "1k".to_string(),
            })
        );
    }

    #[test]
    fn test_get_cpu_cores() {
        assert!(get_cpu_cores() > 0);
    }

    #[test]
    fn test_available_cores_sorted() {
        let cores = available_cores();
        assert!(cores.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(100.0), "100.00");
        assert_eq!(format_value(55.0), "55.00");
        assert_eq!(format_value(359.304), "359.30");
        assert_eq!(format_value(0.0), "0.00");
    }
}
