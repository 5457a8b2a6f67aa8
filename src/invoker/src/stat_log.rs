//! Parser for the sandbox stat log
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Matches e.g. `[S][1234] __STAT__:0 2:time = 15`
static STAT_LINE: Lazy<Regex> = Lazy::new(|| {
    // pattern is constant
    Regex::new(r"^\[S\]\[\d+?\] __STAT__:0 (?:\d+?:)?(\w+)\s+=\s+(.*)").unwrap()
});

pub const KEY_TIME: &str = "time";
pub const KEY_MEMORY_MAX_USAGE: &str = "cgroup_memory_max_usage";
pub const KEY_MEMORY_FAILCNT: &str = "cgroup_memory_failcnt";
pub const KEY_EXIT_NORMALLY: &str = "exit_normally";

const MANDATORY_KEYS: [&str; 4] = [
    KEY_MEMORY_FAILCNT,
    KEY_MEMORY_MAX_USAGE,
    KEY_EXIT_NORMALLY,
    KEY_TIME,
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatLogError {
    #[error("mandatory key {key} is missing")]
    MissingKey { key: &'static str },
    #[error("key {key} has invalid value {value:?}")]
    BadValue { key: &'static str, value: String },
}

/// Extracts key-value pairs from the log. Other lines are logged and skipped.
pub fn collect(text: &str) -> BTreeMap<String, String> {
    let mut dict = BTreeMap::new();
    for line in text.lines() {
        match STAT_LINE.captures(line) {
            Some(caps) => {
                dict.insert(caps[1].to_string(), caps[2].to_string());
            }
            None => debug!("SANDBOX >>> {}", line),
        }
    }
    dict
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatLog {
    pub time_ms: u64,
    /// As reported by sandbox
    pub memory_max_usage: u64,
    pub memory_failcnt: u64,
    pub exit_normally: bool,
    /// Keys not listed above
    pub extra: BTreeMap<String, String>,
}

fn number(dict: &BTreeMap<String, String>, key: &'static str) -> Result<u64, StatLogError> {
    let value = dict.get(key).ok_or(StatLogError::MissingKey { key })?;
    value.trim().parse().map_err(|_| StatLogError::BadValue {
        key,
        value: value.clone(),
    })
}

impl StatLog {
    pub fn parse(mut dict: BTreeMap<String, String>) -> Result<StatLog, StatLogError> {
        if let Some(key) = MANDATORY_KEYS.iter().find(|k| !dict.contains_key(**k)) {
            return Err(StatLogError::MissingKey { key: *key });
        }
        let exit_normally = match dict[KEY_EXIT_NORMALLY].trim() {
            "true" => true,
            "false" => false,
            other => {
                return Err(StatLogError::BadValue {
                    key: KEY_EXIT_NORMALLY,
                    value: other.to_string(),
                })
            }
        };
        let log = StatLog {
            time_ms: number(&dict, KEY_TIME)?,
            memory_max_usage: number(&dict, KEY_MEMORY_MAX_USAGE)?,
            memory_failcnt: number(&dict, KEY_MEMORY_FAILCNT)?,
            exit_normally,
            extra: BTreeMap::new(),
        };
        for key in &MANDATORY_KEYS {
            dict.remove(*key);
        }
        Ok(StatLog { extra: dict, ..log })
    }

    /// Time and memory, as far as they can be recovered from a log that
    /// failed to parse
    pub fn usage_hint(dict: &BTreeMap<String, String>) -> (Option<u64>, Option<u64>) {
        (
            number(dict, KEY_TIME).ok(),
            number(dict, KEY_MEMORY_MAX_USAGE).ok(),
        )
    }

    /// All keys, in the form sandbox reported them
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut dict = self.extra.clone();
        dict.insert(KEY_TIME.to_string(), self.time_ms.to_string());
        dict.insert(
            KEY_MEMORY_MAX_USAGE.to_string(),
            self.memory_max_usage.to_string(),
        );
        dict.insert(
            KEY_MEMORY_FAILCNT.to_string(),
            self.memory_failcnt.to_string(),
        );
        dict.insert(
            KEY_EXIT_NORMALLY.to_string(),
            self.exit_normally.to_string(),
        );
        dict
    }
}
