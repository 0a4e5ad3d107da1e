//! Flat string options and the parsing rules shared by the config builders.
//!
//! Option sets arrive as plain `key -> value` string maps, the shape a UI
//! form or command line hands over. The helpers here implement the three
//! value conventions the builders rely on: plain strings, comma-separated
//! lists, and comma-separated `key=value` maps.

use std::collections::HashMap;

/// Flat string options consumed by the config builders.
pub type OptionMap = HashMap<String, String>;

/// Returns the value for `key`, or an empty string when absent.
pub fn string_opt(opts: &OptionMap, key: &str) -> String {
    opts.get(key).cloned().unwrap_or_default()
}

/// Presence-based flag: true when `key` is present with a non-empty value.
/// The value itself is not interpreted, so `"false"` still enables the flag.
pub fn flag_opt(opts: &OptionMap, key: &str) -> bool {
    opts.get(key).map(|v| !v.is_empty()).unwrap_or(false)
}

/// Splits the value for `key` into a list on commas.
pub fn list_opt(opts: &OptionMap, key: &str) -> Vec<String> {
    opts.get(key).map(|v| split_list(v)).unwrap_or_default()
}

/// Parses the value for `key` as a comma-separated `key=value` map.
pub fn map_opt(opts: &OptionMap, key: &str) -> HashMap<String, String> {
    opts.get(key).map(|v| parse_kv_list(v)).unwrap_or_default()
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a comma-separated `key=value` list. Values split on the first `=`
/// only; entries without `=` are dropped silently.
pub fn parse_kv_list(raw: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if let Some((key, value)) = entry.split_once('=') {
            map.insert(key.to_string(), value.to_string());
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> OptionMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn string_opt_defaults_to_empty() {
        let opts = opts(&[("name", "web")]);
        assert_eq!(string_opt(&opts, "name"), "web");
        assert_eq!(string_opt(&opts, "image"), "");
    }

    #[test]
    fn flag_opt_is_presence_based() {
        let opts = opts(&[("internal", "y"), ("ipv6", "false"), ("ingress", "")]);
        assert!(flag_opt(&opts, "internal"));
        // Any non-empty value enables the flag, even "false".
        assert!(flag_opt(&opts, "ipv6"));
        assert!(!flag_opt(&opts, "ingress"));
        assert!(!flag_opt(&opts, "missing"));
    }

    #[test]
    fn split_list_trims_and_drops_empties() {
        assert_eq!(split_list("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_list(" a , b "), vec!["a", "b"]);
        assert_eq!(split_list("a,,b,"), vec!["a", "b"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn parse_kv_list_splits_on_first_equals() {
        let map = parse_kv_list("a=1,b=2");
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], "1");
        assert_eq!(map["b"], "2");

        let map = parse_kv_list("device=type=tmpfs");
        assert_eq!(map["device"], "type=tmpfs");
    }

    #[test]
    fn parse_kv_list_skips_malformed_entries() {
        let map = parse_kv_list("a=1,bad,b=2");
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], "1");
        assert_eq!(map["b"], "2");

        assert!(parse_kv_list("bad").is_empty());
        assert!(parse_kv_list("").is_empty());
    }
}
