use std::path::PathBuf;

use dirs_next::home_dir;

pub fn expand_tilde(path: &str) -> PathBuf {
    let p = path.trim();
    if p == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = p.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    if let Some(rest) = p.strip_prefix("~\\") {
        // Windows-style
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(p)
}

/// Turns a product title into a file name safe on every supported platform.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|character| match character {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            character if character.is_control() => '_',
            character => character,
        })
        .collect();
    if sanitized.is_empty() || sanitized.chars().all(|character| character == '.') {
        return "product".to_string();
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_home_prefix() {
        temp_env::with_var("HOME", Some("/home/eo"), || {
            assert_eq!(expand_tilde("~/data/out"), PathBuf::from("/home/eo/data/out"));
        });
        assert_eq!(expand_tilde(" /tmp/x "), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn sanitizes_separators_and_empty_names() {
        assert_eq!(sanitize_file_name("S2A_MSIL1C/2021:04"), "S2A_MSIL1C_2021_04");
        assert_eq!(sanitize_file_name(".."), "product");
        assert_eq!(sanitize_file_name("   "), "product");
    }
}
