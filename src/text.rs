//! String helpers shared by the annotation, tag and type-expression parsers.

/// Splits `input` on `delim`, ignoring delimiters nested inside `()`, `[]` or `{}`.
///
/// Empty pieces are kept so that callers can reject them; surrounding
/// whitespace is not trimmed.
pub fn split_unless_nested(input: &str, delim: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if c == delim && depth == 0 => {
                parts.push(&input[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Lowercases the leading run of upper-case runes: `ID` -> `id`, `UserID` -> `userID`.
pub fn to_lower_camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut lowering = false;
    for (i, ch) in input.chars().enumerate() {
        if ch.is_uppercase() && (i == 0 || lowering) {
            out.extend(ch.to_lowercase());
            lowering = true;
        } else {
            out.push(ch);
            lowering = false;
        }
    }
    out
}

/// `UserID` -> `user_id`, `HTTPServer` -> `http_server`.
pub fn to_snake_case(input: &str) -> String {
    let runes: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 4);
    for (idx, &ch) in runes.iter().enumerate() {
        if idx > 0 && ch.is_uppercase() {
            let next_lower = runes.get(idx + 1).map(|c| c.is_lowercase()).unwrap_or(false);
            let prev_lower = runes[idx - 1].is_lowercase();
            if next_lower || prev_lower {
                out.push('_');
            }
        }
        out.extend(ch.to_lowercase());
    }
    out
}

/// Go visibility rule: an identifier is exported when it starts with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false)
}

/// Replaces the path separators that are not allowed in a definition name.
pub fn full_path_to_name(path: &str) -> String {
    path.chars()
        .map(|c| if matches!(c, '/' | '.' | '\\') { '_' } else { c })
        .collect()
}

/// Removes one pair of surrounding double quotes, if present.
pub fn trim_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_unless_nested() {
        assert_eq!(
            split_unless_nested("x-a,x-b=[0, 9],x-c={a, (b, c)}", ','),
            vec!["x-a", "x-b=[0, 9]", "x-c={a, (b, c)}"]
        );
        assert_eq!(
            split_unless_nested("Outer{a=A,b=[]B},Other", ','),
            vec!["Outer{a=A,b=[]B}", "Other"]
        );
        assert_eq!(split_unless_nested("", ','), vec![""]);
    }

    #[test]
    fn test_naming_strategies() {
        assert_eq!(to_lower_camel_case("ID"), "id");
        assert_eq!(to_lower_camel_case("UserID"), "userID");
        assert_eq!(to_lower_camel_case("PhotoUrls"), "photoUrls");
        assert_eq!(to_snake_case("UserID"), "user_id");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("PhotoUrls"), "photo_urls");
    }

    #[test]
    fn test_full_path_to_name() {
        assert_eq!(
            full_path_to_name("github.com/acme/api/web"),
            "github_com_acme_api_web"
        );
    }

    #[test]
    fn test_is_exported() {
        assert!(is_exported("Pet"));
        assert!(!is_exported("pet"));
        assert!(!is_exported("_x"));
    }
}
