//! Field and type name to column/table name conversion.

/// Whole names that map to a fixed snake form instead of one segment per letter.
const ACRONYMS: &[(&str, &str)] = &[
    ("ID", "id"),
    ("UUID", "uuid"),
    ("URL", "url"),
    ("API", "api"),
    ("HTTP", "http"),
];

/// Convert a camel/Pascal case name to snake case.
///
/// Every uppercase letter opens a new `_`-separated segment, so `ANameBeginWithA`
/// becomes `a_name_begin_with_a` and `PERSON` becomes `p_e_r_s_o_n`. Names that
/// are already snake case pass through unchanged.
pub fn to_snake_case(name: &str) -> String {
    if let Some((_, snake)) = ACRONYMS.iter().find(|(acronym, _)| *acronym == name) {
        return (*snake).to_string();
    }

    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_conversion() {
        assert_eq!(to_snake_case("ANameBeginWithA"), "a_name_begin_with_a");
        assert_eq!(to_snake_case("aNameBeginWithA"), "a_name_begin_with_a");
        assert_eq!(to_snake_case("person"), "person");
        assert_eq!(to_snake_case("PERSON"), "p_e_r_s_o_n");
        assert_eq!(to_snake_case("UserProfile"), "user_profile");
        assert_eq!(to_snake_case("created_at"), "created_at");
        assert_eq!(to_snake_case("Deleted_At"), "deleted_at");
    }

    #[test]
    fn acronyms_match_whole_name() {
        assert_eq!(to_snake_case("ID"), "id");
        assert_eq!(to_snake_case("URL"), "url");
        assert_eq!(to_snake_case("UserID"), "user_i_d");
    }

    #[test]
    fn quote_ident_escapes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
