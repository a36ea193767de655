//! Doc-comment mining: best-effort type annotations and the legacy
//! `@package` namespace. Pattern matching over comment text only; no
//! doc-block grammar.

/// Scalar/primitive names never resolved as type references.
const SCALARS: &[&str] = &[
    "array", "bool", "boolean", "callable", "double", "false", "float", "int", "integer",
    "iterable", "mixed", "null", "object", "resource", "self", "static", "string", "this",
    "true", "unknown", "unknown_type", "void",
];

/// Also used for declaration hints, where scalar names never become
/// type references.
pub(crate) fn is_scalar_name(name: &str) -> bool {
    is_scalar(name)
}

fn is_scalar(name: &str) -> bool {
    let name = name.trim_start_matches('\\').trim_start_matches('$');
    name.ends_with("[]") || SCALARS.iter().any(|s| name.eq_ignore_ascii_case(s))
}

fn tag_values<'a>(comment: &'a str, tag: &'a str) -> impl Iterator<Item = &'a str> {
    comment.lines().filter_map(move |line| {
        let line = line.trim().trim_start_matches(['/', '*']).trim_start();
        let rest = line.strip_prefix(tag)?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        rest.split_whitespace().next()
    })
}

/// First value of a type tag (`@return`, `@var`). For `|`-delimited unions
/// the first non-scalar alternative wins; an all-scalar annotation yields
/// nothing.
pub fn tag_type(comment: &str, tag: &str) -> Option<String> {
    let value = tag_values(comment, tag).next()?;
    value
        .split('|')
        .find(|alt| !alt.is_empty() && !is_scalar(alt))
        .map(str::to_string)
}

/// `@param Type $name` type for one named parameter. Same union rule as
/// `tag_type`.
pub fn param_type(comment: &str, name: &str) -> Option<String> {
    let value = comment.lines().find_map(|line| {
        let line = line.trim().trim_start_matches(['/', '*']).trim_start();
        let rest = line.strip_prefix("@param")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let mut parts = rest.split_whitespace();
        let value = parts.next()?;
        let variable = parts.next()?;
        if variable == name {
            Some(value)
        } else {
            None
        }
    })?;
    value
        .split('|')
        .find(|alt| !alt.is_empty() && !is_scalar(alt))
        .map(str::to_string)
}

/// All `@throws` types, in order of appearance.
pub fn throws_types(comment: &str) -> Vec<String> {
    tag_values(comment, "@throws")
        .filter(|v| !is_scalar(v))
        .map(str::to_string)
        .collect()
}

/// Legacy package declaration: `@package Foo` plus optional
/// `@subpackage Bar` yields `Foo\Bar`. Only consulted when the file has no
/// native namespace.
pub fn package(comment: &str) -> Option<String> {
    let package = tag_values(comment, "@package").next()?;
    match tag_values(comment, "@subpackage").next() {
        Some(sub) => Some(format!("{}\\{}", package, sub)),
        None => Some(package.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_tag_yields_first_non_scalar_union_alternative() {
        let comment = "/**\n * @return null|false|MyClass something\n */";
        assert_eq!(tag_type(comment, "@return"), Some("MyClass".to_string()));
    }

    #[test]
    fn all_scalar_union_yields_nothing() {
        let comment = "/** @return int|string */";
        assert_eq!(tag_type(comment, "@return"), None);
    }

    #[test]
    fn var_tag_ignores_following_variable_name() {
        let comment = "/** @var Collection $items */";
        assert_eq!(tag_type(comment, "@var"), Some("Collection".to_string()));
    }

    #[test]
    fn array_suffix_counts_as_scalar() {
        let comment = "/** @return Item[] */";
        assert_eq!(tag_type(comment, "@return"), None);
    }

    #[test]
    fn param_tag_matches_on_the_variable_name() {
        let comment = "/**\n * @param int $count\n * @param Item $item the thing\n */";
        assert_eq!(param_type(comment, "$item"), Some("Item".to_string()));
        assert_eq!(param_type(comment, "$count"), None);
        assert_eq!(param_type(comment, "$missing"), None);
    }

    #[test]
    fn throws_collects_every_tag() {
        let comment = "/**\n * @throws FooException when x\n * @throws \\Bar\\BazError\n */";
        assert_eq!(
            throws_types(comment),
            vec!["FooException".to_string(), "\\Bar\\BazError".to_string()]
        );
    }

    #[test]
    fn package_and_subpackage_join() {
        let comment = "/**\n * @package Foo\n * @subpackage Bar\n */";
        assert_eq!(package(comment), Some("Foo\\Bar".to_string()));
        assert_eq!(package("/** @package Solo */"), Some("Solo".to_string()));
        assert_eq!(package("/** no tags */"), None);
    }

    #[test]
    fn longer_tags_do_not_match_shorter_prefixes() {
        // @subpackage must not be read as a @package value by accident,
        // and @packagename is not @package.
        assert_eq!(package("/** @packagename X */"), None);
    }
}
