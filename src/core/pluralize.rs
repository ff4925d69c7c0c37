//! Pluralization and casing for generated operation names
//!
//! Generated operations follow the `people` / `createPeople` convention, so
//! entity names need an English plural that keeps the original casing.

/// Irregular plurals, lowercase singular -> lowercase plural
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
];

/// Nouns whose plural equals the singular
const UNCOUNTABLE: &[&str] = &["series", "species", "sheep", "deer", "fish", "information"];

/// Utility for converting singular nouns to their plural form
pub struct Pluralizer;

impl Pluralizer {
    /// Convert a singular noun to its plural form
    ///
    /// Only the last word of a PascalCase name is pluralized and the casing of
    /// its first letter is kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use this_cypher::core::pluralize::Pluralizer;
    ///
    /// assert_eq!(Pluralizer::pluralize("Movie"), "Movies");
    /// assert_eq!(Pluralizer::pluralize("Person"), "People");
    /// assert_eq!(Pluralizer::pluralize("BlogCategory"), "BlogCategories");
    /// assert_eq!(Pluralizer::pluralize("knife"), "knives");
    /// ```
    pub fn pluralize(singular: &str) -> String {
        if singular.is_empty() {
            return singular.to_string();
        }

        let split = last_word_start(singular);
        let (head, word) = singular.split_at(split);
        format!("{}{}", head, pluralize_word(word))
    }

    /// Lowercase the first character ("BlogPost" -> "blogPost")
    pub fn camel_case(name: &str) -> String {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Uppercase the first character ("blogPost" -> "BlogPost")
    pub fn pascal_case(name: &str) -> String {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Byte index where the last PascalCase word starts
fn last_word_start(name: &str) -> usize {
    name.char_indices()
        .skip(1)
        .filter(|(_, c)| c.is_uppercase())
        .map(|(i, _)| i)
        .last()
        .unwrap_or(0)
}

fn pluralize_word(word: &str) -> String {
    let lower = word.to_lowercase();
    let capitalized = word.chars().next().is_some_and(char::is_uppercase);

    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }

    if let Some((_, plural)) = IRREGULAR.iter().find(|(s, _)| *s == lower) {
        return if capitalized {
            Pluralizer::pascal_case(plural)
        } else {
            plural.to_string()
        };
    }

    match word {
        // Words ending in consonant + y -> ies
        s if s.ends_with('y')
            && !s.ends_with("ay")
            && !s.ends_with("ey")
            && !s.ends_with("iy")
            && !s.ends_with("oy")
            && !s.ends_with("uy")
            && s.len() > 1 =>
        {
            format!("{}ies", &s[..s.len() - 1])
        }

        // Words ending in s, sh, ch, x, z -> es
        s if s.ends_with('s')
            || s.ends_with("sh")
            || s.ends_with("ch")
            || s.ends_with('x')
            || s.ends_with('z') =>
        {
            format!("{}es", s)
        }

        // Words ending in fe -> ves
        s if s.ends_with("fe") && s.len() > 2 => {
            format!("{}ves", &s[..s.len() - 2])
        }

        // Words ending in f -> ves
        s if s.ends_with('f') && s.len() > 1 => {
            format!("{}ves", &s[..s.len() - 1])
        }

        // Consonant + o -> oes, with a few common exceptions
        s if s.ends_with('o') && s.len() > 1 => {
            let before_o = s[..s.len() - 1].chars().last();
            match before_o {
                Some('a' | 'e' | 'i' | 'o' | 'u') => format!("{}s", s),
                _ if matches!(lower.as_str(), "photo" | "piano" | "halo" | "video" | "logo") => {
                    format!("{}s", s)
                }
                _ => format!("{}es", s),
            }
        }

        s => format!("{}s", s),
    }
}
