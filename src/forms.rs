//! Heuristic English word forms.
//!
//! This is not a stemmer. It only widens exact-match recall for single-word
//! queries, so false positives ("mining" -> "min") are tolerated.

const VOWELS: [char; 5] = ['a', 'e', 'i', 'o', 'u'];

/// Returns `word` followed by its plural, `-ing`, `-ed` and stripped-root
/// variants, in generation order without duplicates or empty strings.
pub fn generate_forms(word: &str) -> Vec<String> {
    let mut forms = Vec::with_capacity(8);
    let mut add = |form: String| {
        if !form.is_empty() && !forms.contains(&form) {
            forms.push(form);
        }
    };
    if word.is_empty() {
        return Vec::new();
    }
    add(word.to_string());

    let consonant_y = word.ends_with('y') && !penultimate_is_vowel(word);
    let char_len = word.chars().count();

    if ["s", "x", "z", "ch", "sh"].iter().any(|end| word.ends_with(end)) {
        add(format!("{word}es"));
    } else if consonant_y {
        add(format!("{}ies", &word[..word.len() - 1]));
    } else {
        add(format!("{word}s"));
    }

    if word.ends_with('e') && !word.ends_with("ee") && char_len > 1 {
        add(format!("{}ing", &word[..word.len() - 1]));
    } else {
        add(format!("{word}ing"));
    }

    if word.ends_with('e') {
        add(format!("{word}d"));
    } else if consonant_y {
        add(format!("{}ied", &word[..word.len() - 1]));
    } else {
        add(format!("{word}ed"));
    }

    if char_len > 1 {
        if let Some(root) = word.strip_suffix('s') {
            add(root.to_string());
        }
    }
    if char_len > 2 {
        if let Some(root) = word.strip_suffix("es") {
            add(root.to_string());
        }
    }
    if char_len > 3 {
        if let Some(root) = word.strip_suffix("ing") {
            add(root.to_string());
            if !word.ends_with("ling") {
                add(format!("{root}e"));
            }
        }
    }
    if char_len > 2 {
        if let Some(root) = word.strip_suffix("ed") {
            add(root.to_string());
            if !word.ends_with("led") {
                add(format!("{root}e"));
            }
        }
    }

    forms
}

/// Whether a query is eligible for word-form expansion: one ASCII word.
pub fn is_single_word(query: &str) -> bool {
    !query.is_empty() && query.bytes().all(|b| b.is_ascii_alphabetic())
}

// A missing penultimate letter counts as a consonant, so "y" pluralises to "ies".
fn penultimate_is_vowel(word: &str) -> bool {
    word.chars()
        .rev()
        .nth(1)
        .is_some_and(|c| VOWELS.contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mine_expands_to_common_inflections() {
        let forms = generate_forms("mine");
        for expected in ["mine", "mines", "mining", "mined"] {
            assert!(forms.iter().any(|f| f == expected), "missing {expected}");
        }
        assert_eq!(forms[0], "mine");
    }

    #[test]
    fn consonant_y_uses_ies_and_ied() {
        let forms = generate_forms("fly");
        assert!(forms.contains(&"flies".to_string()));
        assert!(forms.contains(&"flied".to_string()));
        assert!(forms.contains(&"flying".to_string()));

        let forms = generate_forms("key");
        assert!(forms.contains(&"keys".to_string()));
        assert!(forms.contains(&"keyed".to_string()));
    }

    #[test]
    fn sibilant_endings_take_es() {
        assert!(generate_forms("torch").contains(&"torches".to_string()));
        assert!(generate_forms("box").contains(&"boxes".to_string()));
    }

    #[test]
    fn inflected_words_yield_roots() {
        let forms = generate_forms("mining");
        assert!(forms.contains(&"min".to_string()));
        assert!(forms.contains(&"mine".to_string()));

        let forms = generate_forms("smelted");
        assert!(forms.contains(&"smelt".to_string()));
        assert!(forms.contains(&"smelte".to_string()));

        let forms = generate_forms("boxes");
        assert!(forms.contains(&"boxe".to_string()));
        assert!(forms.contains(&"box".to_string()));
    }

    #[test]
    fn ling_and_led_skip_e_restoration() {
        let forms = generate_forms("smelling");
        assert!(forms.contains(&"smell".to_string()));
        assert!(!forms.contains(&"smelle".to_string()));

        let forms = generate_forms("smelled");
        assert!(!forms.contains(&"smelle".to_string()));
    }

    #[test]
    fn forms_are_unique_and_non_empty() {
        for word in ["s", "e", "y", "seed", "ingots", "bed"] {
            let forms = generate_forms(word);
            assert_eq!(forms[0], word);
            assert!(forms.iter().all(|f| !f.is_empty()));
            let mut sorted = forms.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), forms.len(), "duplicates for {word}");
        }
    }

    #[test]
    fn empty_input_has_no_forms() {
        assert!(generate_forms("").is_empty());
    }

    #[test]
    fn single_word_detection() {
        assert!(is_single_word("iron"));
        assert!(!is_single_word("iron ore"));
        assert!(!is_single_word("铁"));
        assert!(!is_single_word("tnt2"));
        assert!(!is_single_word(""));
    }
}
