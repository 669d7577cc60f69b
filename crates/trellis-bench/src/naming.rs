#![forbid(unsafe_code)]

//! Module id derivation.
//!
//! A module's id comes from its registered name: the first `Module` in the
//! name is removed and the rest is camel-cased, so `ColorPickerModule`
//! becomes `colorPicker` and `TestModule2` becomes `test2`.

/// Id for a module registered under `name`.
#[must_use]
pub fn module_id(name: &str) -> String {
    camel_case(&name.replacen("Module", "", 1))
}

/// Lower camel case over the words of `input`.
///
/// Words break at non-alphanumeric characters, at lower-to-upper
/// transitions, between letters and digits, and before the last capital of
/// an acronym that runs into a capitalized word (`HTTPServer` → `HTTP`,
/// `Server`).
#[must_use]
pub fn camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (index, word) in words(input).iter().enumerate() {
        let lower = word.to_lowercase();
        if index == 0 {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Upper,
    Lower,
    Digit,
}

fn classify(c: char) -> Option<Class> {
    if c.is_numeric() {
        Some(Class::Digit)
    } else if c.is_uppercase() {
        Some(Class::Upper)
    } else if c.is_alphabetic() {
        Some(Class::Lower)
    } else {
        None
    }
}

fn words(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev: Option<Class> = None;

    for (i, &c) in chars.iter().enumerate() {
        let Some(class) = classify(c) else {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev = None;
            continue;
        };
        if let Some(prev) = prev {
            let next = chars.get(i + 1).copied().and_then(classify);
            let boundary = match (prev, class) {
                (Class::Digit, Class::Upper | Class::Lower) => true,
                (Class::Upper | Class::Lower, Class::Digit) => true,
                (Class::Lower, Class::Upper) => true,
                (Class::Upper, Class::Upper) => next == Some(Class::Lower),
                _ => false,
            };
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
        prev = Some(class);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_suffix_is_dropped() {
        assert_eq!(module_id("ColorPickerModule"), "colorPicker");
        assert_eq!(module_id("TestModule"), "test");
        assert_eq!(module_id("TestModule2"), "test2");
        assert_eq!(module_id("Sidebar"), "sidebar");
    }

    #[test]
    fn only_first_module_is_removed() {
        assert_eq!(module_id("ModuleLoaderModule"), "loaderModule");
    }

    #[test]
    fn camel_case_splits_like_identifier_words() {
        assert_eq!(camel_case("HTTPServer"), "httpServer");
        assert_eq!(camel_case("color_picker"), "colorPicker");
        assert_eq!(camel_case("--top bar--"), "topBar");
        assert_eq!(camel_case("abc123def"), "abc123Def");
        assert_eq!(camel_case("XMLHttpRequest"), "xmlHttpRequest");
        assert_eq!(camel_case(""), "");
    }
}
