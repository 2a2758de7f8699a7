//! Caption, alt text and headline generation from labels.

use crate::naming::title_case;

/// Caption for a newly processed image: `"<Folder Title> - <Top Labels>"`.
pub fn caption_for(folder_name: &str, labels: &[String]) -> String {
    let folder_title = title_case(folder_name);
    let top = labels.iter().take(3).map(String::as_str).collect::<Vec<_>>().join(" ");
    if top.is_empty() {
        folder_title
    } else {
        format!("{} - {}", folder_title, title_case(&top))
    }
}

pub fn generate_alt_text(caption: &str, keywords: &[String]) -> String {
    if !caption.trim().is_empty() {
        format!("Detailed view of {}", caption.to_lowercase())
    } else if !keywords.is_empty() {
        let top = keywords.iter().take(3).map(String::as_str).collect::<Vec<_>>();
        format!("Close-up of {}", top.join(" "))
    } else {
        "Henna design close-up".to_string()
    }
}

pub fn generate_headline(caption: &str, keywords: &[String]) -> String {
    if let Some(first) = keywords.first().filter(|k| !k.is_empty()) {
        capitalize(first)
    } else if let Some(word) = caption.split_whitespace().next() {
        capitalize(word)
    } else {
        "Henna Art".to_string()
    }
}

/// Upper-case the first character, lower-case the rest.
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_caption() {
        assert_eq!(
            caption_for("bridal henna", &labels(&["hand", "body art", "pattern", "skin"])),
            "Bridal Henna - Hand Body Art Pattern"
        );
        assert_eq!(caption_for("feet", &[]), "Feet");
    }

    #[test]
    fn test_alt_text_fallbacks() {
        assert_eq!(
            generate_alt_text("Bridal Henna - Hand", &[]),
            "Detailed view of bridal henna - hand"
        );
        assert_eq!(
            generate_alt_text("", &labels(&["hand", "pattern", "skin", "art"])),
            "Close-up of hand pattern skin"
        );
        assert_eq!(generate_alt_text(" ", &[]), "Henna design close-up");
    }

    #[test]
    fn test_headline_fallbacks() {
        assert_eq!(generate_headline("x", &labels(&["mEHNDI", "hand"])), "Mehndi");
        assert_eq!(generate_headline("floral vine", &[]), "Floral");
        assert_eq!(generate_headline("", &[]), "Henna Art");
    }
}
