use std::fmt::Write;

use super::types::{Persona, ProductContext};

fn bullet_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{title}:");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

/// System instruction for the agent playing `persona`
pub fn build_system_prompt(persona: &Persona, product: &ProductContext) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "You are {}, {} at {}. A salesperson is calling you about {}.",
        persona.name, persona.role, persona.company, product.name
    );
    let _ = writeln!(
        out,
        "Stay in character for the whole call and never reveal that you are an AI."
    );
    if !persona.personality.is_empty() {
        let _ = writeln!(out, "Personality: {}", persona.personality);
    }
    bullet_list(&mut out, "Your pain points", &persona.pain_points);
    bullet_list(&mut out, "Objections you raise", &persona.objections);

    out.push('\n');
    if !product.description.is_empty() {
        let _ = writeln!(out, "What you know about the offer: {}", product.description);
    }
    bullet_list(&mut out, "Features they may mention", &product.key_features);

    out.push('\n');
    let language = if persona.language.is_empty() {
        "the salesperson's language"
    } else {
        persona.language.as_str()
    };
    let _ = writeln!(
        out,
        "Speak only {language}. Keep answers short and natural, as on a real phone call. \
         Let the salesperson lead; do not buy unless they earn it."
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_persona_and_product() {
        let persona = Persona {
            name: "Kari".to_string(),
            role: "CFO".to_string(),
            company: "Fjord Logistics".to_string(),
            objections: vec!["Too expensive".to_string()],
            language: "Norwegian".to_string(),
            ..Persona::default()
        };
        let product = ProductContext {
            name: "RouteWise".to_string(),
            ..ProductContext::default()
        };

        let prompt = build_system_prompt(&persona, &product);
        assert!(prompt.contains("You are Kari, CFO at Fjord Logistics"));
        assert!(prompt.contains("RouteWise"));
        assert!(prompt.contains("- Too expensive"));
        assert!(prompt.contains("never reveal that you are an AI"));
        assert!(prompt.contains("Speak only Norwegian"));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let prompt = build_system_prompt(&Persona::default(), &ProductContext::default());
        assert!(!prompt.contains("Objections you raise"));
        assert!(prompt.contains("the salesperson's language"));
    }
}
