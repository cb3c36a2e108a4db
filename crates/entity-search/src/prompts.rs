//! Prompt templates for entity search
//!
//! PRIVATE MODULE - Not exported from crate

pub const EXTRACT_JSON_SYSTEM: &str = include_str!("../assets/prompts/extract_json_system.txt");

pub const CLASSIFY_ENTITY: &str = include_str!("../assets/prompts/classify_entity.txt");

pub const VALIDATE_ENTITY_SYSTEM: &str =
    include_str!("../assets/prompts/validate_entity_system.txt");
pub const VALIDATE_ENTITY: &str = include_str!("../assets/prompts/validate_entity.txt");

// Agent side: system instructions and the per-attempt task
pub const AGENT_INSTRUCTIONS: &str = include_str!("../assets/prompts/agent_instructions.txt");
pub const ENTITY_SEARCH: &str = include_str!("../assets/prompts/entity_search.txt");

/// Replace each `{key}` in `template`; `{{...}}` placeholders meant for the model are left alone
pub fn format_prompt(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_prompt() {
        let template = "State: {state}, name: {registered_name}";
        let result = format_prompt(template, &[("state", "Utah"), ("registered_name", "INC")]);
        assert_eq!(result, "State: Utah, name: INC");
    }

    #[test]
    fn test_model_placeholders_survive() {
        let result = format_prompt(CLASSIFY_ENTITY, &[("state", "Utah")]);
        assert!(result.contains("{{Registered name for the entity}}"));
        assert!(result.contains("state of Utah"));
    }

    #[test]
    #[allow(clippy::len_zero)]
    fn test_prompts_load() {
        assert!(EXTRACT_JSON_SYSTEM.len() > 0);
        assert!(CLASSIFY_ENTITY.contains("{entity_data}"));
        assert!(VALIDATE_ENTITY.contains("{business_data}"));
        assert!(VALIDATE_ENTITY_SYSTEM.len() > 0);
        assert!(AGENT_INSTRUCTIONS.contains("{current_url}"));
        assert!(ENTITY_SEARCH.contains("{tested_entities}"));
    }
}
