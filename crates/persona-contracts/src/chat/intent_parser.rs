use std::collections::BTreeMap;

use serde_json::Value;

use crate::studio::SelectionChange;

use super::command_registry::{
    AxisCommandSpec, CommandSpec, AXIS_COMMANDS, NO_ARG_COMMANDS, RAW_ARG_COMMANDS,
    SINGLE_PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub settings_update: BTreeMap<String, Value>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            settings_update: BTreeMap::new(),
            command_args: BTreeMap::new(),
        }
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn find_axis(command: &str) -> Option<&'static AxisCommandSpec> {
    AXIS_COMMANDS.iter().find(|spec| spec.command == command)
}

fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    split_args(arg).join(" ")
}

/// Bare text: every token naming a selection value updates that axis, then a
/// generation is requested. Later tokens win when two name the same axis.
fn parse_quick_generate(text: &str, raw_trimmed: &str) -> Intent {
    let mut intent = Intent::new("generate", text);
    let mut unmatched = Vec::new();
    for token in split_args(raw_trimmed) {
        if token.eq_ignore_ascii_case("generate") {
            continue;
        }
        match SelectionChange::guess(&token) {
            Some(change) => {
                intent.settings_update.insert(
                    change.axis().key().to_string(),
                    Value::String(change.value_label().to_string()),
                );
            }
            None => unmatched.push(Value::String(token)),
        }
    }
    if !unmatched.is_empty() {
        intent
            .command_args
            .insert("unmatched".to_string(), Value::Array(unmatched));
    }
    intent
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let remainder = &slash_tail[command_len..];
            let arg = remainder.trim();

            if let Some(spec) = find_axis(&command) {
                let mut intent = Intent::new("select", text);
                intent.settings_update.insert(
                    spec.axis.key().to_string(),
                    Value::String(arg.to_string()),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
                let key = match action {
                    "set_model" => "model",
                    "select_key" => "key",
                    _ => "entry",
                };
                let mut intent = Intent::new(action, text);
                intent
                    .command_args
                    .insert(key.to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "path".to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    parse_quick_generate(text, raw_trimmed)
}
