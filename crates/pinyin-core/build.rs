use toml::Value;

const SETTINGS: &str = "src/default_settings.toml";
const POLYPHONES: &str = "src/polyphone/default_polyphones.toml";

const SETTINGS_TABLES: [&str; 3] = ["cache", "learning", "resolver"];
const RULE_FIELDS: [&str; 4] = ["char", "kind", "target", "pinyin"];
const RULE_KINDS: [&str; 4] = ["word", "preceding", "following", "pattern"];

fn main() {
    println!("cargo:rerun-if-changed={SETTINGS}");
    println!("cargo:rerun-if-changed={POLYPHONES}");

    let settings = parse(SETTINGS, include_str!("src/default_settings.toml"));
    for table in SETTINGS_TABLES {
        if !settings.get(table).is_some_and(Value::is_table) {
            panic!("{SETTINGS} is missing the [{table}] table");
        }
    }

    let polyphones = parse(
        POLYPHONES,
        include_str!("src/polyphone/default_polyphones.toml"),
    );
    let Some(rules) = polyphones.get("rules").and_then(Value::as_array) else {
        panic!("{POLYPHONES} has no [[rules]]");
    };
    for (index, rule) in rules.iter().enumerate() {
        check_rule(index, rule);
    }
}

fn parse(path: &str, content: &str) -> Value {
    match content.parse::<Value>() {
        Ok(value) => value,
        Err(e) => panic!("{path} contains invalid TOML: {e}"),
    }
}

/// Shape only; pinyin and regex validity are checked when the rule set loads.
fn check_rule(index: usize, rule: &Value) {
    for field in RULE_FIELDS {
        if rule.get(field).and_then(Value::as_str).is_none() {
            panic!("{POLYPHONES}: rule {index} needs a string `{field}`");
        }
    }
    let ch = rule.get("char").and_then(Value::as_str).unwrap_or_default();
    if ch.chars().count() != 1 {
        panic!("{POLYPHONES}: rule {index} `char` must be one character, got {ch:?}");
    }
    let kind = rule.get("kind").and_then(Value::as_str).unwrap_or_default();
    if !RULE_KINDS.contains(&kind) {
        panic!("{POLYPHONES}: rule {index} has unknown kind {kind:?}");
    }
    if let Some(weight) = rule.get("weight") {
        if !weight.as_float().is_some_and(|w| w > 0.0) {
            panic!("{POLYPHONES}: rule {index} weight must be a positive float");
        }
    }
}
