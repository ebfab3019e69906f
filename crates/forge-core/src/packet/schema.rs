//! Caller-owned packet schemas.
//!
//! A [`PacketSchema`] is a small declarative rule set over the JSON the
//! synthesizer returns. It validates the reply and also renders a shape
//! description for the synthesis prompt, so the model is asked for exactly
//! what will be checked.

use serde_json::{Map, Value};

use super::{BuildPacket, ProductType};
use crate::generation::OutputSchema;

/// Expected JSON type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text {
        non_empty: bool,
    },
    List {
        min_items: usize,
        max_items: Option<usize>,
        /// When set, every item must be an object satisfying these rules.
        items: Option<Vec<FieldRule>>,
    },
    Object(Vec<FieldRule>),
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    /// Required, non-empty string.
    pub fn text(name: &str) -> Self {
        Self::required(name, FieldKind::Text { non_empty: true })
    }

    /// Required string that may be empty.
    pub fn any_text(name: &str) -> Self {
        Self::required(name, FieldKind::Text { non_empty: false })
    }

    /// Required array with at least `min_items` entries.
    pub fn list(name: &str, min_items: usize) -> Self {
        Self::required(
            name,
            FieldKind::List {
                min_items,
                max_items: None,
                items: None,
            },
        )
    }

    pub fn object(name: &str, fields: Vec<FieldRule>) -> Self {
        Self::required(name, FieldKind::Object(fields))
    }

    pub fn any(name: &str) -> Self {
        Self::required(name, FieldKind::Any)
    }

    fn required(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Cap a list field. No effect on other kinds.
    pub fn max_items(mut self, max: usize) -> Self {
        if let FieldKind::List { max_items, .. } = &mut self.kind {
            *max_items = Some(max);
        }
        self
    }

    /// Require list items to be objects matching `fields`. No effect on
    /// other kinds.
    pub fn of_objects(mut self, fields: Vec<FieldRule>) -> Self {
        if let FieldKind::List { items, .. } = &mut self.kind {
            *items = Some(fields);
        }
        self
    }
}

/// Validation rules for the build packet of one product type.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketSchema {
    name: String,
    rules: Vec<FieldRule>,
}

impl PacketSchema {
    pub fn new(name: impl Into<String>, rules: Vec<FieldRule>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// The default schema for a product type.
    pub fn for_product(product_type: ProductType) -> Self {
        let mut rules = vec![
            FieldRule::text("title"),
            FieldRule::text("promise"),
            FieldRule::any_text("audience"),
        ];

        let modules = || {
            FieldRule::list("modules", 1).of_objects(vec![
                FieldRule::text("title"),
                FieldRule::any_text("summary").optional(),
                FieldRule::list("lessons", 1),
                FieldRule::list("source_ids", 0).optional(),
            ])
        };
        let sections = || {
            FieldRule::list("sections", 1).of_objects(vec![
                FieldRule::text("heading"),
                FieldRule::any_text("body").optional(),
                FieldRule::list("source_ids", 0).optional(),
            ])
        };

        match product_type {
            ProductType::Course => rules.push(modules()),
            ProductType::MiniCourse => rules.push(modules().max_items(5)),
            ProductType::Guide => rules.push(sections()),
            ProductType::Checklist => rules.push(FieldRule::list("items", 1)),
            ProductType::LeadMagnet => {
                rules.push(sections());
                rules.push(FieldRule::text("call_to_action"));
            }
        }

        Self::new(format!("{product_type}_packet"), rules)
    }

    /// Human-readable shape description for prompts.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        describe_rules(&self.rules, 0, &mut out);
        out
    }

    /// Check `value` against the rules, reporting the first violation.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let object = value
            .as_object()
            .ok_or_else(|| "packet must be a JSON object".to_string())?;
        check_object("", object, &self.rules)
    }
}

impl OutputSchema for PacketSchema {
    type Output = BuildPacket;

    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, value: Value) -> Result<BuildPacket, String> {
        self.validate(&value)?;
        Ok(BuildPacket::new(value))
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

fn check_object(
    path: &str,
    object: &Map<String, Value>,
    rules: &[FieldRule],
) -> Result<(), String> {
    for rule in rules {
        let field_path = join_path(path, &rule.name);
        match object.get(&rule.name) {
            None | Some(Value::Null) if rule.required => {
                return Err(format!("missing required field `{field_path}`"));
            }
            None | Some(Value::Null) => {}
            Some(value) => check_value(&field_path, value, &rule.kind)?,
        }
    }
    Ok(())
}

fn check_value(path: &str, value: &Value, kind: &FieldKind) -> Result<(), String> {
    match kind {
        FieldKind::Any => Ok(()),
        FieldKind::Text { non_empty } => {
            let text = value
                .as_str()
                .ok_or_else(|| format!("`{path}` must be a string"))?;
            if *non_empty && text.trim().is_empty() {
                return Err(format!("`{path}` must not be empty"));
            }
            Ok(())
        }
        FieldKind::Object(rules) => {
            let object = value
                .as_object()
                .ok_or_else(|| format!("`{path}` must be an object"))?;
            check_object(path, object, rules)
        }
        FieldKind::List {
            min_items,
            max_items,
            items,
        } => {
            let list = value
                .as_array()
                .ok_or_else(|| format!("`{path}` must be an array"))?;
            if list.len() < *min_items {
                return Err(format!(
                    "`{path}` must have at least {min_items} item(s), got {}",
                    list.len()
                ));
            }
            if let Some(max) = max_items {
                if list.len() > *max {
                    return Err(format!(
                        "`{path}` must have at most {max} item(s), got {}",
                        list.len()
                    ));
                }
            }
            if let Some(rules) = items {
                for (i, item) in list.iter().enumerate() {
                    let item_path = format!("{path}[{i}]");
                    let object = item
                        .as_object()
                        .ok_or_else(|| format!("`{item_path}` must be an object"))?;
                    check_object(&item_path, object, rules)?;
                }
            }
            Ok(())
        }
    }
}

fn describe_rules(rules: &[FieldRule], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for rule in rules {
        let presence = if rule.required { "required" } else { "optional" };
        let (kind, children) = match &rule.kind {
            FieldKind::Any => ("any JSON value".to_string(), None),
            FieldKind::Text { non_empty: true } => ("non-empty string".to_string(), None),
            FieldKind::Text { non_empty: false } => ("string".to_string(), None),
            FieldKind::Object(fields) => ("object".to_string(), Some(fields)),
            FieldKind::List {
                min_items,
                max_items,
                items,
            } => {
                let of = if items.is_some() { "objects" } else { "values" };
                let bounds = match (min_items, max_items) {
                    (0, None) => String::new(),
                    (min, None) => format!(", at least {min}"),
                    (min, Some(max)) => format!(", {min} to {max}"),
                };
                (format!("array of {of}{bounds}"), items.as_ref())
            }
        };
        out.push_str(&format!("{indent}- {} ({kind}, {presence})", rule.name));
        match children {
            Some(fields) => {
                out.push_str(", each with:\n");
                describe_rules(fields, depth + 1, out);
            }
            None => out.push('\n'),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn course_packet() -> Value {
        json!({
            "title": "Yoga From Zero",
            "promise": "Build a daily ten minute practice in three weeks",
            "audience": "desk workers who have never done yoga",
            "modules": [
                {
                    "title": "Week 1: Breath",
                    "lessons": ["Box breathing", "Seated twist"],
                    "source_ids": ["v1"]
                }
            ]
        })
    }

    #[test]
    fn accepts_valid_course_packet() {
        let schema = PacketSchema::for_product(ProductType::Course);
        let packet = schema.check(course_packet()).unwrap();
        assert_eq!(packet.title(), Some("Yoga From Zero"));
        assert_eq!(schema.name(), "course_packet");
    }

    #[test]
    fn rejects_non_object() {
        let schema = PacketSchema::for_product(ProductType::Guide);
        assert_eq!(
            schema.check(json!(["a"])).unwrap_err(),
            "packet must be a JSON object"
        );
    }

    #[test]
    fn reports_missing_nested_field_with_path() {
        let mut packet = course_packet();
        packet["modules"][0]
            .as_object_mut()
            .unwrap()
            .remove("lessons");
        let err = PacketSchema::for_product(ProductType::Course)
            .check(packet)
            .unwrap_err();
        assert_eq!(err, "missing required field `modules[0].lessons`");
    }

    #[test]
    fn reports_empty_required_text() {
        let mut packet = course_packet();
        packet["title"] = json!("  ");
        let err = PacketSchema::for_product(ProductType::Course)
            .check(packet)
            .unwrap_err();
        assert_eq!(err, "`title` must not be empty");
    }

    #[test]
    fn null_counts_as_missing() {
        let mut packet = course_packet();
        packet["promise"] = Value::Null;
        let err = PacketSchema::for_product(ProductType::Course)
            .check(packet)
            .unwrap_err();
        assert_eq!(err, "missing required field `promise`");
    }

    #[test]
    fn mini_course_caps_modules() {
        let mut packet = course_packet();
        let module = packet["modules"][0].clone();
        packet["modules"] = json!(vec![module; 6]);
        let err = PacketSchema::for_product(ProductType::MiniCourse)
            .check(packet)
            .unwrap_err();
        assert_eq!(err, "`modules` must have at most 5 item(s), got 6");
    }

    #[test]
    fn lead_magnet_requires_call_to_action() {
        let packet = json!({
            "title": "5 Stretches",
            "promise": "Loosen up",
            "audience": "",
            "sections": [{ "heading": "Neck roll" }]
        });
        let err = PacketSchema::for_product(ProductType::LeadMagnet)
            .check(packet)
            .unwrap_err();
        assert_eq!(err, "missing required field `call_to_action`");
    }

    #[test]
    fn checklist_items_accept_any_values() {
        let packet = json!({
            "title": "Mat checklist",
            "promise": "Never forget gear",
            "audience": "beginners",
            "items": ["mat", { "label": "strap" }]
        });
        assert!(PacketSchema::for_product(ProductType::Checklist).check(packet).is_ok());
    }

    #[test]
    fn custom_schema_object_rule() {
        let schema = PacketSchema::new(
            "custom",
            vec![FieldRule::object("pricing", vec![FieldRule::any("amount")])],
        );
        let err = schema.check(json!({ "pricing": "free" })).unwrap_err();
        assert_eq!(err, "`pricing` must be an object");
        assert!(schema.check(json!({ "pricing": { "amount": 29 } })).is_ok());
    }

    #[test]
    fn describe_renders_nested_shape() {
        let text = PacketSchema::for_product(ProductType::MiniCourse).describe();
        assert!(text.contains("- title (non-empty string, required)\n"));
        assert!(text.contains("- modules (array of objects, 1 to 5, required), each with:\n"));
        assert!(text.contains("  - lessons (array of values, at least 1, required)\n"));
        assert!(text.contains("  - source_ids (array of values, optional)\n"));
    }
}
