use serde::{Deserialize, Serialize};

/// A named expression whose source is an ordered run of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expression {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: Vec<ExpressionSegment>,
    #[serde(default)]
    pub return_type: String,
}

impl Expression {
    /// Source text with variable references inlined by display name.
    pub fn source_text(&self) -> String {
        self.content.iter().map(ExpressionSegment::value).collect()
    }

    /// Variable ids referenced by this expression, in order of appearance.
    pub fn variable_ids(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|segment| match segment {
            ExpressionSegment::Variable { variable_id, .. } => variable_id.as_deref(),
            ExpressionSegment::Text { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExpressionSegment {
    Text {
        value: String,
    },
    Variable {
        value: String,
        #[serde(
            rename = "variableId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        variable_id: Option<String>,
    },
}

impl ExpressionSegment {
    pub fn text(value: impl Into<String>) -> Self {
        ExpressionSegment::Text {
            value: value.into(),
        }
    }

    pub fn variable(value: impl Into<String>, variable_id: impl Into<String>) -> Self {
        ExpressionSegment::Variable {
            value: value.into(),
            variable_id: Some(variable_id.into()),
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ExpressionSegment::Text { value } | ExpressionSegment::Variable { value, .. } => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_text_concatenates_in_order() {
        let expression = Expression {
            id: "e1".into(),
            name: "check".into(),
            content: vec![
                ExpressionSegment::text("if ("),
                ExpressionSegment::variable("P_J_Input", "v1"),
                ExpressionSegment::text(" != null) return true;"),
            ],
            return_type: "boolean".into(),
        };

        assert_eq!(expression.source_text(), "if (P_J_Input != null) return true;");
        assert_eq!(expression.variable_ids().collect::<Vec<_>>(), vec!["v1"]);
    }

    #[test]
    fn segments_use_type_tag() {
        let json = serde_json::to_value(ExpressionSegment::variable("x", "v1")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "variable", "value": "x", "variableId": "v1" })
        );
    }
}
