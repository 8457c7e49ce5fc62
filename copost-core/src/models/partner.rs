use serde::{Deserialize, Serialize};

/// Id of the partner that represents the authoring company itself.
pub const SELF_PARTNER_ID: &str = "self";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumption {
    #[serde(alias = "assumption")]
    pub text: String,
}

impl Assumption {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub assumptions: Vec<Assumption>,
}

fn default_weight() -> u32 {
    1
}

impl Partner {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: String::new(),
            weight: default_weight(),
            twitter: None,
            assumptions: Vec::new(),
        }
    }

    pub fn is_self(&self) -> bool {
        self.id == SELF_PARTNER_ID
    }
}
