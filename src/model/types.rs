use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub name: String,
    pub ready: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelList {
    pub models: Vec<String>,
}
