use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

use anyhow::bail;

/// One configured model: the name it is served under and the artifact
/// directory (plain path or `file://` URI) its estimator is loaded from.
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub models: Vec<ModelSource>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = env::var("SERVER_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".into())
            .parse()
            .unwrap_or_else(|_| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080));

        let models_spec = env::var("MODELS").unwrap_or_else(|_| "model=./model".to_string());
        let models = parse_model_sources(&models_spec)?;

        Ok(Self {
            listen_addr,
            models,
        })
    }
}

/// Parses `name=dir;name=dir` pairs. Names must be unique and non-empty.
pub fn parse_model_sources(spec: &str) -> anyhow::Result<Vec<ModelSource>> {
    let mut models = Vec::new();
    for entry in spec.split(';').filter(|s| !s.trim().is_empty()) {
        let Some((name, source)) = entry.split_once('=') else {
            bail!("invalid MODELS entry {entry:?}: expected name=source");
        };
        let name = name.trim();
        let source = source.trim();
        if name.is_empty() || source.is_empty() {
            bail!("invalid MODELS entry {entry:?}: empty name or source");
        }
        if models.iter().any(|m: &ModelSource| m.name == name) {
            bail!("duplicate model name {name:?} in MODELS");
        }
        models.push(ModelSource {
            name: name.to_string(),
            source: source.to_string(),
        });
    }
    if models.is_empty() {
        bail!("MODELS must configure at least one model");
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_sources() {
        let models = parse_model_sources("iris=./models/iris;wine=file:///srv/wine").unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "iris");
        assert_eq!(models[1].source, "file:///srv/wine");
    }

    #[test]
    fn trims_whitespace_and_skips_empty_entries() {
        let models = parse_model_sources(" iris = ./iris ; ").unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "iris");
        assert_eq!(models[0].source, "./iris");
    }

    #[test]
    fn rejects_duplicate_names() {
        assert!(parse_model_sources("a=./x;a=./y").is_err());
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(parse_model_sources("justaname").is_err());
    }

    #[test]
    fn rejects_empty_spec() {
        assert!(parse_model_sources("  ").is_err());
    }
}
