// src/cli/models.rs — `selfevolve models`: list the supported model identifiers

use crate::provider::LlmModel;

pub fn render_models() -> String {
    let width = LlmModel::ALL
        .iter()
        .map(|m| m.as_str().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for model in LlmModel::ALL {
        let provider = model.provider();
        out.push_str(&format!(
            "{:<width$}  {:<8}  {}\n",
            model.as_str(),
            provider.as_str(),
            provider.required_env().join(", ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_every_model() {
        let out = render_models();
        assert_eq!(out.lines().count(), LlmModel::ALL.len());
        assert!(out.contains("gemini-1.5-pro"));
        let bedrock = out
            .lines()
            .find(|l| l.starts_with("bedrock-anthropic.claude-v2:1"))
            .unwrap();
        assert!(bedrock.contains("AWS_ACCESS_KEY_ID"));
    }
}
