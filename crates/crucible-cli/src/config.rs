//! The YAML run file and the case list.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crucible_core::{CaseInput, Criterion, EvaluationPrompts, SuiteKind};
use crucible_runtime::{
    ApiCredential, CredentialSource, PipelineCaseRunner, ProviderOptions, ProviderRouter,
    RuntimeConfig,
};

/// Everything a run needs besides the case list.
///
/// ```yaml
/// suite: answer
/// provider:
///   id: openai
///   model: gpt-4o
/// knowledge_base_file: kb.md
/// system_prompt: You are a helpful support agent.
/// evaluation_prompts_file: prompts.yaml
/// evaluation_prompts:
///   Groundedness: "Is this supported by {knowledgeBase}? {textToEvaluate}"
/// runtime:
///   concurrency_limit: 2
///   evaluation_delay: 250ms
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    pub suite: SuiteKind,
    pub provider: ProviderSection,
    #[serde(default)]
    pub knowledge_base: Option<String>,
    /// Read relative to the run file
    #[serde(default)]
    pub knowledge_base_file: Option<PathBuf>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub generation_template: Option<String>,
    /// YAML mapping of criterion name to template, read relative to the
    /// run file
    #[serde(default)]
    pub evaluation_prompts_file: Option<PathBuf>,
    /// Criterion display name to template; wins over the file
    #[serde(default)]
    pub evaluation_prompts: BTreeMap<String, String>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    pub id: String,
    #[serde(default)]
    pub model: String,
    /// Falls back to the provider's environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub deployment_name: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

/// Environment variable holding the API key for a built-in provider.
pub fn api_key_env(provider_id: &str) -> Option<&'static str> {
    match provider_id {
        "openai" => Some("OPENAI_API_KEY"),
        "azure-openai" => Some("AZURE_OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "gemini" => Some("GEMINI_API_KEY"),
        _ => None,
    }
}

impl RunFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run file {}", path.display()))?;
        let mut run_file = Self::from_yaml(&text)
            .with_context(|| format!("Invalid run file {}", path.display()))?;
        run_file.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(run_file)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let run_file: Self = serde_yaml::from_str(yaml)?;
        if run_file.knowledge_base.is_some() && run_file.knowledge_base_file.is_some() {
            bail!("set either knowledge_base or knowledge_base_file, not both");
        }
        Ok(run_file)
    }

    /// Provider options, sourcing the key from the provider's environment
    /// variable when the file has none.
    pub fn provider_options(&self) -> Result<ProviderOptions> {
        let provider = &self.provider;

        let credential = match (&provider.api_key, api_key_env(&provider.id)) {
            (Some(key), _) => ApiCredential::new(key.as_str(), CredentialSource::Config),
            (None, Some(var)) => ApiCredential::from_env(var).with_context(|| {
                format!(
                    "no API key for provider '{}': set provider.api_key or {}",
                    provider.id, var
                )
            })?,
            (None, None) => bail!("no API key for provider '{}': set provider.api_key", provider.id),
        };

        let mut options =
            ProviderOptions::with_credential(provider.id.as_str(), provider.model.as_str(), credential);
        options.endpoint = provider.endpoint.clone();
        options.deployment_name = provider.deployment_name.clone();
        if let Some(max_tokens) = provider.max_tokens {
            options.max_tokens = max_tokens;
        }
        options.temperature = provider.temperature;
        Ok(options)
    }

    pub fn knowledge_base(&self) -> Result<Option<String>> {
        match (&self.knowledge_base, &self.knowledge_base_file) {
            (Some(text), _) => Ok(Some(text.clone())),
            (None, Some(file)) => {
                let path = self.base_dir.join(file);
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read knowledge base {}", path.display()))?;
                Ok(Some(text))
            }
            (None, None) => Ok(None),
        }
    }

    pub fn prompt_overrides(&self) -> Result<BTreeMap<Criterion, String>> {
        let mut overrides = BTreeMap::new();

        if let Some(file) = &self.evaluation_prompts_file {
            let path = self.base_dir.join(file);
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read evaluation prompts {}", path.display()))?;
            let prompts = EvaluationPrompts::from_yaml(&text)
                .with_context(|| format!("Invalid evaluation prompts {}", path.display()))?;
            for (criterion, template) in prompts.iter() {
                overrides.insert(criterion, template.to_string());
            }
        }

        for (name, template) in &self.evaluation_prompts {
            let criterion: Criterion = name.parse()?;
            overrides.insert(criterion, template.clone());
        }
        Ok(overrides)
    }

    /// Build the per-case pipeline described by this file.
    pub fn pipeline(
        &self,
        router: Arc<ProviderRouter>,
        options: Arc<ProviderOptions>,
    ) -> Result<PipelineCaseRunner> {
        let mut builder = PipelineCaseRunner::builder(self.suite, router, options)
            .prompt_overrides(self.prompt_overrides()?)
            .evaluation_delay(self.runtime.evaluation_delay);

        if let Some(template) = &self.generation_template {
            builder = builder.generation_template(template.as_str());
        }
        if let Some(knowledge_base) = self.knowledge_base()? {
            builder = builder.knowledge_base(knowledge_base);
        }
        if let Some(system_prompt) = &self.system_prompt {
            builder = builder.system_prompt(system_prompt.as_str());
        }

        Ok(builder.build()?)
    }
}

/// One case per non-blank line; lines starting with `#` are comments.
pub fn read_cases(suite: SuiteKind, text: &str) -> Result<Vec<CaseInput>> {
    let cases: Vec<CaseInput> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| CaseInput::parse(suite, line))
        .collect();

    if cases.is_empty() {
        bail!("the case file contains no test cases");
    }
    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const RUN_FILE: &str = r#"
suite: answer
provider:
  id: openai
  model: gpt-4o
  temperature: 0.2
knowledge_base: Refunds are accepted within 30 days.
system_prompt: You are a support agent.
evaluation_prompts:
  Groundedness: "Is {textToEvaluate} supported by {knowledgeBase}?"
runtime:
  concurrency_limit: 3
  evaluation_delay: 100ms
"#;

    #[test]
    fn test_parse_run_file() {
        let run_file = RunFile::from_yaml(RUN_FILE).unwrap();

        assert_eq!(run_file.suite, SuiteKind::Answer);
        assert_eq!(run_file.provider.id, "openai");
        assert_eq!(run_file.runtime.concurrency_limit, 3);
        assert_eq!(run_file.runtime.evaluation_delay, Duration::from_millis(100));
        assert_eq!(
            run_file.knowledge_base().unwrap().as_deref(),
            Some("Refunds are accepted within 30 days.")
        );

        let overrides = run_file.prompt_overrides().unwrap();
        assert!(overrides.contains_key(&Criterion::Groundedness));
    }

    #[test]
    fn test_api_key_falls_back_to_environment() {
        let run_file = RunFile::from_yaml(RUN_FILE).unwrap();

        std::env::remove_var("OPENAI_API_KEY");
        let err = run_file.provider_options().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        std::env::set_var("OPENAI_API_KEY", "sk-env");
        let options = run_file.provider_options().unwrap();
        std::env::remove_var("OPENAI_API_KEY");

        assert_eq!(options.api_key().expose(), "sk-env");
        assert_eq!(options.api_key().source(), CredentialSource::Environment);
        assert_eq!(options.temperature, Some(0.2));
    }

    #[test]
    fn test_api_key_in_file_wins() {
        let yaml = r#"
suite: persona
provider:
  id: azure-openai
  api_key: from-file
  endpoint: https://acme.openai.azure.com
  deployment_name: prod
"#;
        let run_file = RunFile::from_yaml(yaml).unwrap();
        let options = run_file.provider_options().unwrap();

        assert_eq!(options.api_key().expose(), "from-file");
        assert_eq!(options.deployment(), Some("prod"));
    }

    #[test]
    fn test_rejects_unknown_fields_and_criteria() {
        assert!(RunFile::from_yaml("suite: answer\nprovider: {id: openai}\nretries: 3\n").is_err());

        let run_file = RunFile::from_yaml(
            "suite: answer\nprovider: {id: openai}\nevaluation_prompts: {Tone: \"{textToEvaluate}\"}\n",
        )
        .unwrap();
        assert!(run_file.prompt_overrides().is_err());
    }

    #[test]
    fn test_evaluation_prompts_file_merges_with_inline() {
        let dir = std::env::temp_dir().join(format!("crucible-run-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("prompts.yaml"),
            "Age: \"File age: {textToEvaluate}\"\nGroundedness: \"File grounded: {textToEvaluate}\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("run.yaml"),
            "suite: answer\nprovider: {id: openai}\nevaluation_prompts_file: prompts.yaml\nevaluation_prompts:\n  Groundedness: \"Inline: {textToEvaluate}\"\n",
        )
        .unwrap();

        let run_file = RunFile::load(&dir.join("run.yaml")).unwrap();
        let overrides = run_file.prompt_overrides().unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(overrides[&Criterion::Age], "File age: {textToEvaluate}");
        assert_eq!(overrides[&Criterion::Groundedness], "Inline: {textToEvaluate}");
    }

    #[test]
    fn test_read_cases_skips_blanks_and_comments() {
        let text = "# questions\nWhat is the refund window?\n\n   \nDo you ship abroad?\n";
        let cases = read_cases(SuiteKind::Answer, text).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].to_string(), "Do you ship abroad?");
    }

    #[test]
    fn test_read_cases_ad_copy_pairs() {
        let cases = read_cases(SuiteKind::AdCopy, "Nurse | Night shifts, ICU\n").unwrap();
        assert_eq!(
            cases[0],
            CaseInput::JobDescription {
                title: "Nurse".to_string(),
                description: "Night shifts, ICU".to_string(),
            }
        );
    }

    #[test]
    fn test_read_cases_empty_is_error() {
        assert!(read_cases(SuiteKind::Persona, "# nothing here\n\n").is_err());
    }
}
