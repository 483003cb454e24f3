//! C6 — LLMEnricher: trend synthesis, article-angle generation and outlier
//! analysis over the LLM backend (spec §4.6). The five-strategy JSON parser
//! is a structural port of
//! `original_source/.../article_enrichment/llm_enricher.py::_parse_json_response`
//! / `_fix_json_common_issues`.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::services::gpu_owner::{GpuModelOwner, GpuOwner};
use crate::services::llm_client::LlmClient;
use crate::utils::ApiResult;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap());
static FENCED_ANY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```\s*(.*?)\s*```").unwrap());
static TRAILING_COMMA_BRACE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*}").unwrap());
static TRAILING_COMMA_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*]").unwrap());
static SINGLE_QUOTED_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"'([^']*)':\s*").unwrap());

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct TrendSynthesis {
    #[serde(default)]
    pub synthesis: String,
    #[serde(default)]
    pub saturated_angles: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default)]
    pub raw_response: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ArticleAngle {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub hook: String,
    #[serde(default)]
    pub outline: Vec<String>,
    #[serde(default = "default_effort")]
    pub effort_level: String,
    #[serde(default)]
    pub differentiation_score: f64,
}

fn default_effort() -> String {
    "medium".to_string()
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct OutlierAnalysis {
    #[serde(default)]
    pub common_thread: String,
    #[serde(default)]
    pub disruption_potential: f64,
    #[serde(default = "default_recommendation")]
    pub recommendation: String,
    #[serde(default)]
    pub raw_response: Option<String>,
}

fn default_recommendation() -> String {
    "watch".to_string()
}

pub struct LlmEnricher {
    client: Arc<LlmClient>,
    model: String,
    /// Per-model semaphore so calls against the same backend model are
    /// serialized (spec §4.6 "single-in-flight semantics"); acts as the
    /// small per-model handle cache the spec describes.
    model_locks: DashMap<String, Arc<Semaphore>>,
    /// Gates every backend call behind the process-wide GPU owner (spec §5
    /// "Resource acquisition") so an LLM call never races a model swap.
    gpu_owner: Arc<GpuModelOwner>,
}

impl LlmEnricher {
    pub fn new(client: Arc<LlmClient>, model: String, gpu_owner: Arc<GpuModelOwner>) -> Self {
        Self { client, model, model_locks: DashMap::new(), gpu_owner }
    }

    fn lock_for(&self, model: &str) -> Arc<Semaphore> {
        self.model_locks
            .entry(model.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    async fn invoke(&self, prompt: &str) -> ApiResult<String> {
        let lock = self.lock_for(&self.model);
        let _permit = lock.acquire().await.expect("semaphore not closed");
        self.gpu_owner.acquire(GpuOwner::OllamaLlm).await;
        self.client.complete(&self.model, prompt, 0.3).await
    }

    pub async fn synthesize_trend(
        &self,
        label: &str,
        keywords: &[String],
        volume: i64,
        velocity: f64,
        velocity_trend: &str,
        diversity: usize,
        sample_docs: &[String],
    ) -> ApiResult<TrendSynthesis> {
        let prompt = format!(
            "Analyze this content trend and respond with JSON only: \
             {{\"synthesis\": str, \"saturated_angles\": [str], \"opportunities\": [str]}}.\n\
             Topic: {label}\nKeywords: {}\nVolume: {volume}\nVelocity: {velocity:.2} ({velocity_trend})\n\
             Source diversity: {diversity}\nSample articles:\n{}",
            keywords.join(", "),
            sample_docs.iter().take(5).cloned().collect::<Vec<_>>().join("\n---\n"),
        );
        let response = self.invoke(&prompt).await?;
        Ok(parse_or_stub(&response))
    }

    pub async fn generate_article_angles(
        &self,
        label: &str,
        keywords: &[String],
        saturated_angles: &[String],
        opportunities: &[String],
        n: usize,
    ) -> ApiResult<Vec<ArticleAngle>> {
        let prompt = format!(
            "Propose {n} distinct article angles as a JSON array only, each \
             {{\"title\": str, \"hook\": str, \"outline\": [str], \
             \"effort_level\": \"easy\"|\"medium\"|\"complex\", \"differentiation_score\": 0..1}}.\n\
             Topic: {label}\nKeywords: {}\nAlready-saturated angles: {}\nOpportunities: {}",
            keywords.join(", "),
            saturated_angles.join("; "),
            opportunities.join("; "),
        );
        let response = self.invoke(&prompt).await?;
        let value = parse_json_response(&response);
        match value.as_array() {
            Some(arr) => Ok(arr
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    pub async fn analyze_outliers(
        &self,
        outliers: &[String],
        texts: &[String],
    ) -> ApiResult<OutlierAnalysis> {
        let prompt = format!(
            "Analyze these outlier articles and respond with JSON only: \
             {{\"common_thread\": str, \"disruption_potential\": 0..1, \
             \"recommendation\": \"ignore\"|\"watch\"|\"investigate\"}}.\n\
             Outlier categories: {}\nTexts:\n{}",
            outliers.join(", "),
            texts.iter().take(5).cloned().collect::<Vec<_>>().join("\n---\n"),
        );
        let response = self.invoke(&prompt).await?;
        Ok(parse_or_stub(&response))
    }
}

fn parse_or_stub<T>(response: &str) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    let value = parse_json_response(response);
    if value.is_object() {
        if let Ok(parsed) = serde_json::from_value(value) {
            return parsed;
        }
    }
    let mut stub = Value::Object(serde_json::Map::new());
    stub["raw_response"] = Value::String(response.to_string());
    serde_json::from_value(stub).unwrap_or_default()
}

/// Five-strategy fallback parser (spec §4.6): fenced ```json block, any
/// fenced block, first-`{`-to-last-`}` slice, whole-response parse, else a
/// `{raw_response}` stub. Each strategy retries once after
/// [`fix_json_common_issues`].
fn parse_json_response(response: &str) -> Value {
    if let Some(caps) = FENCED_JSON.captures(response) {
        if let Some(parsed) = try_parse(&caps[1]) {
            return parsed;
        }
    }
    if let Some(caps) = FENCED_ANY.captures(response) {
        let mut text = caps[1].trim();
        if let Some(stripped) = text.strip_prefix("json") {
            text = stripped.trim();
        }
        if let Some(parsed) = try_parse(text) {
            return parsed;
        }
    }
    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if end > start {
            if let Some(parsed) = try_parse(&response[start..=end]) {
                return parsed;
            }
        }
    }
    // Array-shaped responses (GenerateArticleAngles) aren't covered by the
    // object-braces strategy above; try the outermost `[`..`]` slice too.
    if let (Some(start), Some(end)) = (response.find('['), response.rfind(']')) {
        if end > start {
            if let Some(parsed) = try_parse(&response[start..=end]) {
                return parsed;
            }
        }
    }
    if let Some(parsed) = try_parse(response) {
        return parsed;
    }

    let mut stub = serde_json::Map::new();
    stub.insert("raw_response".to_string(), Value::String(response.to_string()));
    Value::Object(stub)
}

fn try_parse(text: &str) -> Option<Value> {
    serde_json::from_str(text)
        .ok()
        .or_else(|| serde_json::from_str(&fix_json_common_issues(text)).ok())
}

/// Conservative fixups: trailing commas before `}`/`]`, single-quoted object
/// keys. Deliberately does not touch unquoted keys (mirrors the Python
/// original's comment that a more aggressive regex breaks valid JSON).
fn fix_json_common_issues(text: &str) -> String {
    let text = text.trim();
    let text = TRAILING_COMMA_BRACE.replace_all(text, "}");
    let text = TRAILING_COMMA_BRACKET.replace_all(&text, "]");
    SINGLE_QUOTED_KEY.replace_all(&text, "\"$1\": ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_block() {
        let response = "Here you go:\n```json\n{\"synthesis\": \"x\", \"saturated_angles\": [], \"opportunities\": []}\n```";
        let value = parse_json_response(response);
        assert_eq!(value["synthesis"], "x");
    }

    #[test]
    fn fixes_trailing_comma_and_single_quoted_keys() {
        // SINGLE_QUOTED_KEY only rewrites quoted keys immediately followed by
        // `:`, not quoted values, so values must already be double-quoted.
        let response = "{'synthesis': \"x\", 'opportunities': [\"a\", \"b\",]}";
        let value = parse_json_response(response);
        assert_eq!(value["synthesis"], "x");
    }

    #[test]
    fn falls_back_to_raw_response_stub() {
        let response = "not json at all";
        let value = parse_json_response(response);
        assert_eq!(value["raw_response"], "not json at all");
    }

    #[test]
    fn extracts_first_to_last_brace() {
        let response = "prefix noise { \"synthesis\": \"x\", \"saturated_angles\": [], \"opportunities\": [] } trailing noise";
        let value = parse_json_response(response);
        assert_eq!(value["synthesis"], "x");
    }
}
