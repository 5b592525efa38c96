//! Display view over the opaque analysis payload.
//!
//! Every field is optional and unknown fields are ignored, so any payload
//! the workflow engine sends still renders.

use std::fmt::Write;

use colored::Colorize;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisData {
    pub video_id: Option<String>,
    pub virality_evaluation: Option<ViralityEvaluation>,
    pub hook_evaluation: Option<HookEvaluation>,
    pub best_practice_comparison: Vec<BestPractice>,
    pub retention_analysis: Option<RetentionAnalysis>,
    pub loopability_analysis: Option<LoopabilityAnalysis>,
    pub timestamped_improvements: Vec<TimestampedImprovement>,
    pub output: Option<PriorityOutput>,
    pub safe_rewrite_suggestions: Option<RewriteSuggestions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViralityEvaluation {
    pub overall_verdict: Option<String>,
    pub virality_score: Option<f64>,
    pub confidence_level: Option<String>,
    pub primary_risk: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HookEvaluation {
    pub hook_present_first2_seconds: Option<bool>,
    pub hook_strength: Option<String>,
    pub reasoning: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BestPractice {
    pub practice: Option<String>,
    pub met: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetentionAnalysis {
    pub early_drop_off_risk: Option<String>,
    pub pacing_quality: Option<String>,
    pub structure_issues: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoopabilityAnalysis {
    pub loop_present: Option<bool>,
    pub loop_potential: Option<String>,
    pub recommendation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimestampedImprovement {
    pub time_range: Option<String>,
    pub problem: Option<String>,
    pub suggested_change: Option<String>,
    pub expected_impact: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PriorityOutput {
    pub top_three_priority_actions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewriteSuggestions {
    pub hook_alternatives: Vec<String>,
    pub cta_suggestions: Vec<String>,
}

impl AnalysisData {
    /// Reads a stored payload. Shapes that do not match at all give an
    /// empty view rather than an error.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
        let flag = |value: Option<bool>| match value {
            Some(true) => "yes".green().to_string(),
            Some(false) => "no".red().to_string(),
            None => "-".to_string(),
        };

        if let Some(virality) = &self.virality_evaluation {
            let score = virality
                .virality_score
                .map(|s| format!("{:.0}/100", s))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(out, "{}", "Virality".bold());
            let _ = writeln!(out, "  Score:      {}", score.bold());
            let _ = writeln!(out, "  Verdict:    {}", text(&virality.overall_verdict));
            let _ = writeln!(out, "  Confidence: {}", text(&virality.confidence_level));
            let _ = writeln!(out, "  Main risk:  {}", text(&virality.primary_risk));
        }

        if let Some(hook) = &self.hook_evaluation {
            let _ = writeln!(out, "{}", "Hook".bold());
            let _ = writeln!(out, "  In first 2s: {}", flag(hook.hook_present_first2_seconds));
            let _ = writeln!(out, "  Strength:    {}", text(&hook.hook_strength));
            let _ = writeln!(out, "  Reasoning:   {}", text(&hook.reasoning));
        }

        if !self.best_practice_comparison.is_empty() {
            let _ = writeln!(out, "{}", "Best practices".bold());
            for practice in &self.best_practice_comparison {
                let _ = writeln!(
                    out,
                    "  [{}] {} {}",
                    flag(practice.met),
                    text(&practice.practice),
                    practice.notes.as_deref().unwrap_or_default().dimmed()
                );
            }
        }

        if let Some(retention) = &self.retention_analysis {
            let _ = writeln!(out, "{}", "Retention".bold());
            let _ = writeln!(out, "  Early drop-off risk: {}", text(&retention.early_drop_off_risk));
            let _ = writeln!(out, "  Pacing:              {}", text(&retention.pacing_quality));
            for issue in &retention.structure_issues {
                let _ = writeln!(out, "  - {}", issue);
            }
        }

        if let Some(looping) = &self.loopability_analysis {
            let _ = writeln!(out, "{}", "Loop".bold());
            let _ = writeln!(out, "  Present:   {}", flag(looping.loop_present));
            let _ = writeln!(out, "  Potential: {}", text(&looping.loop_potential));
            let _ = writeln!(out, "  Advice:    {}", text(&looping.recommendation));
        }

        if !self.timestamped_improvements.is_empty() {
            let _ = writeln!(out, "{}", "Improvements".bold());
            for item in &self.timestamped_improvements {
                let _ = writeln!(
                    out,
                    "  {} {}\n      -> {} ({})",
                    text(&item.time_range).cyan(),
                    text(&item.problem),
                    text(&item.suggested_change),
                    text(&item.expected_impact)
                );
            }
        }

        if let Some(output) = &self.output {
            if !output.top_three_priority_actions.is_empty() {
                let _ = writeln!(out, "{}", "Top priorities".bold());
                for (idx, action) in output.top_three_priority_actions.iter().enumerate() {
                    let _ = writeln!(out, "  {}. {}", idx + 1, action);
                }
            }
        }

        if let Some(rewrites) = &self.safe_rewrite_suggestions {
            let _ = writeln!(out, "{}", "Rewrite ideas".bold());
            for hook in &rewrites.hook_alternatives {
                let _ = writeln!(out, "  hook: {}", hook);
            }
            for cta in &rewrites.cta_suggestions {
                let _ = writeln!(out, "  cta:  {}", cta);
            }
        }

        if out.is_empty() {
            out.push_str("No analysis details available.\n");
        }
        out
    }
}
