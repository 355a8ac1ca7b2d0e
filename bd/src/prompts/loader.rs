//! Prompt Loader
//!
//! Loads system prompt templates from an override directory or falls back
//! to the embedded defaults.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, Weekday};
use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use super::embedded;
use crate::metrics::BusinessSummary;
use crate::pipeline::PipelineMetrics;
use crate::progress::GoalProgress;

/// Data available to system prompt templates
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    /// dd/mm/yyyy
    pub today: String,
    pub weekday: String,
    pub business: BusinessSummary,
    pub pipeline: PipelineMetrics,
    /// Active goals only
    pub goals: Vec<GoalProgress>,
    pub tool_names: Vec<String>,
}

impl PromptContext {
    pub fn new(
        today: NaiveDate,
        business: BusinessSummary,
        pipeline: PipelineMetrics,
        goals: Vec<GoalProgress>,
        tool_names: Vec<String>,
    ) -> Self {
        Self {
            today: today.format("%d/%m/%Y").to_string(),
            weekday: weekday_pt(today.weekday()).to_string(),
            business,
            pipeline,
            goals,
            tool_names,
        }
    }
}

fn weekday_pt(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "segunda-feira",
        Weekday::Tue => "terça-feira",
        Weekday::Wed => "quarta-feira",
        Weekday::Thu => "quinta-feira",
        Weekday::Fri => "sexta-feira",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// Directory searched for `{name}.hbs` before the embedded copy
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    pub fn new(override_dir: Option<&Path>) -> Self {
        debug!(?override_dir, "PromptLoader::new: called");
        let mut hbs = Handlebars::new();
        // Prompts are plain text
        hbs.register_escape_fn(handlebars::no_escape);
        Self {
            hbs,
            override_dir: override_dir.filter(|d| d.exists()).map(Path::to_path_buf),
        }
    }

    pub fn embedded_only() -> Self {
        Self::new(None)
    }

    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{}.hbs", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        let template = self.load_template(template_name)?;
        info!("Rendering prompt '{}' for {}", template_name, context.today);
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }
}
