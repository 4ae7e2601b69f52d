//! Collection normalizer (§4.4): defers item iteration to the expander
//! (`super::super::collection_expander`); only the surrounding config (not
//! `items`/`with`/the per-item `task` template) is evaluated here.

use super::super::context::NormalizationContext;
use super::super::error::Result;
use super::super::template::TemplateEngine;
use super::{evaluate_common, NormalizedTask};

pub fn normalize(ctx: &NormalizationContext, template: &TemplateEngine) -> Result<NormalizedTask> {
    evaluate_common(ctx, template, &["items", "task"])
}
